//! Application services: the routing, coordination, and substrate
//! components that sit between the domain model and the CLI composition
//! root.

pub mod audit_log;
pub mod circuit_breaker;
pub mod cost_predictor;
pub mod hybrid_router;
pub mod learning_loop;
pub mod moe_router;
pub mod performance_tracker;
pub mod provider_metrics;
pub mod quota_service;
pub mod swarm_coordinator;

pub use audit_log::{
    AuditFilter, AuditLogger, AuditLoggerConfig, AuditMetadata, AuditRecord, AuditStats, AuditStatus,
    ExecutionContext, RetentionPolicy, SuspiciousPattern,
};
pub use circuit_breaker::{CircuitBreakerConfig, CircuitBreakerService, CircuitRejection};
pub use cost_predictor::{predict, CostPrediction, TokenEstimate};
pub use hybrid_router::{
    calculate_cost_quality_tradeoff, select_judge_model, select_parallel_models, should_use_parallel,
    ConsensusStrategy, CostQualityTradeoff,
};
pub use learning_loop::{AbTest, AbTestAnalysis, AbTestOutcome, LearningLoop, Variant};
pub use moe_router::MoeRouter;
pub use performance_tracker::{InMemoryMetricsStore, MetricsStore, PerformanceTracker};
pub use provider_metrics::{Anomaly, ExecutionSample, ProviderMetrics, ProviderStats};
pub use quota_service::QuotaService;
pub use swarm_coordinator::{ProposedSubTask, SwarmConfig, SwarmCoordinator};
