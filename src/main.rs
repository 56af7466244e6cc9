//! Thin composition-root CLI.
//!
//! Wires the model catalog, circuit breaker, performance tracker, learning
//! loop, MoE router, and swarm coordinator together for manual
//! smoke-testing. Not the externally-facing API: real integrations talk to
//! the library crate directly.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use orchestrator_core::adapters::testing::MockAgentRegistry;
use orchestrator_core::domain::models::{RoutingRequest, TaskType};
use orchestrator_core::infrastructure::config::{ConfigLoader, ModelCatalog};
use orchestrator_core::services::{
    AuditLogger, CircuitBreakerConfig, CircuitBreakerService, ExecutionContext, LearningLoop, MoeRouter,
    PerformanceTracker, ProposedSubTask, SwarmConfig, SwarmCoordinator,
};

#[derive(Parser)]
#[command(name = "orchestrator", about = "agent orchestration core smoke-test CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Override the configured model catalog path.
    #[arg(long, global = true)]
    catalog: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Route a single request against the catalog and print the decision.
    Route {
        #[arg(long, default_value = "code_generation")]
        task_type: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        quality_requirement: Option<f64>,
        #[arg(long)]
        cost_budget: Option<f64>,
    },
    /// Decompose a request and execute it across a mock agent swarm.
    Swarm {
        #[arg(long)]
        description: String,
        #[arg(long, default_value = "code_generation")]
        task_type: String,
    },
}

fn parse_task_type(raw: &str) -> TaskType {
    match raw.to_lowercase().replace('-', "_").as_str() {
        "code_generation" => TaskType::CodeGeneration,
        "reasoning" => TaskType::Reasoning,
        "security_audit" => TaskType::SecurityAudit,
        "code_review" => TaskType::CodeReview,
        "planning" => TaskType::Planning,
        "long_context" => TaskType::LongContext,
        "research" => TaskType::Research,
        "documentation" => TaskType::Documentation,
        other => TaskType::Other(other.to_string()),
    }
}

fn base_request(task_type: TaskType, description: String) -> RoutingRequest {
    RoutingRequest {
        task_type,
        task_description: description,
        estimated_input_tokens: None,
        estimated_output_tokens: 500,
        context_size: None,
        cost_budget: None,
        quality_requirement: 0.7,
        latency_requirement_ms: None,
        requires_streaming: false,
        requires_tools: false,
        requires_vision: false,
        requires_json_mode: false,
        vendor_preference: None,
        vendor_diversity: false,
        enable_parallel: false,
        metadata: HashMap::new(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).json().init();

    let cli = Cli::parse();
    let config = ConfigLoader::load().context("failed to load configuration")?;
    let catalog_path = cli.catalog.unwrap_or_else(|| config.catalog_path.clone());
    let catalog =
        ModelCatalog::load(&catalog_path).with_context(|| format!("failed to load model catalog from {catalog_path}"))?;
    let models = catalog.enabled_models();

    let circuit_breaker = Arc::new(CircuitBreakerService::new(CircuitBreakerConfig {
        failure_threshold: config.circuit_breaker.failure_threshold,
        retry_timeout_seconds: config.circuit_breaker.retry_timeout_seconds,
    }));
    let performance = Arc::new(PerformanceTracker::in_memory());
    let learning = Arc::new(LearningLoop::new(0.1, config.learning.default_learned_weight));
    let audit = AuditLogger::with_defaults();

    match cli.command {
        Command::Route { task_type, description, quality_requirement, cost_budget } => {
            let mut request = base_request(parse_task_type(&task_type), description);
            if let Some(q) = quality_requirement {
                request.quality_requirement = q;
            }
            request.cost_budget = cost_budget;

            let router = MoeRouter::new(circuit_breaker, performance, learning, catalog.task_preferences);
            let decision = router.select_model(&request, &models).await;

            audit
                .log_tool_execution(
                    "moe_router",
                    "select_model",
                    serde_json::to_value(&request)?,
                    serde_json::to_value(&decision)?,
                    !decision.is_error(),
                    ExecutionContext::default(),
                )
                .await;

            println!("{}", serde_json::to_string_pretty(&decision)?);
        }
        Command::Swarm { description, task_type } => {
            let request = base_request(parse_task_type(&task_type), description);
            let registry = Arc::new(MockAgentRegistry::new());
            let coordinator = SwarmCoordinator::new(registry, SwarmConfig {
                max_parallel_agents: config.swarm.max_parallel_agents,
                default_max_attempts: config.swarm.default_max_attempts,
                ..SwarmConfig::default()
            });

            let execution = coordinator.execute(Uuid::new_v4(), request, Vec::<ProposedSubTask>::new()).await;

            audit
                .log_tool_execution(
                    "swarm_coordinator",
                    "execute",
                    serde_json::Value::Null,
                    serde_json::to_value(&execution)?,
                    execution.is_successful(),
                    ExecutionContext::default(),
                )
                .await;

            println!("{}", serde_json::to_string_pretty(&execution)?);
        }
    }

    Ok(())
}
