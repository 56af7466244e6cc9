//! Top-level configuration for the orchestration core, loaded via
//! [`crate::infrastructure::config::loader::ConfigLoader`].

use serde::{Deserialize, Serialize};

/// Root configuration document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Path to the model catalog document consumed by the Model Registry.
    #[serde(default = "default_catalog_path")]
    pub catalog_path: String,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub swarm: SwarmConfig,

    #[serde(default)]
    pub audit: AuditConfig,

    #[serde(default)]
    pub learning: LearningConfig,
}

fn default_catalog_path() -> String {
    "models.yaml".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog_path: default_catalog_path(),
            logging: LoggingConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            rate_limit: RateLimitConfig::default(),
            swarm: SwarmConfig::default(),
            audit: AuditConfig::default(),
            learning: LearningConfig::default(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Per-provider circuit breaker defaults (C5).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CircuitBreakerConfig {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    #[serde(default = "default_retry_timeout_seconds")]
    pub retry_timeout_seconds: u64,
}

const fn default_failure_threshold() -> u32 {
    5
}

const fn default_retry_timeout_seconds() -> u64 {
    60
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            retry_timeout_seconds: default_retry_timeout_seconds(),
        }
    }
}

/// Default rate limiter windows (C6), overridable per provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RateLimitConfig {
    #[serde(default = "default_requests_per_minute")]
    pub default_requests_per_minute: u32,

    #[serde(default = "default_tokens_per_minute")]
    pub default_tokens_per_minute: u32,

    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
}

const fn default_requests_per_minute() -> u32 {
    50
}

const fn default_tokens_per_minute() -> u32 {
    40_000
}

const fn default_max_concurrent_requests() -> usize {
    10
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            default_requests_per_minute: default_requests_per_minute(),
            default_tokens_per_minute: default_tokens_per_minute(),
            max_concurrent_requests: default_max_concurrent_requests(),
        }
    }
}

/// Swarm Coordinator tuning (C11).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SwarmConfig {
    #[serde(default = "default_max_parallel_agents")]
    pub max_parallel_agents: usize,

    #[serde(default = "default_max_attempts")]
    pub default_max_attempts: u32,
}

const fn default_max_parallel_agents() -> usize {
    10
}

const fn default_max_attempts() -> u32 {
    3
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            max_parallel_agents: default_max_parallel_agents(),
            default_max_attempts: default_max_attempts(),
        }
    }
}

/// Audit Logger retention/detection knobs (C12).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AuditConfig {
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    #[serde(default = "default_cost_spike_threshold")]
    pub cost_spike_threshold: f64,

    #[serde(default = "default_rapid_failure_count")]
    pub rapid_failure_count: u32,
}

const fn default_retention_days() -> u32 {
    90
}

const fn default_cost_spike_threshold() -> f64 {
    1.0
}

const fn default_rapid_failure_count() -> u32 {
    5
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
            cost_spike_threshold: default_cost_spike_threshold(),
            rapid_failure_count: default_rapid_failure_count(),
        }
    }
}

/// Learning Loop knobs (C8).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LearningConfig {
    #[serde(default = "default_learned_weight")]
    pub default_learned_weight: f64,

    #[serde(default = "default_ab_test_min_samples")]
    pub ab_test_min_samples: u32,

    #[serde(default = "default_ab_test_win_margin")]
    pub ab_test_win_margin: f64,
}

const fn default_learned_weight() -> f64 {
    0.5
}

const fn default_ab_test_min_samples() -> u32 {
    30
}

const fn default_ab_test_win_margin() -> f64 {
    0.05
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            default_learned_weight: default_learned_weight(),
            ab_test_min_samples: default_ab_test_min_samples(),
            ab_test_win_margin: default_ab_test_win_margin(),
        }
    }
}
