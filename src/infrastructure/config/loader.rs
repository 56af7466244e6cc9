use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Configuration validation error types.
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("catalog_path cannot be empty")]
    EmptyCatalogPath,

    #[error("Invalid circuit_breaker.failure_threshold: {0}. Must be at least 1")]
    InvalidFailureThreshold(u32),

    #[error("Invalid swarm.max_parallel_agents: {0}. Must be at least 1")]
    InvalidMaxParallelAgents(usize),

    #[error("Invalid swarm.default_max_attempts: {0}. Must be at least 1")]
    InvalidMaxAttempts(u32),

    #[error("Invalid audit.cost_spike_threshold: {0}. Must be positive")]
    InvalidCostSpikeThreshold(f64),

    #[error("Invalid learning.default_learned_weight: {0}. Must be in [0, 1]")]
    InvalidLearnedWeight(f64),
}

/// Configuration loader with hierarchical merging: defaults → YAML file →
/// environment variables.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults
    /// 2. `config.yaml` in the current directory
    /// 3. Environment variables (`ORCHESTRATOR_*` prefix)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file("config.yaml"))
            .merge(Env::prefixed("ORCHESTRATOR_").split("__"))
            .extract()
            .context("failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .with_context(|| format!("failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.catalog_path.is_empty() {
            return Err(ConfigError::EmptyCatalogPath);
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        if config.circuit_breaker.failure_threshold == 0 {
            return Err(ConfigError::InvalidFailureThreshold(config.circuit_breaker.failure_threshold));
        }

        if config.swarm.max_parallel_agents == 0 {
            return Err(ConfigError::InvalidMaxParallelAgents(config.swarm.max_parallel_agents));
        }

        if config.swarm.default_max_attempts == 0 {
            return Err(ConfigError::InvalidMaxAttempts(config.swarm.default_max_attempts));
        }

        if config.audit.cost_spike_threshold <= 0.0 {
            return Err(ConfigError::InvalidCostSpikeThreshold(config.audit.cost_spike_threshold));
        }

        if !(0.0..=1.0).contains(&config.learning.default_learned_weight) {
            return Err(ConfigError::InvalidLearnedWeight(config.learning.default_learned_weight));
        }

        Ok(())
    }
}
