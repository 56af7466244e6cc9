//! Error types for the orchestration core.
//!
//! Each enum corresponds to one row of the error-kind table: a typed,
//! `thiserror`-derived error with an explicit transient/permanent
//! classification where the surfacing policy implies one. Hard errors
//! (`ConfigError`, `SwarmError::CyclicDag`) are meant to propagate to the
//! caller; recoverable ones are handled locally by the component that
//! raises them.

use thiserror::Error;

/// Registry/catalog load and validation failures. Fatal at process startup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(String),

    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("io error: {0}")]
    IoError(String),

    #[error("environment variable error: {0}")]
    EnvVarError(String),
}

/// Errors from the MoE / Hybrid routing pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RouterError {
    /// Filtering left zero candidates. `BudgetExceeded` is folded into this
    /// kind with an explicit reason, per the distilled spec's error table.
    #[error("no candidate models survived filtering: {reason}")]
    NoCandidates { reason: String },

    /// A model catalog entry failed validation during lookup.
    #[error("invalid model definition: {0}")]
    InvalidModel(#[from] ConfigError),
}

/// Errors surfaced by the rate limiter / quota substrate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuotaError {
    /// A rate or cost quota for the given scope has been exhausted.
    #[error("quota exceeded for {scope}: {reason}")]
    Exceeded { scope: String, reason: String },
}

/// Errors surfaced by the per-provider circuit breaker.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CircuitError {
    /// The circuit for the given provider is open and rejecting calls.
    #[error("circuit open for provider {0}")]
    Open(String),
}

/// Errors surfaced by the Swarm Coordinator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SwarmError {
    /// The decomposition response could not be parsed; the caller already
    /// falls back to the fixed 3-step plan before this is ever returned,
    /// so this variant is reserved for decomposition failures the fallback
    /// itself cannot repair.
    #[error("swarm decomposition failed: {0}")]
    DecompositionError(String),

    /// A full wave-scheduling pass found no runnable subtask while
    /// subtasks remain pending: the dependency graph stalled.
    #[error("dag wave scheduling stalled with {remaining} subtask(s) unresolved")]
    CyclicDag { remaining: usize },

    /// An outbound provider call for a subtask attempt failed.
    #[error("provider call failed: {0}")]
    ProviderFailure(String),
}

impl SwarmError {
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::ProviderFailure(_))
    }

    pub const fn is_permanent(&self) -> bool {
        !self.is_transient()
    }
}
