//! Model catalog types: `ModelDefinition`, `TaskPreferences`, and the small
//! closed enums every other component keys its state by.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies the vendor/provider backing a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Anthropic,
    OpenAi,
    Google,
    Meta,
    Mistral,
    Other,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
            Self::Google => "google",
            Self::Meta => "meta",
            Self::Mistral => "mistral",
            Self::Other => "other",
        };
        write!(f, "{s}")
    }
}

/// A provider key used consistently across the metrics/circuit-breaker/rate-
/// limiter/quota substrate, instead of ad-hoc `String` keys at each call
/// site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderId(pub String);

impl ProviderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl From<Provider> for ProviderId {
    fn from(provider: Provider) -> Self {
        Self(provider.to_string())
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A capability a model may or may not support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Reasoning,
    Code,
    Tools,
    Vision,
    LongContext,
    JsonMode,
    FunctionCalling,
    Streaming,
}

/// Closed set of task categories driving cost estimation multipliers,
/// hybrid-router escalation rules, and task preference lookups.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    CodeGeneration,
    Reasoning,
    SecurityAudit,
    CodeReview,
    Planning,
    LongContext,
    Research,
    Documentation,
    /// Escape hatch for task categories not enumerated above. Kept as an
    /// open variant rather than an open string map so the rest of the
    /// model stays closed; callers that need a truly dynamic taxonomy
    /// should normalize into this before crossing the API boundary.
    Other(String),
}

/// An immutable, validated entry in the model catalog.
///
/// `ModelDefinition`s are loaded once from configuration and never mutated
/// in place; callers that need to refresh the catalog replace the whole
/// snapshot rather than editing individual entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDefinition {
    pub id: String,
    pub provider: Provider,
    pub capabilities: Vec<Capability>,
    pub cost_per_1k_input: f64,
    pub cost_per_1k_output: f64,
    pub context_window: u32,
    pub quality_score: f64,
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
    #[serde(default)]
    pub supports_streaming: bool,
    #[serde(default)]
    pub latency_p50_ms: Option<u64>,
    #[serde(default)]
    pub latency_p95_ms: Option<u64>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub fallback_models: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

const fn default_enabled() -> bool {
    true
}

impl ModelDefinition {
    pub fn has_capability(&self, cap: Capability) -> bool {
        self.capabilities.contains(&cap)
    }

    pub fn validate(&self) -> Result<(), crate::domain::error::ConfigError> {
        use crate::domain::error::ConfigError;

        if self.id.is_empty() {
            return Err(ConfigError::MissingField("id".into()));
        }
        if self.cost_per_1k_input < 0.0 || self.cost_per_1k_output < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "cost_per_1k".into(),
                value: "negative".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.quality_score) {
            return Err(ConfigError::InvalidValue {
                field: "quality_score".into(),
                value: self.quality_score.to_string(),
            });
        }
        if self.context_window == 0 {
            return Err(ConfigError::InvalidValue {
                field: "context_window".into(),
                value: "0".into(),
            });
        }
        Ok(())
    }
}

/// Mapping `TaskType -> { preferred model ids }` loaded alongside the
/// catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskPreferences {
    #[serde(flatten)]
    preferred: HashMap<String, Vec<String>>,
}

impl TaskPreferences {
    fn key(task_type: &TaskType) -> String {
        match task_type {
            TaskType::Other(s) => s.clone(),
            other => format!("{other:?}"),
        }
    }

    pub fn preferred_for(&self, task_type: &TaskType) -> &[String] {
        self.preferred
            .get(&Self::key(task_type))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_preferred(&self, task_type: &TaskType, model_id: &str) -> bool {
        self.preferred_for(task_type).iter().any(|m| m == model_id)
    }
}
