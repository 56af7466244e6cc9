//! Routing request/decision types: the MoE Router's public input and output.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::model_definition::{Provider, TaskType};

/// A request for the router to pick a model to serve `task_description`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingRequest {
    pub task_type: TaskType,
    pub task_description: String,
    #[serde(default)]
    pub estimated_input_tokens: Option<u32>,
    #[serde(default = "default_estimated_output_tokens")]
    pub estimated_output_tokens: u32,
    #[serde(default)]
    pub context_size: Option<u32>,
    #[serde(default)]
    pub cost_budget: Option<f64>,
    #[serde(default = "default_quality_requirement")]
    pub quality_requirement: f64,
    #[serde(default)]
    pub latency_requirement_ms: Option<u64>,
    #[serde(default)]
    pub requires_streaming: bool,
    #[serde(default)]
    pub requires_tools: bool,
    #[serde(default)]
    pub requires_vision: bool,
    #[serde(default)]
    pub requires_json_mode: bool,
    #[serde(default)]
    pub vendor_preference: Option<Provider>,
    #[serde(default)]
    pub vendor_diversity: bool,
    #[serde(default)]
    pub enable_parallel: bool,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

const fn default_estimated_output_tokens() -> u32 {
    500
}

const fn default_quality_requirement() -> f64 {
    0.7
}

impl RoutingRequest {
    /// `metadata.critical == true`, one of the Hybrid Router's parallel triggers.
    pub fn is_critical(&self) -> bool {
        self.metadata
            .get("critical")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// One contribution to a `RoutingDecision`'s rationale. Append-only within a
/// decision; never reordered once recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evidence {
    pub id: Uuid,
    pub source: String,
    pub description: String,
    pub weight: f64,
    pub timestamp: DateTime<Utc>,
}

impl Evidence {
    pub fn new(source: impl Into<String>, description: impl Into<String>, weight: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            source: source.into(),
            description: description.into(),
            weight: weight.clamp(0.0, 1.0),
            timestamp: Utc::now(),
        }
    }
}

/// How a `RoutingDecision` was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingStrategy {
    Standard,
    Parallel,
    Error,
}

/// The MoE Router's output for a single `RoutingRequest`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub selected_model: String,
    pub rationale: String,
    pub confidence: f64,
    pub evidence: Vec<Evidence>,
    pub estimated_cost: f64,
    pub estimated_quality: f64,
    pub fallback_models: Vec<String>,
    #[serde(default)]
    pub parallel_models: Option<Vec<String>>,
    pub routing_strategy: RoutingStrategy,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl RoutingDecision {
    /// The canonical "no candidates survived filtering" decision shape.
    pub fn error(rationale: impl Into<String>) -> Self {
        Self {
            selected_model: "none".into(),
            rationale: rationale.into(),
            confidence: 0.0,
            evidence: Vec::new(),
            estimated_cost: 0.0,
            estimated_quality: 0.0,
            fallback_models: Vec::new(),
            parallel_models: None,
            routing_strategy: RoutingStrategy::Error,
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.routing_strategy == RoutingStrategy::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evidence_weight_is_clamped() {
        let e = Evidence::new("router", "over range", 1.7);
        assert_eq!(e.weight, 1.0);
    }

    #[test]
    fn error_decision_has_zero_confidence_and_none_model() {
        let d = RoutingDecision::error("all candidates exceeded budget");
        assert_eq!(d.selected_model, "none");
        assert_eq!(d.confidence, 0.0);
        assert!(d.is_error());
    }

    #[test]
    fn request_reports_critical_metadata() {
        let mut req = sample_request();
        req.metadata.insert("critical".into(), Value::Bool(true));
        assert!(req.is_critical());
    }

    fn sample_request() -> RoutingRequest {
        RoutingRequest {
            task_type: TaskType::CodeGeneration,
            task_description: "fix the bug".into(),
            estimated_input_tokens: None,
            estimated_output_tokens: default_estimated_output_tokens(),
            context_size: None,
            cost_budget: None,
            quality_requirement: default_quality_requirement(),
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
}
