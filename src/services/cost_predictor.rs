//! Cost Predictor (C2): pure, deterministic cost/token estimation and
//! efficiency scoring. No internal mutable state.

use crate::domain::models::{ModelDefinition, RoutingRequest, TaskType};

/// Per-axis multipliers applied to the baseline input/output token
/// estimate for a task type.
#[derive(Debug, Clone, Copy)]
struct TaskTokenFactor {
    input: f64,
    output: f64,
}

fn task_token_factor(task_type: &TaskType) -> TaskTokenFactor {
    match task_type {
        TaskType::Reasoning => TaskTokenFactor { input: 1.2, output: 2.5 },
        TaskType::CodeGeneration => TaskTokenFactor { input: 1.0, output: 3.0 },
        TaskType::LongContext => TaskTokenFactor { input: 5.0, output: 1.5 },
        TaskType::SecurityAudit => TaskTokenFactor { input: 1.5, output: 2.0 },
        TaskType::CodeReview => TaskTokenFactor { input: 1.3, output: 1.8 },
        TaskType::Planning => TaskTokenFactor { input: 1.1, output: 2.2 },
        TaskType::Research => TaskTokenFactor { input: 2.0, output: 2.0 },
        TaskType::Documentation => TaskTokenFactor { input: 1.0, output: 1.5 },
        TaskType::Other(_) => TaskTokenFactor { input: 1.0, output: 1.0 },
    }
}

const DETAILED_WORDS: [&str; 3] = ["detailed", "comprehensive", "thorough"];
const BRIEF_WORDS: [&str; 3] = ["simple", "brief", "quick"];

/// Result of estimating token counts for a request that didn't supply them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenEstimate {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

fn estimate_tokens(request: &RoutingRequest) -> TokenEstimate {
    let factor = task_token_factor(&request.task_type);

    let input_tokens = request.estimated_input_tokens.unwrap_or_else(|| {
        let word_count = request.task_description.split_whitespace().count() as f64;
        let baseline = (word_count * 1.3).max(100.0);
        (baseline * factor.input).round() as u64
    });

    let description_lower = request.task_description.to_lowercase();
    let output_tokens = {
        let baseline = if request.estimated_output_tokens != 500 {
            request.estimated_output_tokens as f64
        } else if DETAILED_WORDS.iter().any(|w| description_lower.contains(w)) {
            1500.0
        } else if BRIEF_WORDS.iter().any(|w| description_lower.contains(w)) {
            300.0
        } else {
            500.0
        };
        (baseline * factor.output).round() as u64
    };

    TokenEstimate { input_tokens, output_tokens }
}

/// Output of `predict`: estimated cost range and efficiency for one model
/// against one request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostPrediction {
    pub min: f64,
    pub max: f64,
    pub expected: f64,
    pub within_budget: bool,
    pub cost_efficiency_score: f64,
}

/// Predict the cost of running `request` against `model`. Pure and
/// deterministic for a fixed input.
pub fn predict(model: &ModelDefinition, request: &RoutingRequest) -> CostPrediction {
    let tokens = estimate_tokens(request);

    let expected = (tokens.input_tokens as f64 / 1000.0) * model.cost_per_1k_input
        + (tokens.output_tokens as f64 / 1000.0) * model.cost_per_1k_output;

    let min = expected * 0.7;
    let max = expected * 1.3;

    let within_budget = request.cost_budget.is_none_or(|budget| max <= budget);
    let cost_efficiency_score = (1.0 / (1.0 + expected * 100.0)).clamp(0.0, 1.0);

    CostPrediction {
        min,
        max,
        expected,
        within_budget,
        cost_efficiency_score,
    }
}
