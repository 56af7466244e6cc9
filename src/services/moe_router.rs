//! MoE Router (C10): filters the model catalog against a `RoutingRequest`,
//! defers to the Hybrid Router when parallel execution applies, then scores
//! and selects among the survivors.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::instrument;

use crate::domain::models::{
    Capability, Evidence, ModelDefinition, Provider, ProviderId, RoutingDecision, RoutingRequest,
    RoutingStrategy, TaskPreferences, TaskType,
};
use crate::services::circuit_breaker::CircuitBreakerService;
use crate::services::cost_predictor;
use crate::services::hybrid_router;
use crate::services::learning_loop::LearningLoop;
use crate::services::performance_tracker::PerformanceTracker;

const QUALITY_WEIGHT: f64 = 50.0;
const COST_EFFICIENCY_WEIGHT: f64 = 20.0;
const HISTORICAL_WEIGHT: f64 = 15.0;
const LEARNED_WEIGHT: f64 = 10.0;
const TASK_PREFERENCE_BONUS: f64 = 5.0;
const VENDOR_DIVERSITY_BONUS: f64 = 3.0;
const VENDOR_PREFERENCE_BONUS: f64 = 2.0;

const HISTORY_CAPACITY: usize = 5;
const MIN_FALLBACKS: usize = 2;
const MAX_FALLBACKS: usize = 4;

struct ScoredCandidate<'a> {
    model: &'a ModelDefinition,
    score: f64,
    quality_score: f64,
    expected_cost: f64,
}

/// Routes a `RoutingRequest` to a single model (or to a parallel set via the
/// Hybrid Router), recording Evidence for every filtering decision.
pub struct MoeRouter {
    circuit_breaker: Arc<CircuitBreakerService>,
    performance: Arc<PerformanceTracker>,
    learning: Arc<LearningLoop>,
    task_preferences: TaskPreferences,
    history: Mutex<VecDeque<Provider>>,
}

impl MoeRouter {
    pub fn new(
        circuit_breaker: Arc<CircuitBreakerService>,
        performance: Arc<PerformanceTracker>,
        learning: Arc<LearningLoop>,
        task_preferences: TaskPreferences,
    ) -> Self {
        Self {
            circuit_breaker,
            performance,
            learning,
            task_preferences,
            history: Mutex::new(VecDeque::with_capacity(HISTORY_CAPACITY)),
        }
    }

    fn missing_capability(request: &RoutingRequest, model: &ModelDefinition) -> Option<&'static str> {
        if request.requires_tools && !model.has_capability(Capability::Tools) {
            return Some("tools");
        }
        if request.requires_vision && !model.has_capability(Capability::Vision) {
            return Some("vision");
        }
        if request.requires_json_mode && !model.has_capability(Capability::JsonMode) {
            return Some("json_mode");
        }
        if request.requires_streaming && !model.supports_streaming {
            return Some("streaming");
        }
        None
    }

    /// Filter step. Returns the surviving candidates and the Evidence
    /// explaining every exclusion (in the order candidates were examined).
    async fn filter<'a>(
        &self,
        request: &RoutingRequest,
        models: &'a [ModelDefinition],
    ) -> (Vec<&'a ModelDefinition>, Vec<Evidence>) {
        let mut survivors = Vec::new();
        let mut evidence = Vec::new();

        for model in models {
            if !model.enabled {
                evidence.push(Evidence::new("filter", format!("{} is disabled", model.id), 1.0));
                continue;
            }

            let provider_id = ProviderId::from(model.provider);
            if self.circuit_breaker.is_open(&provider_id).await {
                evidence.push(Evidence::new(
                    "filter",
                    format!("circuit breaker open for provider {}", model.provider),
                    1.0,
                ));
                continue;
            }

            if model.quality_score < request.quality_requirement {
                evidence.push(Evidence::new(
                    "filter",
                    format!("{} quality {:.2} below required {:.2}", model.id, model.quality_score, request.quality_requirement),
                    1.0,
                ));
                continue;
            }

            if let Some(context_size) = request.context_size {
                if model.context_window < context_size {
                    evidence.push(Evidence::new(
                        "filter",
                        format!("{} context window {} below required {}", model.id, model.context_window, context_size),
                        1.0,
                    ));
                    continue;
                }
            }

            if let Some(missing) = Self::missing_capability(request, model) {
                evidence.push(Evidence::new("filter", format!("{} missing required capability {missing}", model.id), 1.0));
                continue;
            }

            if let Some(latency_requirement) = request.latency_requirement_ms {
                if model.latency_p95_ms.is_some_and(|p95| p95 > latency_requirement) {
                    evidence.push(Evidence::new("filter", format!("{} p95 latency exceeds requirement", model.id), 1.0));
                    continue;
                }
            }

            let prediction = cost_predictor::predict(model, request);
            if !prediction.within_budget {
                evidence.push(Evidence::new(
                    "filter",
                    format!("{} expected cost {:.4} exceeds budget", model.id, prediction.expected),
                    1.0,
                ));
                continue;
            }

            survivors.push(model);
        }

        (survivors, evidence)
    }

    async fn recent_providers(&self) -> Vec<Provider> {
        self.history.lock().await.iter().copied().collect()
    }

    async fn remember(&self, provider: Provider) {
        let mut history = self.history.lock().await;
        if history.len() == HISTORY_CAPACITY {
            history.pop_front();
        }
        history.push_back(provider);
    }

    async fn score<'a>(&self, request: &RoutingRequest, model: &'a ModelDefinition) -> ScoredCandidate<'a> {
        let prediction = cost_predictor::predict(model, request);
        let mut score = model.quality_score * QUALITY_WEIGHT;
        if prediction.within_budget {
            score += prediction.cost_efficiency_score * COST_EFFICIENCY_WEIGHT;
        }

        let historical_weight = self.performance.get_recommendation_weight(&model.id, &request.task_type).await;
        score += historical_weight * HISTORICAL_WEIGHT;

        let learned_weight = self.learning.get_model_weight(&model.id, &request.task_type).await;
        score += learned_weight * LEARNED_WEIGHT;

        if self.task_preferences.is_preferred(&request.task_type, &model.id) {
            score += TASK_PREFERENCE_BONUS;
        }

        if request.vendor_diversity {
            let recent = self.recent_providers().await;
            if !recent.contains(&model.provider) {
                score += VENDOR_DIVERSITY_BONUS;
            }
        }

        if request.vendor_preference == Some(model.provider) {
            score += VENDOR_PREFERENCE_BONUS;
        }

        ScoredCandidate { model, score, quality_score: model.quality_score, expected_cost: prediction.expected }
    }

    fn rationale(request: &RoutingRequest, candidate: &ScoredCandidate<'_>, score: f64) -> String {
        format!(
            "selected {} for {:?} on quality {:.2}, estimated cost {:.4}, capability fit, and historical performance (score {:.1})",
            candidate.model.id, request.task_type, candidate.quality_score, candidate.expected_cost, score
        )
    }

    /// Runs the full filter -> parallel-check -> score -> select pipeline.
    #[instrument(name = "moe_router.select_model", skip(self, models), fields(task_type = ?request.task_type, candidates = models.len()))]
    pub async fn select_model(&self, request: &RoutingRequest, models: &[ModelDefinition]) -> RoutingDecision {
        let (survivors, evidence) = self.filter(request, models).await;

        if survivors.is_empty() {
            let reason = evidence.last().map_or_else(
                || "no models were offered as candidates".to_string(),
                |e| e.description.clone(),
            );
            let mut decision = RoutingDecision::error(format!("no candidate models survived filtering: {reason}"));
            decision.evidence = evidence;
            return decision;
        }

        if hybrid_router::should_use_parallel(request) {
            let owned: Vec<ModelDefinition> = survivors.iter().map(|m| (*m).clone()).collect();
            let parallel_set = hybrid_router::select_parallel_models(&owned, 3);
            let judge = hybrid_router::select_judge_model(&owned, &parallel_set);

            let mut metadata = std::collections::HashMap::new();
            if let Some(judge) = judge {
                metadata.insert("judge_model".to_string(), serde_json::Value::String(judge.id.clone()));
            }

            let primary = parallel_set.first().cloned().unwrap_or_else(|| owned[0].clone());
            let fallback_models = parallel_set.iter().skip(1).map(|m| m.id.clone()).collect();
            let prediction = cost_predictor::predict(&primary, request);

            for model in &parallel_set {
                self.remember(model.provider).await;
            }

            return RoutingDecision {
                selected_model: primary.id.clone(),
                rationale: format!("fanned out {:?} across {} models in parallel", request.task_type, parallel_set.len()),
                confidence: 0.95,
                evidence,
                estimated_cost: prediction.expected,
                estimated_quality: primary.quality_score,
                fallback_models,
                parallel_models: Some(parallel_set.iter().map(|m| m.id.clone()).collect()),
                routing_strategy: RoutingStrategy::Parallel,
                timestamp: chrono::Utc::now(),
                metadata,
            };
        }

        let mut scored: Vec<ScoredCandidate<'_>> = Vec::with_capacity(survivors.len());
        for model in survivors {
            scored.push(self.score(request, model).await);
        }
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));

        let winner = &scored[0];
        let fallback_models: Vec<String> = scored
            .iter()
            .skip(1)
            .take(MAX_FALLBACKS.min(scored.len().saturating_sub(1)).max(MIN_FALLBACKS.min(scored.len().saturating_sub(1))))
            .map(|c| c.model.id.clone())
            .collect();

        self.remember(winner.model.provider).await;

        let confidence = (winner.score / 100.0).min(1.0);
        let rationale = Self::rationale(request, winner, winner.score);

        RoutingDecision {
            selected_model: winner.model.id.clone(),
            rationale,
            confidence,
            evidence,
            estimated_cost: winner.expected_cost,
            estimated_quality: winner.quality_score,
            fallback_models,
            parallel_models: None,
            routing_strategy: RoutingStrategy::Standard,
            timestamp: chrono::Utc::now(),
            metadata: std::collections::HashMap::new(),
        }
    }

    /// Updates the circuit breaker and performance tracker from an observed
    /// outcome for `model_id` served by `provider`.
    #[instrument(name = "moe_router.record_request_outcome", skip(self), fields(model_id = %model_id, provider = %provider, success))]
    pub async fn record_request_outcome(
        &self,
        model_id: &str,
        provider: Provider,
        task_type: &TaskType,
        success: bool,
        latency_ms: Option<f64>,
        cost: Option<f64>,
        quality: Option<f64>,
    ) {
        let provider_id = ProviderId::from(provider);
        if success {
            self.circuit_breaker.record_success(&provider_id).await;
        } else {
            self.circuit_breaker.record_failure(&provider_id).await;
        }
        self.performance.record(model_id, task_type, success, latency_ms, cost, quality).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    pub(super) fn model(id: &str, provider: Provider, quality: f64, enabled: bool) -> ModelDefinition {
        ModelDefinition {
            id: id.to_string(),
            provider,
            capabilities: vec![Capability::Reasoning, Capability::Code],
            cost_per_1k_input: 0.003,
            cost_per_1k_output: 0.015,
            context_window: 200_000,
            quality_score: quality,
            max_output_tokens: None,
            supports_streaming: true,
            latency_p50_ms: Some(500),
            latency_p95_ms: Some(1000),
            enabled,
            fallback_models: vec![],
            tags: vec![],
        }
    }

    pub(super) fn request(task_type: TaskType) -> RoutingRequest {
        RoutingRequest {
            task_type,
            task_description: "implement a rest endpoint".into(),
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

    fn router() -> MoeRouter {
        MoeRouter::new(
            Arc::new(CircuitBreakerService::with_defaults()),
            Arc::new(PerformanceTracker::in_memory()),
            Arc::new(LearningLoop::with_defaults()),
            TaskPreferences::default(),
        )
    }

    #[tokio::test]
    async fn selects_highest_scoring_survivor() {
        let router = router();
        let models = vec![
            model("low-quality", Provider::OpenAi, 0.72, true),
            model("high-quality", Provider::Anthropic, 0.95, true),
        ];
        let decision = router.select_model(&request(TaskType::CodeGeneration), &models).await;
        assert_eq!(decision.selected_model, "high-quality");
        assert_eq!(decision.routing_strategy, RoutingStrategy::Standard);
        assert!(!decision.fallback_models.is_empty());
    }

    #[tokio::test]
    async fn disabled_model_is_filtered_with_evidence() {
        let router = router();
        let models = vec![model("disabled", Provider::Anthropic, 0.9, false)];
        let decision = router.select_model(&request(TaskType::CodeGeneration), &models).await;
        assert!(decision.is_error());
        assert!(decision.rationale.contains("disabled") || decision.evidence.iter().any(|e| e.description.contains("disabled")));
    }

    #[tokio::test]
    async fn no_candidates_yields_error_decision() {
        let router = router();
        let mut req = request(TaskType::CodeGeneration);
        req.quality_requirement = 0.99;
        let models = vec![model("mediocre", Provider::Anthropic, 0.5, true)];
        let decision = router.select_model(&req, &models).await;
        assert_eq!(decision.selected_model, "none");
        assert_eq!(decision.routing_strategy, RoutingStrategy::Error);
        assert_eq!(decision.confidence, 0.0);
    }

    #[tokio::test]
    async fn budget_is_honored_for_standard_decisions() {
        let router = router();
        let mut req = request(TaskType::CodeGeneration);
        req.cost_budget = Some(0.005);
        let models = vec![
            model("cheap", Provider::Anthropic, 0.8, true),
            model("pricey", Provider::OpenAi, 0.99, true),
        ];
        let decision = router.select_model(&req, &models).await;
        assert!(decision.estimated_cost <= 0.005);
    }

    #[tokio::test]
    async fn long_context_filter_excludes_undersized_windows() {
        let router = router();
        let mut req = request(TaskType::LongContext);
        req.context_size = Some(150_000);

        let mut small = model("small-window", Provider::Anthropic, 0.9, true);
        small.context_window = 32_000;
        let mut large = model("large-window", Provider::Google, 0.85, true);
        large.context_window = 1_000_000;

        let decision = router.select_model(&req, &[small, large]).await;
        assert_eq!(decision.selected_model, "large-window");
        assert!(decision.evidence.iter().any(|e| e.description.contains("small-window") && e.description.contains("context window")));
    }

    #[tokio::test]
    async fn reasoning_task_routes_to_parallel() {
        let router = router();
        let models = vec![
            model("a1", Provider::Anthropic, 0.95, true),
            model("o1", Provider::OpenAi, 0.9, true),
            model("g1", Provider::Google, 0.85, true),
        ];
        let decision = router.select_model(&request(TaskType::Reasoning), &models).await;
        assert_eq!(decision.routing_strategy, RoutingStrategy::Parallel);
        assert_eq!(decision.confidence, 0.95);
        assert!(decision.parallel_models.is_some());
    }

    #[tokio::test]
    async fn open_circuit_excludes_provider() {
        let router = router();
        router.circuit_breaker.record_failure(&ProviderId::from(Provider::Anthropic)).await;
        for _ in 0..4 {
            router.circuit_breaker.record_failure(&ProviderId::from(Provider::Anthropic)).await;
        }
        let models = vec![
            model("a1", Provider::Anthropic, 0.95, true),
            model("o1", Provider::OpenAi, 0.8, true),
        ];
        let decision = router.select_model(&request(TaskType::CodeGeneration), &models).await;
        assert_eq!(decision.selected_model, "o1");
        assert!(decision.evidence.iter().any(|e| e.description.contains("circuit breaker")));
    }

    #[tokio::test]
    async fn record_outcome_opens_circuit_after_threshold() {
        let router = router();
        for _ in 0..5 {
            router.record_request_outcome("a1", Provider::Anthropic, &TaskType::CodeGeneration, false, None, None, None).await;
        }
        assert!(router.circuit_breaker.is_open(&ProviderId::from(Provider::Anthropic)).await);
    }
}

#[cfg(test)]
mod property_tests {
    use super::tests::{model, request};
    use super::*;
    use proptest::prelude::*;
    use tokio::runtime::Runtime;

    proptest! {
        /// Budget honored: when `cost_budget` is set, a standard (non-parallel)
        /// decision never selects a model whose expected cost exceeds it.
        #[test]
        fn prop_standard_decision_never_exceeds_budget(
            qualities in prop::collection::vec(0.7f64..1.0, 1..=4),
            budget in 0.0005f64..0.02,
        ) {
            let rt = Runtime::new().unwrap();
            rt.block_on(async {
                let router = router();
                let models: Vec<ModelDefinition> = qualities
                    .iter()
                    .enumerate()
                    .map(|(i, &q)| model(&format!("m{i}"), Provider::Anthropic, q, true))
                    .collect();

                let mut req = request(TaskType::CodeGeneration);
                req.cost_budget = Some(budget);

                let decision = router.select_model(&req, &models).await;
                if decision.routing_strategy != RoutingStrategy::Error {
                    prop_assert!(decision.estimated_cost <= budget + 1e-9);
                }
                Ok(())
            })?;
        }
    }
}
