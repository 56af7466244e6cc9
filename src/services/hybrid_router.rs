//! Hybrid Router (C9): decides whether a request should fan out to several
//! models in parallel, and picks the parallel set / judge / consensus
//! strategy when it does.

use crate::domain::models::{ModelDefinition, Provider, RoutingRequest, TaskType};

/// How a parallel execution's responses should be reduced to one answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsensusStrategy {
    /// A judge model selects the best response.
    Judge,
    /// The response from the highest-quality responder wins outright.
    QualityWeighted,
    /// Majority vote over comparable outputs; undefined for non-comparable
    /// outputs, which callers must detect and signal separately.
    Voting,
    /// Race all members; the first non-error response wins.
    FirstSuccess,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostQualityTradeoff {
    pub num_models: usize,
    pub total_cost: f64,
    pub max_quality: f64,
    pub quality_improvement: f64,
    pub within_budget: bool,
}

const PARALLEL_TASK_TYPES: [TaskType; 4] =
    [TaskType::SecurityAudit, TaskType::CodeReview, TaskType::Planning, TaskType::Reasoning];

/// True when `request` should fan out to several models instead of routing
/// to a single one.
pub fn should_use_parallel(request: &RoutingRequest) -> bool {
    if request.enable_parallel {
        return true;
    }
    if PARALLEL_TASK_TYPES.contains(&request.task_type) {
        return true;
    }
    if request.quality_requirement >= 0.9 && request.cost_budget.is_some_and(|b| b >= 0.05) {
        return true;
    }
    request.is_critical()
}

/// Picks up to `n` models, preferring provider diversity (no provider twice
/// until every available provider has been used once) and, within that
/// constraint, highest quality first.
pub fn select_parallel_models(models: &[ModelDefinition], n: usize) -> Vec<ModelDefinition> {
    let mut by_quality: Vec<&ModelDefinition> = models.iter().collect();
    by_quality.sort_by(|a, b| b.quality_score.total_cmp(&a.quality_score));

    let mut selected: Vec<ModelDefinition> = Vec::new();
    let mut used_providers: Vec<Provider> = Vec::new();

    loop {
        let before = selected.len();
        for model in &by_quality {
            if selected.len() >= n {
                break;
            }
            if selected.iter().any(|m| m.id == model.id) {
                continue;
            }
            if used_providers.contains(&model.provider) {
                continue;
            }
            selected.push((*model).clone());
            used_providers.push(model.provider);
        }
        if selected.len() >= n || selected.len() == before {
            break;
        }
        // every provider used at least once; relax the constraint and allow
        // repeats, still walking in quality order.
        used_providers.clear();
    }

    selected.truncate(n);
    selected
}

/// Picks the judge model: highest quality not already in the parallel set,
/// falling back to the highest-quality model overall when none qualifies.
pub fn select_judge_model<'a>(
    models: &'a [ModelDefinition],
    parallel_set: &[ModelDefinition],
) -> Option<&'a ModelDefinition> {
    let outside = models
        .iter()
        .filter(|m| !parallel_set.iter().any(|p| p.id == m.id))
        .max_by(|a, b| a.quality_score.total_cmp(&b.quality_score));

    outside.or_else(|| models.iter().max_by(|a, b| a.quality_score.total_cmp(&b.quality_score)))
}

/// `quality_improvement = max_quality - best_quality_of_a_single_model`,
/// where "a single model" means the model `select_judge_model` would have
/// routed to alone instead of fanning out: the highest-quality candidate
/// outside `parallel_set`, or `max_quality` itself (zero improvement) when
/// every eligible candidate was already swept into the parallel set.
pub fn calculate_cost_quality_tradeoff(
    candidates: &[ModelDefinition],
    parallel_set: &[ModelDefinition],
    costs: &[f64],
    budget: Option<f64>,
) -> CostQualityTradeoff {
    let total_cost: f64 = costs.iter().sum();
    let max_quality = parallel_set.iter().map(|m| m.quality_score).fold(0.0_f64, f64::max);
    let best_single =
        select_judge_model(candidates, parallel_set).map_or(max_quality, |m| m.quality_score);

    CostQualityTradeoff {
        num_models: parallel_set.len(),
        total_cost,
        max_quality,
        quality_improvement: max_quality - best_single,
        within_budget: budget.is_none_or(|b| total_cost <= b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Capability;
    use std::collections::HashMap;

    pub(super) fn model(id: &str, provider: Provider, quality: f64) -> ModelDefinition {
        ModelDefinition {
            id: id.to_string(),
            provider,
            capabilities: vec![Capability::Reasoning],
            cost_per_1k_input: 0.003,
            cost_per_1k_output: 0.015,
            context_window: 200_000,
            quality_score: quality,
            max_output_tokens: None,
            supports_streaming: false,
            latency_p50_ms: None,
            latency_p95_ms: None,
            enabled: true,
            fallback_models: vec![],
            tags: vec![],
        }
    }

    fn request(task_type: TaskType) -> RoutingRequest {
        RoutingRequest {
            task_type,
            task_description: "do the thing".into(),
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

    #[test]
    fn enable_parallel_flag_forces_parallel() {
        let mut req = request(TaskType::Documentation);
        req.enable_parallel = true;
        assert!(should_use_parallel(&req));
    }

    #[test]
    fn reasoning_task_type_triggers_parallel() {
        assert!(should_use_parallel(&request(TaskType::Reasoning)));
    }

    #[test]
    fn documentation_task_does_not_trigger_parallel_by_default() {
        assert!(!should_use_parallel(&request(TaskType::Documentation)));
    }

    #[test]
    fn high_quality_and_budget_combo_triggers_parallel() {
        let mut req = request(TaskType::Documentation);
        req.quality_requirement = 0.95;
        req.cost_budget = Some(0.15);
        assert!(should_use_parallel(&req));
    }

    #[test]
    fn high_quality_without_sufficient_budget_does_not_trigger() {
        let mut req = request(TaskType::Documentation);
        req.quality_requirement = 0.95;
        req.cost_budget = Some(0.01);
        assert!(!should_use_parallel(&req));
    }

    #[test]
    fn critical_metadata_triggers_parallel() {
        let mut req = request(TaskType::Documentation);
        req.metadata.insert("critical".into(), serde_json::Value::Bool(true));
        assert!(should_use_parallel(&req));
    }

    #[test]
    fn diversity_invariant_no_provider_repeats_when_enough_providers_available() {
        let models = vec![
            model("a1", Provider::Anthropic, 0.95),
            model("a2", Provider::Anthropic, 0.9),
            model("o1", Provider::OpenAi, 0.85),
            model("g1", Provider::Google, 0.8),
        ];
        let selected = select_parallel_models(&models, 3);
        assert_eq!(selected.len(), 3);
        let providers: Vec<Provider> = selected.iter().map(|m| m.provider).collect();
        let mut unique = providers.clone();
        unique.sort_by_key(|p| format!("{p:?}"));
        unique.dedup();
        assert_eq!(unique.len(), providers.len());
    }

    #[test]
    fn quality_breaks_ties_within_diversity_constraint() {
        let models = vec![
            model("a-low", Provider::Anthropic, 0.6),
            model("o-high", Provider::OpenAi, 0.95),
            model("g-mid", Provider::Google, 0.8),
        ];
        let selected = select_parallel_models(&models, 2);
        assert_eq!(selected[0].id, "o-high");
    }

    #[test]
    fn judge_excludes_parallel_set_members() {
        let models = vec![
            model("a1", Provider::Anthropic, 0.95),
            model("o1", Provider::OpenAi, 0.9),
            model("g1", Provider::Google, 0.99),
        ];
        let parallel_set = vec![models[2].clone(), models[0].clone()];
        let judge = select_judge_model(&models, &parallel_set).unwrap();
        assert_eq!(judge.id, "o1");
    }

    #[test]
    fn judge_falls_back_to_overall_best_when_all_models_are_in_the_parallel_set() {
        let models = vec![model("a1", Provider::Anthropic, 0.7), model("o1", Provider::OpenAi, 0.9)];
        let judge = select_judge_model(&models, &models).unwrap();
        assert_eq!(judge.id, "o1");
    }

    #[test]
    fn tradeoff_sums_cost_and_tracks_max_quality() {
        let set = vec![model("a1", Provider::Anthropic, 0.8), model("o1", Provider::OpenAi, 0.9)];
        let tradeoff = calculate_cost_quality_tradeoff(&set, &set, &[0.01, 0.02], Some(0.05));
        assert_eq!(tradeoff.num_models, 2);
        assert!((tradeoff.total_cost - 0.03).abs() < 1e-9);
        assert!((tradeoff.max_quality - 0.9).abs() < 1e-9);
        assert!(tradeoff.within_budget);
    }

    #[test]
    fn tradeoff_flags_over_budget() {
        let set = vec![model("a1", Provider::Anthropic, 0.8)];
        let tradeoff = calculate_cost_quality_tradeoff(&set, &set, &[0.2], Some(0.05));
        assert!(!tradeoff.within_budget);
    }

    #[test]
    fn tradeoff_is_zero_when_the_parallel_set_covers_every_candidate() {
        let set = vec![model("a1", Provider::Anthropic, 0.8), model("o1", Provider::OpenAi, 0.9)];
        let tradeoff = calculate_cost_quality_tradeoff(&set, &set, &[0.01, 0.02], None);
        assert_eq!(tradeoff.quality_improvement, 0.0);
    }

    #[test]
    fn tradeoff_is_positive_when_the_best_candidate_is_excluded_from_the_parallel_set() {
        let candidates = vec![
            model("a1", Provider::Anthropic, 0.95),
            model("o1", Provider::OpenAi, 0.7),
            model("g1", Provider::Google, 0.6),
        ];
        let parallel_set = vec![candidates[0].clone()];
        let tradeoff = calculate_cost_quality_tradeoff(&candidates, &parallel_set, &[0.01], None);
        assert!((tradeoff.max_quality - 0.95).abs() < 1e-9);
        assert!((tradeoff.quality_improvement - 0.25).abs() < 1e-9);
    }
}

#[cfg(test)]
mod property_tests {
    use super::tests::model;
    use super::*;
    use proptest::prelude::*;

    const PROVIDERS: [Provider; 4] = [Provider::Anthropic, Provider::OpenAi, Provider::Google, Provider::Mistral];

    proptest! {
        /// Diversity invariant: when at least `n` distinct providers are
        /// available, `select_parallel_models(n)` never selects the same
        /// provider twice.
        #[test]
        fn prop_no_repeated_provider_when_enough_providers_available(
            qualities in prop::collection::vec(0.0f64..1.0, 4..=4),
            n in 1usize..=4,
        ) {
            let models: Vec<ModelDefinition> = PROVIDERS
                .iter()
                .zip(qualities.iter())
                .enumerate()
                .map(|(i, (&provider, &quality))| model(&format!("m{i}"), provider, quality))
                .collect();

            let selected = select_parallel_models(&models, n);
            prop_assert_eq!(selected.len(), n);

            let mut providers: Vec<String> = selected.iter().map(|m| format!("{:?}", m.provider)).collect();
            providers.sort();
            let before = providers.len();
            providers.dedup();
            prop_assert_eq!(providers.len(), before);
        }
    }
}
