//! Criterion benchmarks for the MoE Router's hot path.
//!
//! Run with:
//!   cargo bench --bench moe_router
//!
//! Covers:
//!   - cost prediction (pure function, no locking)
//!   - select_model over a standard (non-parallel) request
//!   - select_model over a request that triggers parallel fan-out

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use orchestrator_core::domain::models::{Capability, ModelDefinition, Provider, RoutingRequest, TaskPreferences, TaskType};
use orchestrator_core::services::{cost_predictor, CircuitBreakerService, LearningLoop, MoeRouter, PerformanceTracker};
use tokio::runtime::Runtime;

fn model(id: &str, provider: Provider, quality: f64) -> ModelDefinition {
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
        latency_p50_ms: Some(400),
        latency_p95_ms: Some(900),
        enabled: true,
        fallback_models: vec![],
        tags: vec![],
    }
}

fn catalog() -> Vec<ModelDefinition> {
    vec![
        model("claude-sonnet", Provider::Anthropic, 0.93),
        model("gpt-4o", Provider::OpenAi, 0.9),
        model("gemini-pro", Provider::Google, 0.85),
        model("mistral-large", Provider::Mistral, 0.8),
    ]
}

fn request(task_type: TaskType) -> RoutingRequest {
    RoutingRequest {
        task_type,
        task_description: "implement a rate limiter for the gateway".into(),
        estimated_input_tokens: Some(2_000),
        estimated_output_tokens: 800,
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
        metadata: Default::default(),
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

fn bench_cost_predictor(c: &mut Criterion) {
    let models = catalog();
    let req = request(TaskType::CodeGeneration);
    c.bench_function("cost_predictor_predict", |b| {
        b.iter(|| {
            let prediction = cost_predictor::predict(black_box(&models[0]), black_box(&req));
            black_box(prediction);
        });
    });
}

fn bench_select_model_standard(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let router = router();
    let models = catalog();
    let req = request(TaskType::CodeGeneration);

    c.bench_function("select_model_standard", |b| {
        b.to_async(&rt).iter(|| async { black_box(router.select_model(&req, &models).await) });
    });
}

fn bench_select_model_parallel(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let router = router();
    let models = catalog();
    let req = request(TaskType::Reasoning);

    c.bench_function("select_model_parallel", |b| {
        b.to_async(&rt).iter(|| async { black_box(router.select_model(&req, &models).await) });
    });
}

criterion_group!(benches, bench_cost_predictor, bench_select_model_standard, bench_select_model_parallel);
criterion_main!(benches);
