//! Performance Tracker (C3): time-decayed per-`(model, task_type)` outcome
//! store behind a pluggable `MetricsStore`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::instrument;

use crate::domain::models::{PerformanceMetrics, TaskType};

/// Storage port for `PerformanceMetrics`. The in-memory implementation is
/// the default; an external durable store MAY back this instead.
#[async_trait]
pub trait MetricsStore: Send + Sync {
    async fn record(
        &self,
        model_id: &str,
        task_type: &TaskType,
        success: bool,
        latency_ms: Option<f64>,
        cost: Option<f64>,
        quality: Option<f64>,
    );

    async fn get(&self, model_id: &str, task_type: &TaskType) -> PerformanceMetrics;
}

type MetricsKey = (String, TaskType);

/// Default in-memory `MetricsStore`.
#[derive(Default)]
pub struct InMemoryMetricsStore {
    metrics: Arc<RwLock<HashMap<MetricsKey, PerformanceMetrics>>>,
}

impl InMemoryMetricsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetricsStore for InMemoryMetricsStore {
    async fn record(
        &self,
        model_id: &str,
        task_type: &TaskType,
        success: bool,
        latency_ms: Option<f64>,
        cost: Option<f64>,
        quality: Option<f64>,
    ) {
        let key = (model_id.to_string(), task_type.clone());
        let mut metrics = self.metrics.write().await;
        metrics.entry(key).or_default().record(success, latency_ms, cost, quality);
    }

    async fn get(&self, model_id: &str, task_type: &TaskType) -> PerformanceMetrics {
        let key = (model_id.to_string(), task_type.clone());
        self.metrics.read().await.get(&key).cloned().unwrap_or_default()
    }
}

/// Performance Tracker service: thin facade over a `MetricsStore`.
pub struct PerformanceTracker {
    store: Arc<dyn MetricsStore>,
}

impl PerformanceTracker {
    pub fn new(store: Arc<dyn MetricsStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryMetricsStore::new()))
    }

    #[instrument(name = "performance_tracker.record", skip(self, task_type, latency_ms, cost, quality), fields(model_id = %model_id, success))]
    pub async fn record(
        &self,
        model_id: &str,
        task_type: &TaskType,
        success: bool,
        latency_ms: Option<f64>,
        cost: Option<f64>,
        quality: Option<f64>,
    ) {
        self.store.record(model_id, task_type, success, latency_ms, cost, quality).await;
    }

    pub async fn get_recommendation_weight(&self, model_id: &str, task_type: &TaskType) -> f64 {
        let metrics = self.store.get(model_id, task_type).await;
        metrics.recommendation_weight(Utc::now())
    }

    pub async fn get_metrics(&self, model_id: &str, task_type: &TaskType) -> PerformanceMetrics {
        self.store.get(model_id, task_type).await
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;
    use tokio::runtime::Runtime;

    proptest! {
        /// Idempotence of recording: whatever order a fixed multiset of
        /// outcomes is recorded in, `successful + failed == total` and the
        /// individual counts match the multiset.
        #[test]
        fn prop_counts_are_order_independent(outcomes in prop::collection::vec(any::<bool>(), 0..50)) {
            let rt = Runtime::new().unwrap();
            rt.block_on(async {
                let tracker = PerformanceTracker::in_memory();
                for &success in &outcomes {
                    tracker.record("model-x", &TaskType::CodeGeneration, success, Some(100.0), Some(0.001), Some(0.8)).await;
                }

                let metrics = tracker.get_metrics("model-x", &TaskType::CodeGeneration).await;
                let expected_successful = outcomes.iter().filter(|&&s| s).count() as u64;
                let expected_failed = outcomes.iter().filter(|&&s| !s).count() as u64;

                prop_assert_eq!(metrics.total, outcomes.len() as u64);
                prop_assert_eq!(metrics.successful, expected_successful);
                prop_assert_eq!(metrics.failed, expected_failed);
                prop_assert_eq!(metrics.successful + metrics.failed, metrics.total);
                Ok(())
            })?;
        }
    }
}
