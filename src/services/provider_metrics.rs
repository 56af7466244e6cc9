//! Provider Metrics (C4): bounded ring buffer of per-execution samples with
//! win-rate, percentile-latency, and cross-provider anomaly detection.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::instrument;

use crate::domain::models::{AnomalyKind, ProviderId, TaskType, TimeRange};

const DEFAULT_CAPACITY: usize = 10_000;
const MIN_SAMPLES_FOR_ANOMALY: usize = 10;

/// One recorded execution against a provider.
#[derive(Debug, Clone)]
pub struct ExecutionSample {
    pub provider: ProviderId,
    pub task_type: TaskType,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub cost: f64,
    pub latency_ms: f64,
    pub success: bool,
    pub tool_calls_count: u32,
    pub timestamp: DateTime<Utc>,
}

/// Aggregated stats for a provider over a time range.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderStats {
    pub sample_count: usize,
    pub avg_cost: f64,
    pub avg_latency_ms: f64,
    pub p50_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub p99_latency_ms: f64,
    pub success_rate: f64,
}

impl ProviderStats {
    fn empty() -> Self {
        Self {
            sample_count: 0,
            avg_cost: 0.0,
            avg_latency_ms: 0.0,
            p50_latency_ms: 0.0,
            p95_latency_ms: 0.0,
            p99_latency_ms: 0.0,
            success_rate: 0.0,
        }
    }

    fn from_samples(samples: &[&ExecutionSample]) -> Self {
        if samples.is_empty() {
            return Self::empty();
        }

        let count = samples.len();
        let avg_cost = samples.iter().map(|s| s.cost).sum::<f64>() / count as f64;
        let avg_latency_ms = samples.iter().map(|s| s.latency_ms).sum::<f64>() / count as f64;
        let successes = samples.iter().filter(|s| s.success).count();

        let mut latencies: Vec<f64> = samples.iter().map(|s| s.latency_ms).collect();
        latencies.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        Self {
            sample_count: count,
            avg_cost,
            avg_latency_ms,
            p50_latency_ms: percentile(&latencies, 0.50),
            p95_latency_ms: percentile(&latencies, 0.95),
            p99_latency_ms: percentile(&latencies, 0.99),
            success_rate: successes as f64 / count as f64,
        }
    }
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() as f64 - 1.0) * p).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// A flagged deviation from the cross-provider mean.
#[derive(Debug, Clone, PartialEq)]
pub struct Anomaly {
    pub provider: ProviderId,
    pub kind: AnomalyKind,
    pub observed: f64,
    pub baseline: f64,
}

/// Per-provider bounded ring of execution samples.
pub struct ProviderMetrics {
    capacity: usize,
    samples: Arc<RwLock<HashMap<ProviderId, VecDeque<ExecutionSample>>>>,
}

impl ProviderMetrics {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            samples: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }

    #[instrument(name = "provider_metrics.record", skip(self, sample), fields(provider = %sample.provider, cost = sample.cost, success = sample.success))]
    pub async fn record(&self, sample: ExecutionSample) {
        let mut samples = self.samples.write().await;
        let ring = samples.entry(sample.provider.clone()).or_default();
        if ring.len() >= self.capacity {
            ring.pop_front();
        }
        ring.push_back(sample);
    }

    async fn samples_in_range(
        &self,
        provider: &ProviderId,
        range: TimeRange,
        task_type: Option<&TaskType>,
    ) -> Vec<ExecutionSample> {
        let cutoff = Utc::now() - range.duration();
        let samples = self.samples.read().await;
        samples
            .get(provider)
            .into_iter()
            .flatten()
            .filter(|s| s.timestamp >= cutoff)
            .filter(|s| task_type.is_none_or(|t| &s.task_type == t))
            .cloned()
            .collect()
    }

    pub async fn stats(&self, provider: &ProviderId, range: TimeRange, task_type: Option<&TaskType>) -> ProviderStats {
        let samples = self.samples_in_range(provider, range, task_type).await;
        let refs: Vec<&ExecutionSample> = samples.iter().collect();
        ProviderStats::from_samples(&refs)
    }

    pub async fn win_rates(&self, task_type: &TaskType, range: TimeRange) -> HashMap<ProviderId, f64> {
        let samples = self.samples.read().await;
        let cutoff = Utc::now() - range.duration();
        let mut result = HashMap::new();
        for (provider, ring) in samples.iter() {
            let matching: Vec<&ExecutionSample> =
                ring.iter().filter(|s| s.timestamp >= cutoff && &s.task_type == task_type).collect();
            if !matching.is_empty() {
                let stats = ProviderStats::from_samples(&matching);
                result.insert(provider.clone(), stats.success_rate);
            }
        }
        result
    }

    pub async fn cost_performance_curve(&self, task_type: &TaskType, range: TimeRange) -> Vec<(ProviderId, f64, f64)> {
        let samples = self.samples.read().await;
        let cutoff = Utc::now() - range.duration();
        let mut curve: Vec<(ProviderId, f64, f64)> = vec![];
        for (provider, ring) in samples.iter() {
            let matching: Vec<&ExecutionSample> =
                ring.iter().filter(|s| s.timestamp >= cutoff && &s.task_type == task_type).collect();
            if !matching.is_empty() {
                let stats = ProviderStats::from_samples(&matching);
                curve.push((provider.clone(), stats.avg_cost, stats.success_rate));
            }
        }
        curve.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        curve
    }

    /// Flags `provider`'s stats as anomalous against the cross-provider mean
    /// for the same task type/range. No anomaly is emitted below 10 samples
    /// for either the provider or the baseline population.
    #[instrument(name = "provider_metrics.detect_anomalies", skip(self), fields(provider = %provider))]
    pub async fn detect_anomalies(&self, provider: &ProviderId, task_type: Option<&TaskType>, range: TimeRange) -> Vec<Anomaly> {
        let provider_samples = self.samples_in_range(provider, range, task_type).await;
        if provider_samples.len() < MIN_SAMPLES_FOR_ANOMALY {
            return vec![];
        }
        let provider_refs: Vec<&ExecutionSample> = provider_samples.iter().collect();
        let provider_stats = ProviderStats::from_samples(&provider_refs);

        let all = self.samples.read().await;
        let cutoff = Utc::now() - range.duration();
        let baseline_samples: Vec<ExecutionSample> = all
            .iter()
            .filter(|(p, _)| *p != provider)
            .flat_map(|(_, ring)| ring.iter())
            .filter(|s| s.timestamp >= cutoff)
            .filter(|s| task_type.is_none_or(|t| &s.task_type == t))
            .cloned()
            .collect();
        drop(all);

        if baseline_samples.len() < MIN_SAMPLES_FOR_ANOMALY {
            return vec![];
        }
        let baseline_refs: Vec<&ExecutionSample> = baseline_samples.iter().collect();
        let baseline_stats = ProviderStats::from_samples(&baseline_refs);

        let mut anomalies = vec![];
        if baseline_stats.avg_cost > 0.0 && provider_stats.avg_cost > baseline_stats.avg_cost * 2.0 {
            anomalies.push(Anomaly {
                provider: provider.clone(),
                kind: AnomalyKind::CostSpike,
                observed: provider_stats.avg_cost,
                baseline: baseline_stats.avg_cost,
            });
        }
        if baseline_stats.avg_latency_ms > 0.0 && provider_stats.avg_latency_ms > baseline_stats.avg_latency_ms * 2.0 {
            anomalies.push(Anomaly {
                provider: provider.clone(),
                kind: AnomalyKind::LatencySpike,
                observed: provider_stats.avg_latency_ms,
                baseline: baseline_stats.avg_latency_ms,
            });
        }
        if provider_stats.success_rate < baseline_stats.success_rate * 0.5 {
            anomalies.push(Anomaly {
                provider: provider.clone(),
                kind: AnomalyKind::SuccessRateDrop,
                observed: provider_stats.success_rate,
                baseline: baseline_stats.success_rate,
            });
        }
        if !anomalies.is_empty() {
            tracing::warn!(provider = %provider, count = anomalies.len(), "provider anomalies detected");
        }
        anomalies
    }
}

impl Default for ProviderMetrics {
    fn default() -> Self {
        Self::with_defaults()
    }
}
