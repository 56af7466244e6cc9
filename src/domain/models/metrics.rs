//! Metrics and circuit-breaker state: the data model owned by C3/C4/C5.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Time window over which `ProviderMetrics` queries aggregate samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeRange {
    LastHour,
    Last24h,
    Last7d,
    Last30d,
}

impl TimeRange {
    pub fn duration(self) -> chrono::Duration {
        match self {
            Self::LastHour => chrono::Duration::hours(1),
            Self::Last24h => chrono::Duration::hours(24),
            Self::Last7d => chrono::Duration::days(7),
            Self::Last30d => chrono::Duration::days(30),
        }
    }
}

/// Kind of anomaly `detect_anomalies` can flag for a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    CostSpike,
    LatencySpike,
    SuccessRateDrop,
}

/// Time-decayed outcome tracker keyed by `(model_id, task_type)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub ema_latency_ms: f64,
    pub ema_cost: f64,
    pub ema_quality_score: f64,
    pub last_updated: DateTime<Utc>,
}

const EMA_ALPHA: f64 = 0.1;
const MIN_SAMPLE_SIZE: u64 = 10;
const HALF_LIFE_HOURS: f64 = 168.0;

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self {
            total: 0,
            successful: 0,
            failed: 0,
            ema_latency_ms: 0.0,
            ema_cost: 0.0,
            ema_quality_score: 0.0,
            last_updated: Utc::now(),
        }
    }
}

impl PerformanceMetrics {
    /// `successful / total`, `0.0` when no samples have been recorded yet.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.successful as f64 / self.total as f64
        }
    }

    pub fn record(&mut self, success: bool, latency_ms: Option<f64>, cost: Option<f64>, quality: Option<f64>) {
        self.total += 1;
        if success {
            self.successful += 1;
        } else {
            self.failed += 1;
        }
        if let Some(latency) = latency_ms {
            self.ema_latency_ms = ema(self.ema_latency_ms, latency, self.total);
        }
        if let Some(cost) = cost {
            self.ema_cost = ema(self.ema_cost, cost, self.total);
        }
        if let Some(quality) = quality {
            self.ema_quality_score = ema(self.ema_quality_score, quality, self.total);
        }
        self.last_updated = Utc::now();
    }

    /// `get_recommendation_weight`: a neutral 0.5 below the minimum sample
    /// size, otherwise a blend of success rate and a time-decayed confidence.
    pub fn recommendation_weight(&self, now: DateTime<Utc>) -> f64 {
        if self.total < MIN_SAMPLE_SIZE {
            return 0.5;
        }
        let age_hours = (now - self.last_updated).num_seconds() as f64 / 3600.0;
        let confidence = (self.total as f64 / 100.0).min(1.0) * 0.5_f64.powf(age_hours / HALF_LIFE_HOURS);
        0.7 * self.success_rate() + 0.3 * confidence
    }
}

/// First sample uses the raw value directly so a single observation doesn't
/// get diluted by the zero-initialized EMA.
fn ema(previous: f64, sample: f64, count: u64) -> f64 {
    if count <= 1 {
        sample
    } else {
        EMA_ALPHA * sample + (1.0 - EMA_ALPHA) * previous
    }
}

/// Per-provider circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerState {
    pub state: CircuitState,
    pub failure_count: u32,
    pub last_failure: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub failure_threshold: u32,
    pub retry_timeout_seconds: u64,
}

impl Default for CircuitBreakerState {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure: None,
            last_success: None,
            next_retry_at: None,
            failure_threshold: 5,
            retry_timeout_seconds: 60,
        }
    }
}
