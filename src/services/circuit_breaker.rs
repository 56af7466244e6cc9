//! Per-provider circuit breaker (C5): CLOSED / OPEN / HALF_OPEN state
//! machine gating which providers the MoE Router may route to.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::instrument;

use crate::domain::models::{CircuitBreakerState, CircuitState, ProviderId};

/// Tunables shared by every provider's breaker.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub retry_timeout_seconds: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            retry_timeout_seconds: 60,
        }
    }
}

/// Manages one `CircuitBreakerState` per provider.
pub struct CircuitBreakerService {
    config: CircuitBreakerConfig,
    states: Arc<RwLock<HashMap<ProviderId, CircuitBreakerState>>>,
}

impl CircuitBreakerService {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            states: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }

    fn new_state(&self) -> CircuitBreakerState {
        CircuitBreakerState {
            failure_threshold: self.config.failure_threshold,
            retry_timeout_seconds: self.config.retry_timeout_seconds,
            ..CircuitBreakerState::default()
        }
    }

    /// `is_open`: true while the provider's breaker is OPEN. An OPEN breaker
    /// whose `next_retry_at` has passed transitions to HALF_OPEN in place
    /// and returns `false` (the request is allowed through as a probe).
    #[instrument(name = "circuit_breaker.is_open", skip(self), fields(provider = %provider))]
    pub async fn is_open(&self, provider: &ProviderId) -> bool {
        let mut states = self.states.write().await;
        let state = states.entry(provider.clone()).or_insert_with(|| self.new_state());

        if state.state != CircuitState::Open {
            return false;
        }

        let now = Utc::now();
        if state.next_retry_at.is_some_and(|retry_at| now >= retry_at) {
            state.state = CircuitState::HalfOpen;
            false
        } else {
            true
        }
    }

    /// On failure: increment `failure_count`; open the breaker once the
    /// threshold is reached (from CLOSED) or immediately (from HALF_OPEN).
    #[instrument(name = "circuit_breaker.record_failure", skip(self), fields(provider = %provider))]
    pub async fn record_failure(&self, provider: &ProviderId) {
        let mut states = self.states.write().await;
        let state = states.entry(provider.clone()).or_insert_with(|| self.new_state());

        let now = Utc::now();
        state.failure_count += 1;
        state.last_failure = Some(now);

        let should_open = state.state == CircuitState::HalfOpen
            || (state.state == CircuitState::Closed && state.failure_count >= state.failure_threshold);

        if should_open {
            state.state = CircuitState::Open;
            state.next_retry_at = Some(now + chrono::Duration::seconds(state.retry_timeout_seconds as i64));
            tracing::warn!(provider = %provider, "circuit breaker opened");
        }
    }

    /// On success: reset `failure_count`; HALF_OPEN closes.
    #[instrument(name = "circuit_breaker.record_success", skip(self), fields(provider = %provider))]
    pub async fn record_success(&self, provider: &ProviderId) {
        let mut states = self.states.write().await;
        let state = states.entry(provider.clone()).or_insert_with(|| self.new_state());

        state.failure_count = 0;
        state.last_success = Some(Utc::now());
        if state.state == CircuitState::HalfOpen {
            state.state = CircuitState::Closed;
            state.next_retry_at = None;
        }
    }

    pub async fn state_for(&self, provider: &ProviderId) -> CircuitBreakerState {
        let states = self.states.read().await;
        states.get(provider).cloned().unwrap_or_else(|| self.new_state())
    }

    pub async fn open_providers(&self) -> Vec<ProviderId> {
        let states = self.states.read().await;
        states
            .iter()
            .filter(|(_, s)| s.state == CircuitState::Open)
            .map(|(p, _)| p.clone())
            .collect()
    }

    pub async fn reset(&self, provider: &ProviderId) {
        let mut states = self.states.write().await;
        states.insert(provider.clone(), self.new_state());
    }
}

/// When a breaker in OPEN excludes a provider from filtering, the MoE
/// Router records this so it can emit Evidence for the caller.
pub struct CircuitRejection {
    pub provider: ProviderId,
    pub since: DateTime<Utc>,
}
