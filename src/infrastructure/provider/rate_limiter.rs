//! Rate Limiter (C6): per-identifier sliding-window counters for requests
//! and tokens at minute/hour/day granularity, plus a concurrent-request
//! semaphore.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::sleep;

/// Per-window request/token caps. `None` disables that window's check.
#[derive(Debug, Clone, Copy)]
pub struct WindowLimits {
    pub per_minute: Option<u32>,
    pub per_hour: Option<u32>,
    pub per_day: Option<u32>,
}

impl WindowLimits {
    pub const fn unlimited() -> Self {
        Self { per_minute: None, per_hour: None, per_day: None }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimiterConfig {
    pub requests: WindowLimits,
    pub tokens: WindowLimits,
    pub max_concurrent_requests: usize,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            requests: WindowLimits { per_minute: Some(50), per_hour: None, per_day: None },
            tokens: WindowLimits { per_minute: Some(40_000), per_hour: None, per_day: None },
            max_concurrent_requests: 10,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Window {
    Minute,
    Hour,
    Day,
}

impl Window {
    fn duration(self) -> ChronoDuration {
        match self {
            Self::Minute => ChronoDuration::minutes(1),
            Self::Hour => ChronoDuration::hours(1),
            Self::Day => ChronoDuration::days(1),
        }
    }
}

/// A single sliding-window entry: when it happened and how much it counted
/// for (1 for a request, N for N tokens).
#[derive(Debug, Clone, Copy)]
struct Entry {
    at: DateTime<Utc>,
    amount: u64,
}

struct SlidingCounter {
    entries: VecDeque<Entry>,
}

impl SlidingCounter {
    fn new() -> Self {
        Self { entries: VecDeque::new() }
    }

    fn evict_before(&mut self, cutoff: DateTime<Utc>) {
        while self.entries.front().is_some_and(|e| e.at < cutoff) {
            self.entries.pop_front();
        }
    }

    fn sum_since(&self, cutoff: DateTime<Utc>) -> u64 {
        self.entries.iter().filter(|e| e.at >= cutoff).map(|e| e.amount).sum()
    }

    fn record(&mut self, at: DateTime<Utc>, amount: u64) {
        self.entries.push_back(Entry { at, amount });
    }

    /// Seconds until `sum_since(now - window)` would drop enough to admit
    /// one more unit, based on the oldest entry in that window.
    fn wait_seconds(&self, window: ChronoDuration) -> f64 {
        self.entries
            .front()
            .map(|e| {
                let expires_at = e.at + window;
                (expires_at - Utc::now()).num_milliseconds().max(0) as f64 / 1000.0
            })
            .unwrap_or(0.0)
    }
}

struct WindowedCounters {
    minute: SlidingCounter,
    hour: SlidingCounter,
    day: SlidingCounter,
}

impl WindowedCounters {
    fn new() -> Self {
        Self { minute: SlidingCounter::new(), hour: SlidingCounter::new(), day: SlidingCounter::new() }
    }

    fn evict(&mut self, now: DateTime<Utc>) {
        self.minute.evict_before(now - Window::Minute.duration());
        self.hour.evict_before(now - Window::Hour.duration());
        self.day.evict_before(now - Window::Day.duration());
    }

    fn record(&mut self, now: DateTime<Utc>, amount: u64) {
        self.minute.record(now, amount);
        self.hour.record(now, amount);
        self.day.record(now, amount);
    }

    /// Returns `Some(wait_seconds)` for the first window that would reject
    /// `amount` more units, or `None` if every configured window admits it.
    fn check(&self, limits: WindowLimits, amount: u64, now: DateTime<Utc>) -> Option<f64> {
        let windows = [
            (limits.per_minute, Window::Minute, &self.minute),
            (limits.per_hour, Window::Hour, &self.hour),
            (limits.per_day, Window::Day, &self.day),
        ];
        for (limit, window, counter) in windows {
            if let Some(limit) = limit {
                if counter.sum_since(now - window.duration()) + amount > u64::from(limit) {
                    return Some(counter.wait_seconds(window.duration()));
                }
            }
        }
        None
    }
}

/// RAII guard releasing one concurrency permit on drop (success, error, or
/// panic unwind all release it).
pub struct RateLimitGuard {
    _permit: OwnedSemaphorePermit,
}

struct LimiterState {
    requests: WindowedCounters,
    tokens: WindowedCounters,
}

/// Rate Limiter (C6) for a single identifier (typically a provider).
pub struct RateLimiter {
    config: RateLimiterConfig,
    state: Mutex<LimiterState>,
    concurrency: Arc<Semaphore>,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        let concurrency = Arc::new(Semaphore::new(config.max_concurrent_requests));
        Self {
            config,
            state: Mutex::new(LimiterState { requests: WindowedCounters::new(), tokens: WindowedCounters::new() }),
            concurrency,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(RateLimiterConfig::default())
    }

    /// Blocks until every configured window (requests and tokens) admits
    /// this call, then records it and acquires a concurrency permit. The
    /// returned guard releases the permit when dropped.
    pub async fn acquire(&self, estimated_tokens: u64) -> RateLimitGuard {
        loop {
            let now = Utc::now();
            let mut state = self.state.lock().await;
            state.requests.evict(now);
            state.tokens.evict(now);

            let requests_wait = state.requests.check(self.config.requests, 1, now);
            let tokens_wait = state.tokens.check(self.config.tokens, estimated_tokens, now);

            match (requests_wait, tokens_wait) {
                (None, None) => {
                    state.requests.record(now, 1);
                    state.tokens.record(now, estimated_tokens);
                    break;
                }
                (wait_a, wait_b) => {
                    let wait = wait_a.into_iter().chain(wait_b).fold(0.0_f64, f64::max).max(0.01);
                    drop(state);
                    sleep(std::time::Duration::from_secs_f64(wait)).await;
                }
            }
        }

        let permit = self
            .concurrency
            .clone()
            .acquire_owned()
            .await
            .expect("semaphore is never closed");
        RateLimitGuard { _permit: permit }
    }

    pub async fn in_flight(&self) -> usize {
        self.config.max_concurrent_requests - self.concurrency.available_permits()
    }

    /// Non-blocking, non-recording check of whether a request would be
    /// admitted right now. Used by the Quota Service, which probes C6's
    /// counters without performing a blocking `acquire`.
    pub async fn would_admit(&self, estimated_tokens: u64) -> bool {
        let now = Utc::now();
        let mut state = self.state.lock().await;
        state.requests.evict(now);
        state.tokens.evict(now);
        state.requests.check(self.config.requests, 1, now).is_none()
            && state.tokens.check(self.config.tokens, estimated_tokens, now).is_none()
    }
}
