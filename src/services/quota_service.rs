//! Quota Service (C7): admin-override/rate/cost gating per `(scope,
//! identifier)`. `check` only probes the rate limiter's counters; it never
//! performs a blocking acquire ("probe, don't acquire").

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use tokio::sync::RwLock;
use tracing::instrument;

use crate::domain::models::{QuotaConfig, QuotaResult, QuotaScope, QuotaType};
use crate::infrastructure::provider::RateLimiter;

type QuotaKey = (QuotaScope, String);

#[derive(Debug, Clone, Default)]
struct CostCounters {
    today: f64,
    today_date: Option<DateTime<Utc>>,
    this_month: f64,
    this_month_date: Option<DateTime<Utc>>,
    by_provider_today: HashMap<String, (f64, DateTime<Utc>)>,
    by_tool_today: HashMap<String, (f64, DateTime<Utc>)>,
}

/// Gates requests for a `(scope, identifier)` against configured rate and
/// cost quotas.
pub struct QuotaService {
    configs: Arc<RwLock<HashMap<QuotaKey, QuotaConfig>>>,
    limiters: Arc<RwLock<HashMap<QuotaKey, Arc<RateLimiter>>>>,
    costs: Arc<RwLock<HashMap<QuotaKey, CostCounters>>>,
}

impl QuotaService {
    pub fn new() -> Self {
        Self {
            configs: Arc::new(RwLock::new(HashMap::new())),
            limiters: Arc::new(RwLock::new(HashMap::new())),
            costs: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn set_config(&self, config: QuotaConfig) {
        let key = (config.scope, config.identifier.clone());
        self.configs.write().await.insert(key, config);
    }

    fn key(scope: QuotaScope, identifier: &str) -> QuotaKey {
        (scope, identifier.to_string())
    }

    async fn limiter_for(&self, key: &QuotaKey, config: &QuotaConfig) -> Arc<RateLimiter> {
        let mut limiters = self.limiters.write().await;
        limiters
            .entry(key.clone())
            .or_insert_with(|| {
                Arc::new(RateLimiter::new(crate::infrastructure::provider::RateLimiterConfig {
                    requests: crate::infrastructure::provider::WindowLimits {
                        per_minute: config.rate_limits.per_minute,
                        per_hour: config.rate_limits.per_hour,
                        per_day: config.rate_limits.per_day,
                    },
                    tokens: crate::infrastructure::provider::WindowLimits::unlimited(),
                    max_concurrent_requests: usize::MAX,
                }))
            })
            .clone()
    }

    fn reset_boundary(reset_hour: u8) -> DateTime<Utc> {
        let now = Utc::now();
        Utc.with_ymd_and_hms(now.year(), now.month(), now.day(), u32::from(reset_hour), 0, 0).unwrap()
    }

    fn month_boundary(reset_day: u8, reset_hour: u8) -> DateTime<Utc> {
        let now = Utc::now();
        Utc.with_ymd_and_hms(now.year(), now.month(), u32::from(reset_day.max(1)), u32::from(reset_hour), 0, 0)
            .unwrap()
    }

    /// Order: admin override -> missing/disabled config -> rate probe ->
    /// daily cost -> monthly cost -> per-request cap.
    #[instrument(name = "quota_service.check", skip(self), fields(scope = ?scope, identifier = %identifier))]
    pub async fn check(
        &self,
        scope: QuotaScope,
        identifier: &str,
        estimated_cost: Option<f64>,
        admin_override: bool,
    ) -> QuotaResult {
        if admin_override {
            return QuotaResult::allow();
        }

        let key = Self::key(scope, identifier);
        let configs = self.configs.read().await;
        let Some(config) = configs.get(&key).cloned() else {
            return QuotaResult::allow();
        };
        drop(configs);

        if !config.enabled {
            return QuotaResult::allow();
        }

        let limiter = self.limiter_for(&key, &config).await;
        if !limiter.would_admit(0).await {
            return QuotaResult::deny(QuotaType::Rate, "rate limit exceeded");
        }

        let estimated = estimated_cost.unwrap_or(0.0);
        let costs = self.costs.read().await;
        let counters = costs.get(&key).cloned().unwrap_or_default();
        drop(costs);

        if let Some(daily_limit) = config.cost_quota.daily_limit {
            let today_spend = if counters.today_date.is_some_and(|d| d >= Self::reset_boundary(config.cost_quota.reset_hour)) {
                counters.today
            } else {
                0.0
            };
            if today_spend + estimated > daily_limit {
                return QuotaResult {
                    allowed: false,
                    reason: Some("daily cost quota exceeded".to_string()),
                    remaining_requests: None,
                    remaining_cost: Some((daily_limit - today_spend).max(0.0)),
                    reset_at: Some(Self::reset_boundary(config.cost_quota.reset_hour) + Duration::days(1)),
                    quota_type: Some(QuotaType::DailyCost),
                };
            }
        }

        if let Some(monthly_limit) = config.cost_quota.monthly_limit {
            let month_start = Self::month_boundary(config.cost_quota.reset_day, config.cost_quota.reset_hour);
            let month_spend = if counters.this_month_date.is_some_and(|d| d >= month_start) { counters.this_month } else { 0.0 };
            if month_spend + estimated > monthly_limit {
                return QuotaResult {
                    allowed: false,
                    reason: Some("monthly cost quota exceeded".to_string()),
                    remaining_requests: None,
                    remaining_cost: Some((monthly_limit - month_spend).max(0.0)),
                    reset_at: None,
                    quota_type: Some(QuotaType::MonthlyCost),
                };
            }
        }

        if let Some(per_request_limit) = config.cost_quota.per_request_limit {
            if estimated > per_request_limit {
                return QuotaResult::deny(QuotaType::PerRequestCost, "per-request cost cap exceeded");
            }
        }

        QuotaResult::allow()
    }

    /// Records spend against the day/month/per-provider-day/per-tool-day
    /// counters. PII scrubbing of `tool`/`provider` labels is not this
    /// component's concern; that belongs to the audit logger.
    #[instrument(name = "quota_service.record_usage", skip(self), fields(scope = ?scope, identifier = %identifier, cost))]
    pub async fn record_usage(&self, scope: QuotaScope, identifier: &str, cost: f64, provider: Option<&str>, tool: Option<&str>) {
        let key = Self::key(scope, identifier);
        let now = Utc::now();
        let mut costs = self.costs.write().await;
        let counters = costs.entry(key).or_default();

        if counters.today_date.is_some_and(|d| d.date_naive() == now.date_naive()) {
            counters.today += cost;
        } else {
            counters.today = cost;
        }
        counters.today_date = Some(now);

        if counters.this_month_date.is_some_and(|d| d.year() == now.year() && d.month() == now.month()) {
            counters.this_month += cost;
        } else {
            counters.this_month = cost;
        }
        counters.this_month_date = Some(now);

        if let Some(provider) = provider {
            let entry = counters.by_provider_today.entry(provider.to_string()).or_insert((0.0, now));
            if entry.1.date_naive() == now.date_naive() {
                entry.0 += cost;
            } else {
                *entry = (cost, now);
            }
        }

        if let Some(tool) = tool {
            let entry = counters.by_tool_today.entry(tool.to_string()).or_insert((0.0, now));
            if entry.1.date_naive() == now.date_naive() {
                entry.0 += cost;
            } else {
                *entry = (cost, now);
            }
        }
    }
}

impl Default for QuotaService {
    fn default() -> Self {
        Self::new()
    }
}
