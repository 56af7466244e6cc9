//! Quota configuration and check-result types owned by the Quota Service (C7).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a quota is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaScope {
    User,
    Team,
    Project,
    Tool,
    Provider,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RateLimits {
    #[serde(default)]
    pub per_minute: Option<u32>,
    #[serde(default)]
    pub per_hour: Option<u32>,
    #[serde(default)]
    pub per_day: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CostQuota {
    #[serde(default)]
    pub daily_limit: Option<f64>,
    #[serde(default)]
    pub monthly_limit: Option<f64>,
    #[serde(default)]
    pub per_request_limit: Option<f64>,
    #[serde(default = "default_reset_day")]
    pub reset_day: u8,
    #[serde(default)]
    pub reset_hour: u8,
}

const fn default_reset_day() -> u8 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    pub scope: QuotaScope,
    pub identifier: String,
    #[serde(default)]
    pub rate_limits: RateLimits,
    #[serde(default)]
    pub cost_quota: CostQuota,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

const fn default_enabled() -> bool {
    true
}

/// What kind of check rejected (or would reject) a request, for
/// `QuotaResult::quota_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaType {
    Rate,
    DailyCost,
    MonthlyCost,
    PerRequestCost,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaResult {
    pub allowed: bool,
    pub reason: Option<String>,
    #[serde(default)]
    pub remaining_requests: Option<u32>,
    #[serde(default)]
    pub remaining_cost: Option<f64>,
    #[serde(default)]
    pub reset_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub quota_type: Option<QuotaType>,
}

impl QuotaResult {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
            remaining_requests: None,
            remaining_cost: None,
            reset_at: None,
            quota_type: None,
        }
    }

    pub fn deny(quota_type: QuotaType, reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            remaining_requests: None,
            remaining_cost: None,
            reset_at: None,
            quota_type: Some(quota_type),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_has_no_quota_type() {
        let r = QuotaResult::allow();
        assert!(r.allowed);
        assert!(r.quota_type.is_none());
    }

    #[test]
    fn deny_carries_quota_type_and_reason() {
        let r = QuotaResult::deny(QuotaType::DailyCost, "daily cost cap reached");
        assert!(!r.allowed);
        assert_eq!(r.quota_type, Some(QuotaType::DailyCost));
        assert_eq!(r.reason.as_deref(), Some("daily cost cap reached"));
    }

    #[test]
    fn cost_quota_reset_day_defaults_to_first() {
        let q = CostQuota::default();
        assert_eq!(q.reset_day, 1);
    }
}
