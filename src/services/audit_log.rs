//! Audit Logger (C12): a PII-redacted, append-only record of every tool
//! execution, with configurable retention and suspicious-pattern annotation
//! performed at write time.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::instrument;

use crate::infrastructure::logging::secret_scrubbing::SecretScrubbingLayer;

const LOG_ID_LEN: usize = 24;
const LOG_ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

fn random_log_id() -> String {
    let mut rng = rand::thread_rng();
    (0..LOG_ID_LEN)
        .map(|_| LOG_ID_ALPHABET[rng.gen_range(0..LOG_ID_ALPHABET.len())] as char)
        .collect()
}

/// Opportunistically capture the current `tracing` span id. There is no
/// distributed trace id without an OpenTelemetry layer, which this crate
/// does not carry; `trace_id` is instead whatever the caller passes through
/// `ExecutionContext`, if anything.
fn current_span_id() -> Option<String> {
    tracing::Span::current().id().map(|id| id.into_u64().to_string())
}

/// How long audit records are kept before `cleanup` may remove them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetentionPolicy {
    Days(u32),
    Indefinite,
}

impl RetentionPolicy {
    fn cutoff(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Days(d) => Some(now - Duration::days(i64::from(d))),
            Self::Indefinite => None,
        }
    }
}

/// Outcome status of the audited call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Success,
    Failure,
}

impl AuditStatus {
    fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

/// A suspicious usage pattern flagged at write time. Detection never blocks
/// the call; it only annotates the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuspiciousPattern {
    CostSpike,
    RapidFailureBurst,
}

/// Metadata carried alongside every `AuditRecord`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditMetadata {
    pub cost: Option<f64>,
    pub duration_ms: Option<u64>,
    pub provider: Option<String>,
    pub pii_detected: bool,
    pub pii_redacted: bool,
    pub suspicious_patterns: Vec<SuspiciousPattern>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// One persisted audit record. No secret or PII value is ever present here;
/// `inputs_redacted`/`outputs_redacted` have already passed through
/// [`SecretScrubbingLayer::scrub_value`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub log_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub event_action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub resource_name: Option<String>,
    pub inputs_redacted: Value,
    pub outputs_redacted: Value,
    pub status: AuditStatus,
    pub error_message: Option<String>,
    pub request_id: Option<String>,
    pub session_id: Option<String>,
    pub trace_id: Option<String>,
    pub span_id: Option<String>,
    pub metadata: AuditMetadata,
}

/// Caller-supplied context for one tool execution. Every field is optional
/// because not every caller has all of it on hand.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    pub user_id: Option<String>,
    pub agent_id: Option<String>,
    pub provider: Option<String>,
    pub cost: Option<f64>,
    pub duration_ms: Option<u64>,
    pub error: Option<String>,
    pub request_id: Option<String>,
    pub session_id: Option<String>,
    pub trace_id: Option<String>,
    pub metadata: HashMap<String, Value>,
}

/// Filter for querying audit records.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub status: Option<AuditStatus>,
    pub resource_type: Option<String>,
    pub request_id: Option<String>,
    pub session_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub suspicious_only: bool,
    pub limit: Option<usize>,
}

impl AuditFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: AuditStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = Some(resource_type.into());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_time_range(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    pub fn suspicious_only(mut self) -> Self {
        self.suspicious_only = true;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn matches(&self, record: &AuditRecord) -> bool {
        if let Some(status) = self.status {
            if record.status != status {
                return false;
            }
        }
        if let Some(ref resource_type) = self.resource_type {
            if &record.resource_type != resource_type {
                return false;
            }
        }
        if let Some(ref request_id) = self.request_id {
            if record.request_id.as_ref() != Some(request_id) {
                return false;
            }
        }
        if let Some(ref session_id) = self.session_id {
            if record.session_id.as_ref() != Some(session_id) {
                return false;
            }
        }
        if let Some(from) = self.from {
            if record.timestamp < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if record.timestamp > to {
                return false;
            }
        }
        if self.suspicious_only && record.metadata.suspicious_patterns.is_empty() {
            return false;
        }
        true
    }
}

/// Summary counters over the in-memory record set.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AuditStats {
    pub total_entries: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub pii_detected_count: usize,
    pub suspicious_count: usize,
    pub oldest_entry: Option<DateTime<Utc>>,
    pub newest_entry: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct AuditLoggerConfig {
    pub max_entries: usize,
    pub retention: RetentionPolicy,
    pub cost_spike_threshold: f64,
    pub rapid_failure_count: usize,
}

impl Default for AuditLoggerConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            retention: RetentionPolicy::Days(90),
            cost_spike_threshold: 1.0,
            rapid_failure_count: 5,
        }
    }
}

/// In-memory, PII-redacting audit log.
pub struct AuditLogger {
    config: AuditLoggerConfig,
    scrubber: SecretScrubbingLayer,
    entries: Arc<RwLock<VecDeque<AuditRecord>>>,
    failure_streaks: Arc<RwLock<HashMap<String, usize>>>,
}

impl AuditLogger {
    pub fn new(config: AuditLoggerConfig) -> Self {
        Self {
            config,
            scrubber: SecretScrubbingLayer::new(),
            entries: Arc::new(RwLock::new(VecDeque::new())),
            failure_streaks: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(AuditLoggerConfig::default())
    }

    fn actor_key(ctx: &ExecutionContext) -> String {
        ctx.user_id
            .clone()
            .or_else(|| ctx.agent_id.clone())
            .unwrap_or_else(|| "unknown".to_string())
    }

    async fn detect_suspicious(&self, ctx: &ExecutionContext, success: bool) -> Vec<SuspiciousPattern> {
        let mut patterns = Vec::new();

        if ctx.cost.is_some_and(|c| c > self.config.cost_spike_threshold) {
            patterns.push(SuspiciousPattern::CostSpike);
        }

        let actor = Self::actor_key(ctx);
        let mut streaks = self.failure_streaks.write().await;
        let streak = streaks.entry(actor).or_insert(0);
        if success {
            *streak = 0;
        } else {
            *streak += 1;
            if *streak >= self.config.rapid_failure_count {
                patterns.push(SuspiciousPattern::RapidFailureBurst);
            }
        }

        patterns
    }

    /// Appends one redacted record for a tool execution. PII redaction runs
    /// unconditionally and recursively over both `inputs` and `outputs`
    /// before anything is persisted.
    #[instrument(name = "audit_log.log_tool_execution", skip(self, tool, operation, inputs, outputs, ctx), fields(success))]
    pub async fn log_tool_execution(
        &self,
        tool: impl Into<String>,
        operation: impl Into<String>,
        inputs: Value,
        outputs: Value,
        success: bool,
        ctx: ExecutionContext,
    ) -> AuditRecord {
        let pii_detected =
            self.scrubber.value_contains_sensitive_data(&inputs) || self.scrubber.value_contains_sensitive_data(&outputs);
        let inputs_redacted = self.scrubber.scrub_value(&inputs);
        let outputs_redacted = self.scrubber.scrub_value(&outputs);
        let suspicious_patterns = self.detect_suspicious(&ctx, success).await;

        let resource_type = tool.into();
        let record = AuditRecord {
            log_id: random_log_id(),
            timestamp: Utc::now(),
            event_type: "tool_execution".to_string(),
            event_action: operation.into(),
            resource_id: Some(resource_type.clone()),
            resource_name: Some(resource_type.clone()),
            resource_type,
            inputs_redacted,
            outputs_redacted,
            status: if success { AuditStatus::Success } else { AuditStatus::Failure },
            error_message: ctx.error,
            request_id: ctx.request_id,
            session_id: ctx.session_id,
            trace_id: ctx.trace_id,
            span_id: current_span_id(),
            metadata: AuditMetadata {
                cost: ctx.cost,
                duration_ms: ctx.duration_ms,
                provider: ctx.provider,
                pii_detected,
                pii_redacted: pii_detected,
                suspicious_patterns,
                extra: ctx.metadata,
            },
        };

        let mut entries = self.entries.write().await;
        while entries.len() >= self.config.max_entries {
            entries.pop_front();
        }
        entries.push_back(record.clone());
        record
    }

    pub async fn query(&self, filter: AuditFilter) -> Vec<AuditRecord> {
        let entries = self.entries.read().await;
        let mut results: Vec<AuditRecord> = entries.iter().filter(|e| filter.matches(e)).cloned().collect();
        results.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        if let Some(limit) = filter.limit {
            results.truncate(limit);
        }
        results
    }

    /// Removes every entry older than the configured retention cutoff.
    /// Returns the number of entries removed. A no-op under
    /// `RetentionPolicy::Indefinite`.
    pub async fn cleanup(&self) -> usize {
        let Some(cutoff) = self.config.retention.cutoff(Utc::now()) else {
            return 0;
        };
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|e| e.timestamp >= cutoff);
        before - entries.len()
    }

    pub async fn stats(&self) -> AuditStats {
        let entries = self.entries.read().await;
        let mut stats = AuditStats {
            total_entries: entries.len(),
            oldest_entry: entries.front().map(|e| e.timestamp),
            newest_entry: entries.back().map(|e| e.timestamp),
            ..Default::default()
        };
        for entry in entries.iter() {
            match entry.status {
                AuditStatus::Success => stats.success_count += 1,
                AuditStatus::Failure => stats.failure_count += 1,
            }
            if entry.metadata.pii_detected {
                stats.pii_detected_count += 1;
            }
            if !entry.metadata.suspicious_patterns.is_empty() {
                stats.suspicious_count += 1;
            }
        }
        stats
    }

    pub async fn export_json(&self, filter: AuditFilter) -> String {
        let records = self.query(filter).await;
        serde_json::to_string_pretty(&records).unwrap_or_default()
    }

    pub async fn export_csv(&self, filter: AuditFilter) -> String {
        let records = self.query(filter).await;
        let mut out = String::from(
            "log_id,timestamp,event_type,event_action,resource_type,status,error_message,cost,duration_ms,provider,pii_detected,suspicious_patterns\n",
        );
        for r in &records {
            let patterns = r
                .metadata
                .suspicious_patterns
                .iter()
                .map(|p| format!("{p:?}"))
                .collect::<Vec<_>>()
                .join(";");
            out.push_str(&format!(
                "{},{},{},{},{},{},{},{},{},{},{},{}\n",
                csv_escape(&r.log_id),
                r.timestamp.to_rfc3339(),
                csv_escape(&r.event_type),
                csv_escape(&r.event_action),
                csv_escape(&r.resource_type),
                r.status.as_str(),
                csv_escape(r.error_message.as_deref().unwrap_or("")),
                r.metadata.cost.map(|c| c.to_string()).unwrap_or_default(),
                r.metadata.duration_ms.map(|d| d.to_string()).unwrap_or_default(),
                csv_escape(r.metadata.provider.as_deref().unwrap_or("")),
                r.metadata.pii_detected,
                csv_escape(&patterns),
            ));
        }
        out
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

fn csv_escape(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
