//! `MockAgentRegistry`: a configurable `AgentRegistry` double for tests and
//! the demo composition root.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::models::{Capability, RoutingRequest, SubTaskResult};
use crate::domain::ports::{AgentRegistry, AgentResult};

/// A canned outcome for a mock agent to return.
#[derive(Debug, Clone)]
pub struct MockOutcome {
    pub success: bool,
    pub output: Option<String>,
    pub error: Option<String>,
    pub cost: f64,
    pub latency_ms: u64,
}

impl MockOutcome {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: Some(output.into()),
            error: None,
            cost: 0.01,
            latency_ms: 50,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.into()),
            cost: 0.0,
            latency_ms: 10,
        }
    }
}

impl From<MockOutcome> for SubTaskResult {
    fn from(outcome: MockOutcome) -> Self {
        Self {
            success: outcome.success,
            output: outcome.output,
            error: outcome.error,
            cost: outcome.cost,
            latency_ms: outcome.latency_ms,
        }
    }
}

/// Test double for `AgentRegistry`. Always routes to `"mock-agent"` unless
/// `agents` is populated; returns `default_outcome` for any task not named
/// in `overrides`.
pub struct MockAgentRegistry {
    agents: Vec<String>,
    held: Arc<RwLock<HashMap<String, Uuid>>>,
    default_outcome: MockOutcome,
    overrides: Arc<RwLock<HashMap<String, MockOutcome>>>,
}

impl MockAgentRegistry {
    pub fn new() -> Self {
        Self {
            agents: vec!["mock-agent".to_string()],
            held: Arc::new(RwLock::new(HashMap::new())),
            default_outcome: MockOutcome::success("mock task completed"),
            overrides: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn with_default_outcome(outcome: MockOutcome) -> Self {
        Self {
            default_outcome: outcome,
            ..Self::new()
        }
    }

    /// Override the outcome returned for tasks whose description matches
    /// `task_description` exactly.
    pub async fn set_outcome_for(&self, task_description: impl Into<String>, outcome: MockOutcome) {
        self.overrides.write().await.insert(task_description.into(), outcome);
    }
}

impl Default for MockAgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentRegistry for MockAgentRegistry {
    async fn find_agents_by_capability(&self, _capability: Capability, _only_available: bool) -> Vec<String> {
        self.agents.clone()
    }

    async fn route_task(&self, _task: &RoutingRequest) -> Option<String> {
        self.agents.first().cloned()
    }

    async fn acquire_agent(&self, agent_id: &str, subtask_id: Uuid) -> bool {
        let mut held = self.held.write().await;
        if held.contains_key(agent_id) {
            return false;
        }
        held.insert(agent_id.to_string(), subtask_id);
        true
    }

    async fn release_agent(&self, agent_id: &str, _subtask_id: Uuid, _success: bool, _exec_time_ms: u64) {
        self.held.write().await.remove(agent_id);
    }

    async fn execute_task(&self, task: &RoutingRequest, _preferred_agent: Option<&str>) -> AgentResult {
        let overrides = self.overrides.read().await;
        overrides
            .get(&task.task_description)
            .cloned()
            .unwrap_or_else(|| self.default_outcome.clone())
            .into()
    }
}
