//! `AgentRegistry`: the caller-supplied collaborator the Swarm Coordinator
//! routes `SubTask`s through. The core never implements a production agent
//! pool itself — only the trait boundary and a test double.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::models::{Capability, RoutingRequest, SubTaskResult};

/// Outcome of routing/executing one subtask through an external agent.
pub type AgentResult = SubTaskResult;

/// Interface to the caller-supplied pool of agents that actually execute
/// `SubTask`s. Implementations own agent discovery, acquisition, and the
/// outbound model call; the core only calls through this trait.
#[async_trait]
pub trait AgentRegistry: Send + Sync {
    /// Agents advertising `capability`, optionally filtered to idle ones.
    async fn find_agents_by_capability(&self, capability: Capability, only_available: bool) -> Vec<String>;

    /// Best agent id for `task`, if the registry can route without a swarm.
    async fn route_task(&self, task: &RoutingRequest) -> Option<String>;

    /// Reserve `agent_id` for `subtask_id`. `false` if already held.
    async fn acquire_agent(&self, agent_id: &str, subtask_id: Uuid) -> bool;

    /// Release a previously acquired agent, reporting the attempt's outcome.
    async fn release_agent(&self, agent_id: &str, subtask_id: Uuid, success: bool, exec_time_ms: u64);

    /// Run `task` on `preferred_agent` (or the registry's own routing when
    /// `None`), returning the agent's outcome.
    async fn execute_task(&self, task: &RoutingRequest, preferred_agent: Option<&str>) -> AgentResult;
}
