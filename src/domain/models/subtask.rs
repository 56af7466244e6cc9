//! Swarm Coordinator data model: `SubTask`, `SwarmExecution`, and the
//! strategies the coordinator chooses between.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::request::RoutingRequest;

/// A `SubTask`'s position in its lifecycle. Transitions are monotonic: once
/// `Completed` or `Failed`, a subtask never revives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubTaskStatus {
    Pending,
    Assigned,
    Running,
    Completed,
    Failed,
}

impl SubTaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn valid_transitions(self) -> &'static [Self] {
        match self {
            Self::Pending => &[Self::Assigned, Self::Failed],
            Self::Assigned => &[Self::Running, Self::Failed],
            Self::Running => &[Self::Completed, Self::Failed],
            Self::Completed | Self::Failed => &[],
        }
    }

    pub fn can_transition_to(self, next: Self) -> bool {
        self.valid_transitions().contains(&next)
    }
}

/// The outcome of one `SubTask` execution attempt, as reported by the
/// caller-supplied agent registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubTaskResult {
    pub success: bool,
    pub output: Option<String>,
    pub error: Option<String>,
    #[serde(default)]
    pub cost: f64,
    #[serde(default)]
    pub latency_ms: u64,
}

/// A single unit of work inside a `SwarmExecution`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubTask {
    pub id: Uuid,
    pub parent_task_id: Uuid,
    pub task: RoutingRequest,
    pub assigned_agent: Option<String>,
    pub status: SubTaskStatus,
    pub result: Option<SubTaskResult>,
    pub dependencies: Vec<Uuid>,
    pub attempts: u32,
    pub max_attempts: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SubTask {
    pub fn new(parent_task_id: Uuid, task: RoutingRequest, dependencies: Vec<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            parent_task_id,
            task,
            assigned_agent: None,
            status: SubTaskStatus::Pending,
            result: None,
            dependencies,
            attempts: 0,
            max_attempts: 3,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Attempts are exhausted once `attempts >= max_attempts` after a failure.
    pub fn retries_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    /// Move to `next`, returning `false` (no-op) on an invalid transition.
    pub fn transition(&mut self, next: SubTaskStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        match next {
            SubTaskStatus::Running if self.started_at.is_none() => {
                self.started_at = Some(Utc::now());
            }
            SubTaskStatus::Completed | SubTaskStatus::Failed => {
                self.finished_at = Some(Utc::now());
            }
            _ => {}
        }
        self.status = next;
        true
    }

    pub fn is_ready(&self, completed: &std::collections::HashSet<Uuid>) -> bool {
        self.dependencies.iter().all(|d| completed.contains(d))
    }
}

/// How a `SwarmExecution` schedules its subtasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwarmStrategy {
    Parallel,
    Sequential,
    Dag,
}

impl SwarmStrategy {
    /// `parallel` iff no subtask has dependencies; `sequential` iff every
    /// subtask has at most one dependency and the graph is a single chain;
    /// `dag` otherwise.
    pub fn choose(subtasks: &[SubTask]) -> Self {
        if subtasks.iter().all(|s| s.dependencies.is_empty()) {
            return Self::Parallel;
        }
        let is_chain = subtasks.iter().all(|s| s.dependencies.len() <= 1);
        if is_chain {
            Self::Sequential
        } else {
            Self::Dag
        }
    }
}

/// A full decomposed-task execution: the parent request plus its subtasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmExecution {
    pub swarm_id: Uuid,
    pub parent_task: RoutingRequest,
    pub subtasks: Vec<SubTask>,
    pub strategy: SwarmStrategy,
    pub completed_count: u32,
    pub failed_count: u32,
    pub total_cost: f64,
    pub total_latency_ms: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SwarmExecution {
    pub fn new(parent_task: RoutingRequest, subtasks: Vec<SubTask>) -> Self {
        let strategy = SwarmStrategy::choose(&subtasks);
        Self {
            swarm_id: Uuid::new_v4(),
            parent_task,
            subtasks,
            strategy,
            completed_count: 0,
            failed_count: 0,
            total_cost: 0.0,
            total_latency_ms: 0,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// `success_rate = completed / total`.
    pub fn success_rate(&self) -> f64 {
        if self.subtasks.is_empty() {
            return 0.0;
        }
        f64::from(self.completed_count) / self.subtasks.len() as f64
    }

    /// Overall success iff no subtask failed.
    pub fn is_successful(&self) -> bool {
        self.failed_count == 0 && self.completed_count as usize == self.subtasks.len()
    }
}
