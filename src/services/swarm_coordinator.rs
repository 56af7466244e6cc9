//! Swarm Coordinator (C11): decomposes a request into `SubTask`s, picks a
//! scheduling strategy from their dependency shape, executes under a bounded
//! concurrency gate with per-SubTask retries, then aggregates the result.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::instrument;
use uuid::Uuid;

use crate::domain::models::{RoutingRequest, SubTask, SubTaskResult, SubTaskStatus, SwarmExecution, SwarmStrategy, TaskType};
use crate::domain::ports::AgentRegistry;
use crate::infrastructure::provider::RetryPolicy;

#[derive(Debug, Clone, Copy)]
pub struct SwarmConfig {
    pub max_parallel_agents: usize,
    pub default_max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            max_parallel_agents: 10,
            default_max_attempts: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 10_000,
        }
    }
}

/// One step of a raw (e.g. LLM-produced) decomposition, with dependencies
/// expressed as indices into the proposed list rather than ids, since ids
/// don't exist until the coordinator materializes `SubTask`s.
#[derive(Debug, Clone)]
pub struct ProposedSubTask {
    pub description: String,
    pub task_type: TaskType,
    pub depends_on: Vec<usize>,
}

/// Orchestrates one decomposed request end to end.
pub struct SwarmCoordinator {
    registry: Arc<dyn AgentRegistry>,
    config: SwarmConfig,
}

impl SwarmCoordinator {
    pub fn new(registry: Arc<dyn AgentRegistry>, config: SwarmConfig) -> Self {
        Self { registry, config }
    }

    pub fn with_defaults(registry: Arc<dyn AgentRegistry>) -> Self {
        Self::new(registry, SwarmConfig::default())
    }

    /// A proposed decomposition is well-formed when it is non-empty and
    /// every dependency index refers to a strictly earlier step (rules out
    /// self-loops and forward references without a separate cycle check).
    fn is_valid_decomposition(proposed: &[ProposedSubTask]) -> bool {
        if proposed.is_empty() {
            return false;
        }
        proposed.iter().enumerate().all(|(i, step)| step.depends_on.iter().all(|&dep| dep < i))
    }

    fn fixed_plan(parent_task_id: Uuid, parent: &RoutingRequest, max_attempts: u32) -> Vec<SubTask> {
        let mut subtasks: Vec<SubTask> = ["prepare", "execute", "validate"]
            .into_iter()
            .map(|step| {
                let mut task = parent.clone();
                task.task_description = format!("{step}: {}", parent.task_description);
                let mut subtask = SubTask::new(parent_task_id, task, vec![]);
                subtask.max_attempts = max_attempts;
                subtask
            })
            .collect();
        subtasks[1].dependencies = vec![subtasks[0].id];
        subtasks[2].dependencies = vec![subtasks[1].id];
        subtasks
    }

    /// Materializes `proposed` into `SubTask`s, falling back to a fixed
    /// prepare -> execute -> validate plan when the decomposition is
    /// malformed.
    pub fn decompose(&self, parent_task_id: Uuid, parent: &RoutingRequest, proposed: Vec<ProposedSubTask>) -> Vec<SubTask> {
        if !Self::is_valid_decomposition(&proposed) {
            return Self::fixed_plan(parent_task_id, parent, self.config.default_max_attempts);
        }

        let mut subtasks: Vec<SubTask> = proposed
            .iter()
            .map(|step| {
                let mut task = parent.clone();
                task.task_type = step.task_type.clone();
                task.task_description = step.description.clone();
                let mut subtask = SubTask::new(parent_task_id, task, vec![]);
                subtask.max_attempts = self.config.default_max_attempts;
                subtask
            })
            .collect();

        for (i, step) in proposed.iter().enumerate() {
            subtasks[i].dependencies = step.depends_on.iter().filter_map(|&dep| subtasks.get(dep).map(|s| s.id)).collect();
        }
        subtasks
    }

    fn retry_policy(&self, max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, self.config.initial_backoff_ms, self.config.max_backoff_ms)
    }

    /// Runs one SubTask's attempts through the agent registry, retrying
    /// transient (i.e. unsuccessful) outcomes up to `max_attempts` times.
    /// Acquires a semaphore permit for the SubTask's whole lifetime, not
    /// per attempt, so concurrency is bounded per SubTask rather than per
    /// call to the registry.
    async fn run_subtask(
        registry: Arc<dyn AgentRegistry>,
        semaphore: Arc<Semaphore>,
        retry: RetryPolicy,
        subtask_id: Uuid,
        task: RoutingRequest,
    ) -> (SubTaskResult, u32) {
        let _permit = semaphore.acquire_owned().await.expect("semaphore is never closed");
        let mut attempts = 0u32;

        let outcome = retry
            .execute(
                |result: &SubTaskResult| !result.success,
                || {
                    attempts += 1;
                    let registry = registry.clone();
                    let task = task.clone();
                    async move {
                        let agent_id = registry.route_task(&task).await;
                        if let Some(agent) = agent_id.as_deref() {
                            registry.acquire_agent(agent, subtask_id).await;
                        }
                        let result = registry.execute_task(&task, agent_id.as_deref()).await;
                        if let Some(agent) = agent_id.as_deref() {
                            registry.release_agent(agent, subtask_id, result.success, result.latency_ms).await;
                        }
                        if result.success {
                            Ok(result)
                        } else {
                            Err(result)
                        }
                    }
                },
            )
            .await;

        (outcome.unwrap_or_else(|e| e), attempts)
    }

    fn apply_result(execution: &mut SwarmExecution, subtask_id: Uuid, result: SubTaskResult, attempts: u32) -> bool {
        let subtask = execution.subtasks.iter_mut().find(|s| s.id == subtask_id).expect("subtask must exist");
        subtask.attempts = attempts;
        let success = result.success;
        execution.total_cost += result.cost;
        execution.total_latency_ms += result.latency_ms;
        subtask.result = Some(result);
        subtask.transition(if success { SubTaskStatus::Completed } else { SubTaskStatus::Failed });
        if success {
            execution.completed_count += 1;
        } else {
            execution.failed_count += 1;
        }
        success
    }

    async fn run_wave(&self, execution: &mut SwarmExecution, ids: &[Uuid]) {
        let semaphore = Arc::new(Semaphore::new(self.config.max_parallel_agents));
        let mut handles = Vec::with_capacity(ids.len());

        for &id in ids {
            let subtask = execution.subtasks.iter_mut().find(|s| s.id == id).expect("subtask must exist");
            subtask.transition(SubTaskStatus::Assigned);
            subtask.transition(SubTaskStatus::Running);
            let task = subtask.task.clone();
            let max_attempts = subtask.max_attempts;
            let registry = self.registry.clone();
            let sem = semaphore.clone();
            let retry = self.retry_policy(max_attempts);
            handles.push((id, tokio::spawn(Self::run_subtask(registry, sem, retry, id, task))));
        }

        for (id, handle) in handles {
            let (result, attempts) = handle.await.expect("subtask task panicked");
            Self::apply_result(execution, id, result, attempts);
        }
    }

    async fn execute_parallel(&self, execution: &mut SwarmExecution) {
        let ids: Vec<Uuid> = execution.subtasks.iter().map(|s| s.id).collect();
        self.run_wave(execution, &ids).await;
    }

    async fn execute_sequential(&self, execution: &mut SwarmExecution) {
        let ids: Vec<Uuid> = execution.subtasks.iter().map(|s| s.id).collect();
        for id in ids {
            self.run_wave(execution, &[id]).await;
        }
    }

    /// Repeatedly selects the set of SubTasks whose dependencies have all
    /// *completed successfully*, runs that wave, and repeats. A pass that
    /// finds nothing runnable while SubTasks remain pending means the graph
    /// is cyclic or blocked on a failed dependency: the remaining SubTasks
    /// are marked failed without running.
    async fn execute_dag(&self, execution: &mut SwarmExecution) {
        let mut completed_ids: HashSet<Uuid> = HashSet::new();

        loop {
            let ready: Vec<Uuid> = execution
                .subtasks
                .iter()
                .filter(|s| s.status == SubTaskStatus::Pending && s.dependencies.iter().all(|d| completed_ids.contains(d)))
                .map(|s| s.id)
                .collect();

            if ready.is_empty() {
                break;
            }

            self.run_wave(execution, &ready).await;

            for id in ready {
                let subtask = execution.subtasks.iter().find(|s| s.id == id).expect("subtask must exist");
                if subtask.status == SubTaskStatus::Completed {
                    completed_ids.insert(id);
                }
            }
        }

        let blocked: Vec<Uuid> = execution.subtasks.iter().filter(|s| s.status == SubTaskStatus::Pending).map(|s| s.id).collect();
        for id in blocked {
            let subtask = execution.subtasks.iter_mut().find(|s| s.id == id).expect("subtask must exist");
            subtask.transition(SubTaskStatus::Assigned);
            subtask.transition(SubTaskStatus::Failed);
            execution.failed_count += 1;
        }
    }

    /// Decomposes, schedules, executes, and aggregates a full swarm run.
    /// `success` is `true` overall iff no SubTask failed.
    #[instrument(name = "swarm_coordinator.execute", skip(self, parent, proposed), fields(parent_task_id = %parent_task_id))]
    pub async fn execute(&self, parent_task_id: Uuid, parent: RoutingRequest, proposed: Vec<ProposedSubTask>) -> SwarmExecution {
        let subtasks = self.decompose(parent_task_id, &parent, proposed);
        let mut execution = SwarmExecution::new(parent, subtasks);

        match execution.strategy {
            SwarmStrategy::Parallel => self.execute_parallel(&mut execution).await,
            SwarmStrategy::Sequential => self.execute_sequential(&mut execution).await,
            SwarmStrategy::Dag => self.execute_dag(&mut execution).await,
        }

        execution.finished_at = Some(chrono::Utc::now());
        execution
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::testing::{MockAgentRegistry, MockOutcome};
    use std::collections::HashMap;

    pub(super) fn request() -> RoutingRequest {
        RoutingRequest {
            task_type: TaskType::CodeGeneration,
            task_description: "build a feature".into(),
            estimated_input_tokens: None,
            estimated_output_tokens: 500,
            context_size: None,
            cost_budget: None,
            quality_requirement: 0.7,
            latency_requirement_ms: None,
            requires_streaming: false,
            requires_tools: false,
            requires_vision: false,
            requires_json_mode: false,
            vendor_preference: None,
            vendor_diversity: false,
            enable_parallel: false,
            metadata: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn empty_decomposition_falls_back_to_fixed_plan() {
        let coordinator = SwarmCoordinator::with_defaults(Arc::new(MockAgentRegistry::new()));
        let parent_id = Uuid::new_v4();
        let subtasks = coordinator.decompose(parent_id, &request(), vec![]);
        assert_eq!(subtasks.len(), 3);
        assert!(subtasks[1].dependencies.contains(&subtasks[0].id));
        assert!(subtasks[2].dependencies.contains(&subtasks[1].id));
    }

    #[tokio::test]
    async fn forward_reference_is_treated_as_malformed() {
        let coordinator = SwarmCoordinator::with_defaults(Arc::new(MockAgentRegistry::new()));
        let parent_id = Uuid::new_v4();
        let proposed = vec![
            ProposedSubTask { description: "a".into(), task_type: TaskType::CodeGeneration, depends_on: vec![1] },
            ProposedSubTask { description: "b".into(), task_type: TaskType::CodeGeneration, depends_on: vec![] },
        ];
        let subtasks = coordinator.decompose(parent_id, &request(), proposed);
        assert_eq!(subtasks.len(), 3, "falls back to the fixed plan");
    }

    #[tokio::test]
    async fn well_formed_decomposition_wires_dependencies_by_index() {
        let coordinator = SwarmCoordinator::with_defaults(Arc::new(MockAgentRegistry::new()));
        let parent_id = Uuid::new_v4();
        let proposed = vec![
            ProposedSubTask { description: "a".into(), task_type: TaskType::CodeGeneration, depends_on: vec![] },
            ProposedSubTask { description: "b".into(), task_type: TaskType::CodeGeneration, depends_on: vec![0] },
        ];
        let subtasks = coordinator.decompose(parent_id, &request(), proposed);
        assert_eq!(subtasks.len(), 2);
        assert_eq!(subtasks[1].dependencies, vec![subtasks[0].id]);
    }

    #[tokio::test]
    async fn all_independent_subtasks_choose_parallel_strategy() {
        let registry = Arc::new(MockAgentRegistry::new());
        let coordinator = SwarmCoordinator::with_defaults(registry);
        let parent_id = Uuid::new_v4();
        let proposed = vec![
            ProposedSubTask { description: "a".into(), task_type: TaskType::CodeGeneration, depends_on: vec![] },
            ProposedSubTask { description: "b".into(), task_type: TaskType::CodeGeneration, depends_on: vec![] },
        ];
        let execution = coordinator.execute(parent_id, request(), proposed).await;
        assert_eq!(execution.strategy, SwarmStrategy::Parallel);
        assert!(execution.is_successful());
        assert_eq!(execution.completed_count, 2);
    }

    #[tokio::test]
    async fn failure_in_sequential_plan_does_not_abort_remaining_steps() {
        let registry = Arc::new(MockAgentRegistry::new());
        registry.set_outcome_for("prepare: fix the bug", MockOutcome::failure("boom")).await;
        let coordinator = SwarmCoordinator::new(registry, SwarmConfig { default_max_attempts: 1, ..SwarmConfig::default() });
        let mut req = request();
        req.task_description = "fix the bug".into();
        let execution = coordinator.execute(Uuid::new_v4(), req, vec![]).await;

        assert_eq!(execution.strategy, SwarmStrategy::Sequential);
        assert_eq!(execution.subtasks.len(), 3);
        assert!(!execution.is_successful());
        assert_eq!(execution.failed_count, 1);
        assert_eq!(execution.completed_count, 2, "later steps still ran despite the first failing");
    }

    #[tokio::test]
    async fn dag_dependent_never_runs_before_its_dependency_completes() {
        let registry = Arc::new(MockAgentRegistry::new());
        let coordinator = SwarmCoordinator::with_defaults(registry);
        let parent_id = Uuid::new_v4();
        let proposed = vec![
            ProposedSubTask { description: "root-a".into(), task_type: TaskType::CodeGeneration, depends_on: vec![] },
            ProposedSubTask { description: "root-b".into(), task_type: TaskType::CodeGeneration, depends_on: vec![] },
            ProposedSubTask { description: "join".into(), task_type: TaskType::CodeGeneration, depends_on: vec![0, 1] },
        ];
        let execution = coordinator.execute(parent_id, request(), proposed).await;

        assert_eq!(execution.strategy, SwarmStrategy::Dag);
        assert!(execution.is_successful());
        let join = execution.subtasks.iter().find(|s| s.task.task_description == "join").unwrap();
        let root_a = execution.subtasks.iter().find(|s| s.task.task_description == "root-a").unwrap();
        let root_b = execution.subtasks.iter().find(|s| s.task.task_description == "root-b").unwrap();
        assert!(join.started_at.unwrap() >= root_a.finished_at.unwrap());
        assert!(join.started_at.unwrap() >= root_b.finished_at.unwrap());
    }

    #[tokio::test]
    async fn dag_blocked_by_a_failed_dependency_marks_dependent_failed_without_running() {
        let registry = Arc::new(MockAgentRegistry::new());
        registry.set_outcome_for("root", MockOutcome::failure("boom")).await;
        let coordinator = SwarmCoordinator::new(registry, SwarmConfig { default_max_attempts: 1, ..SwarmConfig::default() });
        let parent_id = Uuid::new_v4();
        let proposed = vec![
            ProposedSubTask { description: "root".into(), task_type: TaskType::CodeGeneration, depends_on: vec![] },
            ProposedSubTask { description: "dependent".into(), task_type: TaskType::CodeGeneration, depends_on: vec![0] },
        ];
        let execution = coordinator.execute(parent_id, request(), proposed).await;

        assert!(!execution.is_successful());
        let dependent = execution.subtasks.iter().find(|s| s.task.task_description == "dependent").unwrap();
        assert_eq!(dependent.status, SubTaskStatus::Failed);
        assert!(dependent.attempts == 0, "blocked SubTasks never get an execution attempt");
    }

    #[tokio::test]
    async fn retries_exhaust_before_subtask_is_marked_failed() {
        let registry = Arc::new(MockAgentRegistry::new());
        registry.set_outcome_for("flaky", MockOutcome::failure("transient")).await;
        let coordinator = SwarmCoordinator::new(registry, SwarmConfig { default_max_attempts: 3, ..SwarmConfig::default() });
        let parent_id = Uuid::new_v4();
        let proposed = vec![ProposedSubTask { description: "flaky".into(), task_type: TaskType::CodeGeneration, depends_on: vec![] }];
        let execution = coordinator.execute(parent_id, request(), proposed).await;

        let subtask = &execution.subtasks[0];
        assert_eq!(subtask.status, SubTaskStatus::Failed);
        assert_eq!(subtask.attempts, 3);
    }
}

#[cfg(test)]
mod property_tests {
    use super::tests::request;
    use super::*;
    use crate::adapters::testing::MockAgentRegistry;
    use proptest::prelude::*;
    use tokio::runtime::Runtime;

    /// Builds a layered DAG: every step in layer `i` (i > 0) depends on
    /// every step in layer `i - 1`, so completion-before-start must hold
    /// across every layer boundary for the run to be valid.
    fn layered_proposal(layer_sizes: &[usize]) -> Vec<ProposedSubTask> {
        let mut proposed = Vec::new();
        let mut layer_start = 0usize;
        for (layer_idx, &size) in layer_sizes.iter().enumerate() {
            let depends_on: Vec<usize> = if layer_idx == 0 { vec![] } else { (layer_start - layer_sizes[layer_idx - 1]..layer_start).collect() };
            for j in 0..size {
                proposed.push(ProposedSubTask {
                    description: format!("layer{layer_idx}-step{j}"),
                    task_type: TaskType::CodeGeneration,
                    depends_on: depends_on.clone(),
                });
            }
            layer_start += size;
        }
        proposed
    }

    proptest! {
        /// DAG safety: a SubTask never enters `running` before every one of
        /// its dependencies has reached `completed`.
        #[test]
        fn prop_dependents_never_start_before_dependencies_complete(
            layer_sizes in prop::collection::vec(1usize..=3, 2..=4),
        ) {
            let rt = Runtime::new().unwrap();
            rt.block_on(async {
                let registry = Arc::new(MockAgentRegistry::new());
                let coordinator = SwarmCoordinator::with_defaults(registry);
                let proposed = layered_proposal(&layer_sizes);
                let execution = coordinator.execute(Uuid::new_v4(), request(), proposed).await;

                prop_assert!(execution.is_successful());
                for subtask in &execution.subtasks {
                    for dep_id in &subtask.dependencies {
                        let dep = execution.subtasks.iter().find(|s| s.id == *dep_id).unwrap();
                        prop_assert!(subtask.started_at.unwrap() >= dep.finished_at.unwrap());
                    }
                }
                Ok(())
            })?;
        }
    }
}
