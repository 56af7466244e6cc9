//! Dependency graph utilities shared by the Swarm Coordinator: cycle
//! detection, topological sort, and wave-based scheduling over `SubTask`s.
//!
//! The graph is represented as an arena of nodes indexed by id, with
//! dependency ids as values rather than shared mutable references, per the
//! "no shared mutable graph references" design note.

use std::collections::{HashMap, HashSet, VecDeque};
use uuid::Uuid;

use super::subtask::{SubTask, SubTaskStatus};

/// A node in the subtask dependency graph.
#[derive(Debug, Clone)]
pub struct DagNode {
    pub subtask_id: Uuid,
    pub status: SubTaskStatus,
    pub dependencies: Vec<Uuid>,
    pub dependents: Vec<Uuid>,
}

impl DagNode {
    pub fn from_subtask(subtask: &SubTask) -> Self {
        Self {
            subtask_id: subtask.id,
            status: subtask.status,
            dependencies: subtask.dependencies.clone(),
            dependents: vec![],
        }
    }

    pub fn is_ready(&self, completed: &HashSet<Uuid>) -> bool {
        self.dependencies.iter().all(|dep| completed.contains(dep))
    }
}

/// A dependency graph over a set of `SubTask`s.
#[derive(Debug, Clone)]
pub struct SubtaskDag {
    /// All nodes in the graph.
    pub nodes: HashMap<Uuid, DagNode>,
    /// Root nodes (no dependencies within this graph).
    pub roots: Vec<Uuid>,
    /// Leaf nodes (no dependents within this graph).
    pub leaves: Vec<Uuid>,
}

impl SubtaskDag {
    /// Build a graph from a set of subtasks.
    pub fn from_subtasks(subtasks: &[SubTask]) -> Self {
        let mut nodes: HashMap<Uuid, DagNode> = HashMap::new();
        let mut has_dependents: HashSet<Uuid> = HashSet::new();

        for subtask in subtasks {
            nodes.insert(subtask.id, DagNode::from_subtask(subtask));
        }

        for subtask in subtasks {
            for dep_id in &subtask.dependencies {
                if let Some(dep_node) = nodes.get_mut(dep_id) {
                    dep_node.dependents.push(subtask.id);
                    has_dependents.insert(*dep_id);
                }
            }
        }

        let roots: Vec<Uuid> = nodes
            .iter()
            .filter(|(_, node)| {
                node.dependencies.is_empty()
                    || node.dependencies.iter().all(|d| !nodes.contains_key(d))
            })
            .map(|(id, _)| *id)
            .collect();

        let leaves: Vec<Uuid> = nodes
            .iter()
            .filter(|(id, _)| !has_dependents.contains(id))
            .map(|(id, _)| *id)
            .collect();

        Self { nodes, roots, leaves }
    }

    /// Check if the graph contains a cycle.
    pub fn has_cycle(&self) -> bool {
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();

        for &node_id in self.nodes.keys() {
            if self.detect_cycle_dfs(node_id, &mut visited, &mut rec_stack) {
                return true;
            }
        }

        false
    }

    fn detect_cycle_dfs(&self, node_id: Uuid, visited: &mut HashSet<Uuid>, rec_stack: &mut HashSet<Uuid>) -> bool {
        if rec_stack.contains(&node_id) {
            return true;
        }
        if visited.contains(&node_id) {
            return false;
        }

        visited.insert(node_id);
        rec_stack.insert(node_id);

        if let Some(node) = self.nodes.get(&node_id) {
            for &dep in &node.dependents {
                if self.detect_cycle_dfs(dep, visited, rec_stack) {
                    return true;
                }
            }
        }

        rec_stack.remove(&node_id);
        false
    }

    /// Perform a topological sort and return subtask ids in execution order.
    pub fn topological_sort(&self) -> Result<Vec<Uuid>, DagError> {
        if self.has_cycle() {
            return Err(DagError::CycleDetected);
        }

        let mut result = Vec::new();
        let mut in_degree: HashMap<Uuid, usize> = HashMap::new();
        let mut queue = VecDeque::new();

        for (id, node) in &self.nodes {
            let deps_in_dag = node.dependencies.iter().filter(|d| self.nodes.contains_key(d)).count();
            in_degree.insert(*id, deps_in_dag);
        }

        for (&id, &degree) in &in_degree {
            if degree == 0 {
                queue.push_back(id);
            }
        }

        while let Some(node_id) = queue.pop_front() {
            result.push(node_id);

            if let Some(node) = self.nodes.get(&node_id) {
                for &dependent in &node.dependents {
                    if let Some(degree) = in_degree.get_mut(&dependent) {
                        *degree -= 1;
                        if *degree == 0 {
                            queue.push_back(dependent);
                        }
                    }
                }
            }
        }

        if result.len() != self.nodes.len() {
            return Err(DagError::CycleDetected);
        }

        Ok(result)
    }

    /// Group subtask ids into waves of runnable work. A wave's members all
    /// have every dependency satisfied by previously-completed waves, so a
    /// wave can be dispatched under a single concurrency gate.
    ///
    /// `completed` seeds the scheduler with subtasks already finished before
    /// this pass began (e.g. on resume); pass an empty set for a fresh run.
    pub fn execution_waves(&self, completed: &HashSet<Uuid>) -> Result<Vec<Vec<Uuid>>, DagError> {
        if self.has_cycle() {
            return Err(DagError::CycleDetected);
        }

        let mut waves = Vec::new();
        let mut remaining: HashSet<Uuid> = self
            .nodes
            .keys()
            .copied()
            .filter(|id| !completed.contains(id))
            .collect();
        let mut completed = completed.clone();

        while !remaining.is_empty() {
            let wave: Vec<Uuid> = remaining
                .iter()
                .filter(|id| self.nodes.get(id).map(|node| node.is_ready(&completed)).unwrap_or(false))
                .copied()
                .collect();

            if wave.is_empty() {
                return Err(DagError::CycleDetected);
            }

            for id in &wave {
                remaining.remove(id);
                completed.insert(*id);
            }

            waves.push(wave);
        }

        Ok(waves)
    }

    /// Get all subtasks that a given subtask depends on (transitively).
    pub fn get_all_dependencies(&self, subtask_id: Uuid) -> HashSet<Uuid> {
        let mut result = HashSet::new();
        let mut queue = VecDeque::new();

        if let Some(node) = self.nodes.get(&subtask_id) {
            queue.extend(&node.dependencies);
        }

        while let Some(id) = queue.pop_front() {
            if result.insert(id) {
                if let Some(node) = self.nodes.get(&id) {
                    queue.extend(&node.dependencies);
                }
            }
        }

        result
    }

    pub fn stats(&self) -> DagStats {
        let waves = self.execution_waves(&HashSet::new()).unwrap_or_default();

        DagStats {
            total_nodes: self.nodes.len(),
            root_count: self.roots.len(),
            leaf_count: self.leaves.len(),
            wave_count: waves.len(),
            max_parallelism: waves.iter().map(Vec::len).max().unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DagStats {
    pub total_nodes: usize,
    pub root_count: usize,
    pub leaf_count: usize,
    pub wave_count: usize,
    pub max_parallelism: usize,
}

/// Graph validation errors. A cyclic-or-blocked graph is a hard failure the
/// coordinator surfaces as `SwarmError::CyclicDag`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DagError {
    #[error("cycle detected in subtask dependencies")]
    CycleDetected,
}
