//! Dependency graph over a project's task list.
//!
//! Tasks declare their prerequisites as id lists. `DependencyGraph` turns a
//! snapshot of those lists into a petgraph `DiGraph` so structural problems
//! (cycles, dangling references) can be found and reported. Readiness itself
//! does not need the graph; see `orchestration::readiness`.

use crate::core::task::{Task, TaskId};
use crate::error::{Error, Result};
use petgraph::algo::{is_cyclic_directed, tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::HashMap;

/// A dependency that names a task absent from the snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingDependency {
    /// The task declaring the dependency.
    pub task: TaskId,
    /// The id that could not be found.
    pub missing: TaskId,
}

/// Directed graph of task dependencies.
///
/// Nodes are task ids. An edge `a -> b` means `b` depends on `a`, so `a`
/// must complete first.
pub struct DependencyGraph {
    graph: DiGraph<TaskId, ()>,
    index: HashMap<TaskId, NodeIndex>,
    missing: Vec<MissingDependency>,
}

impl DependencyGraph {
    /// Build the graph from a task snapshot.
    ///
    /// Duplicate task ids collapse into one node. Dependencies on ids not
    /// present in `tasks` are recorded as missing instead of creating nodes.
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let mut graph = DiGraph::new();
        let mut index = HashMap::new();

        for task in tasks {
            index
                .entry(task.id.clone())
                .or_insert_with(|| graph.add_node(task.id.clone()));
        }

        let mut missing = Vec::new();
        for task in tasks {
            let to = index[&task.id];
            for dep in &task.dependencies {
                match index.get(dep) {
                    Some(&from) => {
                        graph.update_edge(from, to, ());
                    }
                    None => missing.push(MissingDependency {
                        task: task.id.clone(),
                        missing: dep.clone(),
                    }),
                }
            }
        }

        Self {
            graph,
            index,
            missing,
        }
    }

    pub fn task_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn dependency_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains_task(&self, id: &TaskId) -> bool {
        self.index.contains_key(id)
    }

    /// Check if `to` directly depends on `from`.
    pub fn has_dependency(&self, from: &TaskId, to: &TaskId) -> bool {
        match (self.index.get(from), self.index.get(to)) {
            (Some(&a), Some(&b)) => self.graph.find_edge(a, b).is_some(),
            _ => false,
        }
    }

    /// Tasks that `id` depends on and that exist in the snapshot.
    pub fn dependencies_of(&self, id: &TaskId) -> Vec<&TaskId> {
        self.neighbors(id, Direction::Incoming)
    }

    /// Tasks that depend on `id`.
    pub fn dependents_of(&self, id: &TaskId) -> Vec<&TaskId> {
        self.neighbors(id, Direction::Outgoing)
    }

    fn neighbors(&self, id: &TaskId, direction: Direction) -> Vec<&TaskId> {
        match self.index.get(id) {
            Some(&node) => self
                .graph
                .neighbors_directed(node, direction)
                .filter_map(|n| self.graph.node_weight(n))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Dependencies pointing outside the snapshot.
    pub fn missing_dependencies(&self) -> &[MissingDependency] {
        &self.missing
    }

    pub fn is_cyclic(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    /// Groups of tasks that depend on each other, directly or transitively.
    ///
    /// Each group is sorted by id, and groups are sorted by their first id,
    /// so the output is stable for a given snapshot.
    pub fn cycles(&self) -> Vec<Vec<TaskId>> {
        let mut cycles: Vec<Vec<TaskId>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| match component.as_slice() {
                [single] => self.graph.find_edge(*single, *single).is_some(),
                _ => true,
            })
            .map(|component| {
                let mut ids: Vec<TaskId> = component
                    .into_iter()
                    .filter_map(|n| self.graph.node_weight(n).cloned())
                    .collect();
                ids.sort();
                ids
            })
            .collect();
        cycles.sort();
        cycles
    }

    /// Task ids ordered so every task comes after its dependencies.
    ///
    /// # Errors
    /// Returns `Error::DependencyCycle` if the graph has a cycle.
    pub fn topological_order(&self) -> Result<Vec<TaskId>> {
        let sorted = toposort(&self.graph, None).map_err(|_| Error::DependencyCycle {
            tasks: self.cycles().into_iter().flatten().map(|id| id.0).collect(),
        })?;

        Ok(sorted
            .into_iter()
            .filter_map(|n| self.graph.node_weight(n).cloned())
            .collect())
    }
}

impl std::fmt::Debug for DependencyGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyGraph")
            .field("tasks", &self.task_count())
            .field("dependencies", &self.dependency_count())
            .field("missing", &self.missing.len())
            .finish()
    }
}
