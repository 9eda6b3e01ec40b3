//! Readiness resolution.
//!
//! A task is ready when it is pending and every dependency it names is a
//! completed task in the same snapshot. A dependency id that cannot be found
//! keeps the task waiting; it is never treated as satisfied.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::dag::DependencyGraph;
use crate::core::task::{Task, TaskId, TaskStatus};
use crate::error::{Error, Result};
use crate::{tplog_debug, tplog_warn};

/// How the resolver reacts to dependency cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStrictness {
    /// Log the cycle and carry on. Tasks on it never become ready.
    #[default]
    Lenient,
    /// Refuse to resolve a snapshot that contains a cycle.
    Strict,
}

/// A dependency that holds a task back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnmetDependency {
    pub id: TaskId,
    /// Current status, or `None` when the id is not in the snapshot.
    pub status: Option<TaskStatus>,
}

fn status_index(tasks: &[Task]) -> HashMap<&TaskId, TaskStatus> {
    let mut index = HashMap::with_capacity(tasks.len());
    for task in tasks {
        index.entry(&task.id).or_insert(task.status);
    }
    index
}

/// Pending tasks whose dependencies are all completed, in input order.
///
/// Pure function of the snapshot.
pub fn resolve_ready(tasks: &[Task]) -> Vec<Task> {
    let statuses = status_index(tasks);
    tasks
        .iter()
        .filter(|task| task.is_pending())
        .filter(|task| {
            task.dependencies
                .iter()
                .all(|dep| statuses.get(dep) == Some(&TaskStatus::Completed))
        })
        .cloned()
        .collect()
}

/// Dependencies of `task` that are not completed within `tasks`.
pub fn unmet_dependencies(task: &Task, tasks: &[Task]) -> Vec<UnmetDependency> {
    let statuses = status_index(tasks);
    task.dependencies
        .iter()
        .filter_map(|dep| match statuses.get(dep) {
            Some(TaskStatus::Completed) => None,
            status => Some(UnmetDependency {
                id: dep.clone(),
                status: status.copied(),
            }),
        })
        .collect()
}

/// Readiness resolution with configurable cycle handling.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadinessResolver {
    strictness: CycleStrictness,
}

impl ReadinessResolver {
    pub fn new(strictness: CycleStrictness) -> Self {
        Self { strictness }
    }

    pub fn strictness(&self) -> CycleStrictness {
        self.strictness
    }

    /// Resolve the ready subset of `tasks`.
    ///
    /// # Errors
    /// In `Strict` mode, returns `Error::DependencyCycle` when the snapshot
    /// contains a cycle.
    pub fn resolve(&self, tasks: &[Task]) -> Result<Vec<Task>> {
        let graph = DependencyGraph::from_tasks(tasks);

        for missing in graph.missing_dependencies() {
            tplog_debug!(
                "Task {} depends on unknown task {}, keeping it blocked",
                missing.task,
                missing.missing
            );
        }

        let cycles = graph.cycles();
        if !cycles.is_empty() {
            let tasks_on_cycles: Vec<String> =
                cycles.into_iter().flatten().map(|id| id.0).collect();
            match self.strictness {
                CycleStrictness::Strict => {
                    return Err(Error::DependencyCycle {
                        tasks: tasks_on_cycles,
                    });
                }
                CycleStrictness::Lenient => {
                    tplog_warn!(
                        "Dependency cycle among tasks [{}]; they will never become ready",
                        tasks_on_cycles.join(", ")
                    );
                }
            }
        }

        let ready = resolve_ready(tasks);
        tplog_debug!("Resolved {} ready of {} tasks", ready.len(), tasks.len());
        Ok(ready)
    }
}
