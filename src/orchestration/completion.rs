//! Completion evaluation.
//!
//! A project's orchestration is complete once no task is pending or in
//! progress. Blocked and in-review tasks do not hold completion back: nothing
//! further can happen for them automatically.

use chrono::Utc;
use serde::Serialize;

use crate::core::project::{OrchestrationStatus, Project};
use crate::core::task::{Task, TaskStatus};
use crate::tplog;

/// Number of tasks in each status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TaskCounts {
    pub pending: usize,
    pub in_progress: usize,
    pub blocked: usize,
    pub review: usize,
    pub completed: usize,
}

impl TaskCounts {
    pub fn from_tasks(tasks: &[Task]) -> Self {
        tasks.iter().fold(Self::default(), |mut counts, task| {
            match task.status {
                TaskStatus::Pending => counts.pending += 1,
                TaskStatus::InProgress => counts.in_progress += 1,
                TaskStatus::Blocked => counts.blocked += 1,
                TaskStatus::Review => counts.review += 1,
                TaskStatus::Completed => counts.completed += 1,
            }
            counts
        })
    }

    pub fn total(&self) -> usize {
        self.pending + self.in_progress + self.blocked + self.review + self.completed
    }

    /// True when nothing is pending or in progress.
    pub fn is_settled(&self) -> bool {
        self.pending == 0 && self.in_progress == 0
    }
}

/// Check whether `project` is finished and, if so, mark it completed.
///
/// Leaves the project untouched when it is not complete, and keeps the
/// original completion time when it was already marked completed.
pub fn is_complete(project: &mut Project, tasks: &[Task]) -> bool {
    let counts = TaskCounts::from_tasks(tasks);
    if !counts.is_settled() {
        return false;
    }
    if project.orchestration_status == OrchestrationStatus::Completed
        && project.orchestration_completed_at.is_some()
    {
        return true;
    }

    project.orchestration_status = OrchestrationStatus::Completed;
    project.orchestration_completed_at = Some(Utc::now());
    tplog!(
        "Project {} orchestration complete ({} completed, {} blocked, {} in review)",
        project.id,
        counts.completed,
        counts.blocked,
        counts.review
    );
    true
}
