//! Batch selection.
//!
//! Each orchestration cycle hands the engine a small, type-balanced slice of
//! the ready set. The per-type caps are the only concurrency limit in the
//! system.

use serde::{Deserialize, Serialize};

use crate::core::task::{Subtask, Task, TaskId, TaskType};

/// Per-cycle caps by task type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchLimits {
    pub ai: usize,
    pub human: usize,
    pub hitl: usize,
}

impl BatchLimits {
    pub fn limit_for(&self, task_type: TaskType) -> usize {
        match task_type {
            TaskType::Ai => self.ai,
            TaskType::Human => self.human,
            TaskType::Hitl => self.hitl,
        }
    }
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            ai: 2,
            human: 1,
            hitl: 1,
        }
    }
}

/// A task selected for this cycle.
///
/// HITL tasks carry a copy of their checkpoint descriptors and the number of
/// checkpoints; the task itself is an untouched clone of the ready task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchItem {
    #[serde(flatten)]
    pub task: Task,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint_subtasks: Option<Vec<Subtask>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_checkpoints: Option<usize>,
}

impl BatchItem {
    fn from_task(task: &Task) -> Self {
        let (checkpoint_subtasks, total_checkpoints) = match task.task_type {
            TaskType::Hitl => (Some(task.subtasks().to_vec()), Some(task.checkpoint_count())),
            TaskType::Ai | TaskType::Human => (None, None),
        };
        Self {
            task: task.clone(),
            checkpoint_subtasks,
            total_checkpoints,
        }
    }

    pub fn id(&self) -> &TaskId {
        &self.task.id
    }
}

/// Select a batch using the default caps (2 ai, 1 human, 1 hitl).
pub fn select_batch(ready: &[Task]) -> Vec<BatchItem> {
    select_batch_with(ready, &BatchLimits::default())
}

/// Select a batch: the lowest-sequence tasks of each type up to the cap for
/// that type, ordered by `sequence`. Ties keep `ready` order.
pub fn select_batch_with(ready: &[Task], limits: &BatchLimits) -> Vec<BatchItem> {
    let mut ordered: Vec<&Task> = ready.iter().collect();
    ordered.sort_by_key(|task| task.sequence);

    let mut taken = [0usize; 3];
    ordered
        .into_iter()
        .filter(|task| {
            let slot = match task.task_type {
                TaskType::Ai => 0,
                TaskType::Human => 1,
                TaskType::Hitl => 2,
            };
            if taken[slot] < limits.limit_for(task.task_type) {
                taken[slot] += 1;
                true
            } else {
                false
            }
        })
        .map(BatchItem::from_task)
        .collect()
}
