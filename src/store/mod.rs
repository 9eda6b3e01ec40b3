//! Task and project persistence.
//!
//! The scheduling core only needs a handful of accessors, captured by the
//! `TaskStore` trait. Two implementations ship with the crate: an in-memory
//! store for embedding and tests, and a JSON file store used by the CLI.

mod file;
mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::project::{Project, ProjectId};
use crate::core::task::{Task, TaskId, TaskStatus};
use crate::error::Result;

/// A project together with its task list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDocument {
    pub project: Project,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl ProjectDocument {
    pub fn new(project: Project, tasks: Vec<Task>) -> Self {
        Self { project, tasks }
    }
}

/// Accessors the orchestration core uses to read and write state.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Load a project record.
    async fn load_project(&self, id: &ProjectId) -> Result<Project>;

    /// Persist a project record, leaving its tasks untouched.
    async fn save_project(&self, project: &Project) -> Result<()>;

    /// All tasks of a project, in stored order.
    async fn list_tasks(&self, id: &ProjectId) -> Result<Vec<Task>>;

    /// Record a status reported back by a worker or reviewer.
    async fn set_task_status(
        &self,
        project: &ProjectId,
        task: &TaskId,
        status: TaskStatus,
    ) -> Result<()>;
}
