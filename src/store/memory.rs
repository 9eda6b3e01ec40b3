use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{ProjectDocument, TaskStore};
use crate::core::project::{Project, ProjectId};
use crate::core::task::{Task, TaskId, TaskStatus};
use crate::error::{Error, Result};

/// In-memory task store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    projects: RwLock<HashMap<ProjectId, ProjectDocument>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with a project and its tasks.
    pub fn with_project(mut self, project: Project, tasks: Vec<Task>) -> Self {
        self.projects
            .get_mut()
            .insert(project.id.clone(), ProjectDocument::new(project, tasks));
        self
    }

    /// Insert or replace a project and its tasks.
    pub async fn insert(&self, project: Project, tasks: Vec<Task>) {
        self.projects
            .write()
            .await
            .insert(project.id.clone(), ProjectDocument::new(project, tasks));
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn load_project(&self, id: &ProjectId) -> Result<Project> {
        self.projects
            .read()
            .await
            .get(id)
            .map(|doc| doc.project.clone())
            .ok_or_else(|| Error::ProjectNotFound(id.to_string()))
    }

    async fn save_project(&self, project: &Project) -> Result<()> {
        let mut projects = self.projects.write().await;
        let doc = projects
            .get_mut(&project.id)
            .ok_or_else(|| Error::ProjectNotFound(project.id.to_string()))?;
        doc.project = project.clone();
        Ok(())
    }

    async fn list_tasks(&self, id: &ProjectId) -> Result<Vec<Task>> {
        self.projects
            .read()
            .await
            .get(id)
            .map(|doc| doc.tasks.clone())
            .ok_or_else(|| Error::ProjectNotFound(id.to_string()))
    }

    async fn set_task_status(
        &self,
        project: &ProjectId,
        task: &TaskId,
        status: TaskStatus,
    ) -> Result<()> {
        let mut projects = self.projects.write().await;
        let doc = projects
            .get_mut(project)
            .ok_or_else(|| Error::ProjectNotFound(project.to_string()))?;
        let task = doc
            .tasks
            .iter_mut()
            .find(|t| &t.id == task)
            .ok_or_else(|| Error::TaskNotFound(task.to_string()))?;
        task.status = status;
        Ok(())
    }
}
