use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

use super::{ProjectDocument, TaskStore};
use crate::core::project::{Project, ProjectId};
use crate::core::task::{Task, TaskId, TaskStatus};
use crate::error::{Error, Result};
use crate::tplog_debug;

/// Task store keeping one JSON document per project in a directory.
///
/// Each file is `<dir>/<project_id>.json` and holds a `ProjectDocument`.
/// Writes go through a temporary file and a rename so a reader never sees
/// a half-written document.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &ProjectId) -> Result<PathBuf> {
        let raw = id.as_str();
        let has_separator = raw.contains(|c: char| c == '/' || c == '\\');
        if raw.is_empty() || has_separator || raw == "." || raw == ".." {
            return Err(Error::Validation(format!("invalid project id: {:?}", raw)));
        }
        Ok(self.dir.join(format!("{}.json", raw)))
    }

    /// Read a full project document.
    pub async fn read_document(&self, id: &ProjectId) -> Result<ProjectDocument> {
        let path = self.path_for(id)?;
        let text = match fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::ProjectNotFound(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&text)?)
    }

    /// Write a full project document, creating the directory if needed.
    pub async fn write_document(&self, doc: &ProjectDocument) -> Result<()> {
        let path = self.path_for(&doc.project.id)?;
        fs::create_dir_all(&self.dir).await?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(doc)?).await?;
        fs::rename(&tmp, &path).await?;
        tplog_debug!("Wrote project document {}", path.display());
        Ok(())
    }

    /// Ids of all stored projects, sorted.
    pub async fn list_projects(&self) -> Result<Vec<ProjectId>> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(ProjectId::from(stem));
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[async_trait]
impl TaskStore for JsonFileStore {
    async fn load_project(&self, id: &ProjectId) -> Result<Project> {
        Ok(self.read_document(id).await?.project)
    }

    async fn save_project(&self, project: &Project) -> Result<()> {
        let mut doc = self.read_document(&project.id).await?;
        doc.project = project.clone();
        self.write_document(&doc).await
    }

    async fn list_tasks(&self, id: &ProjectId) -> Result<Vec<Task>> {
        Ok(self.read_document(id).await?.tasks)
    }

    async fn set_task_status(
        &self,
        project: &ProjectId,
        task: &TaskId,
        status: TaskStatus,
    ) -> Result<()> {
        let mut doc = self.read_document(project).await?;
        let entry = doc
            .tasks
            .iter_mut()
            .find(|t| &t.id == task)
            .ok_or_else(|| Error::TaskNotFound(task.to_string()))?;
        entry.status = status;
        self.write_document(&doc).await
    }
}
