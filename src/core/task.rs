//! Task data model for a project's task graph.
//!
//! Tasks are produced by the task-generation step and then mutated only by
//! external actors (UI, reviewers, completion callbacks). The scheduling core
//! reads them; it never writes a task's status.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Unique identifier for a task within a project.
///
/// Generated tasks carry UUIDs, but imported task lists may use any string,
/// so the identifier is kept opaque.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    /// Create a new unique task identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Worker class a task is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    /// Executed by an AI worker.
    Ai,
    /// Executed by a person.
    Human,
    /// AI work gated by manual checkpoint review.
    Hitl,
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskType::Ai => write!(f, "ai"),
            TaskType::Human => write!(f, "human"),
            TaskType::Hitl => write!(f, "hitl"),
        }
    }
}

/// Task status in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not started. Eligible for scheduling once dependencies complete.
    #[default]
    Pending,
    /// Picked up by a worker.
    InProgress,
    /// Cannot proceed without outside action.
    Blocked,
    /// Work done, awaiting review.
    Review,
    /// Finished.
    Completed,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::InProgress => write!(f, "in_progress"),
            TaskStatus::Blocked => write!(f, "blocked"),
            TaskStatus::Review => write!(f, "review"),
            TaskStatus::Completed => write!(f, "completed"),
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "in_progress" => Ok(TaskStatus::InProgress),
            "blocked" => Ok(TaskStatus::Blocked),
            "review" => Ok(TaskStatus::Review),
            "completed" => Ok(TaskStatus::Completed),
            other => Err(crate::Error::Validation(format!(
                "unknown task status: {}",
                other
            ))),
        }
    }
}

/// A checkpoint descriptor attached to HITL tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    pub name: String,
    #[serde(default)]
    pub is_checkpoint: bool,
}

impl Subtask {
    pub fn new(name: &str, is_checkpoint: bool) -> Self {
        Self {
            name: name.to_string(),
            is_checkpoint,
        }
    }
}

/// Free-form task metadata.
///
/// `subtasks` is the only key the core interprets; everything else is carried
/// through untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TaskMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtasks: Option<Vec<Subtask>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A single task in a project's task graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    /// Ordering hint assigned at generation time. Never renumbered here.
    pub sequence: i64,
    #[serde(default)]
    pub status: TaskStatus,
    /// Tasks that must reach `completed` before this one is ready.
    #[serde(default)]
    pub dependencies: Vec<TaskId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<f64>,
    #[serde(default)]
    pub metadata: TaskMetadata,
    /// Fields of the generator output this crate does not model.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Task {
    /// Create a pending task with a generated ID and no dependencies.
    pub fn new(name: &str, task_type: TaskType, sequence: i64) -> Self {
        Self {
            id: TaskId::new(),
            name: name.to_string(),
            task_type,
            sequence,
            status: TaskStatus::Pending,
            dependencies: Vec::new(),
            estimated_hours: None,
            metadata: TaskMetadata::default(),
            extra: Map::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<TaskId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_dependencies<I, T>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TaskId>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_subtasks(mut self, subtasks: Vec<Subtask>) -> Self {
        self.metadata.subtasks = Some(subtasks);
        self
    }

    pub fn is_pending(&self) -> bool {
        self.status == TaskStatus::Pending
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    /// Subtask descriptors, empty when none were generated.
    pub fn subtasks(&self) -> &[Subtask] {
        self.metadata.subtasks.as_deref().unwrap_or(&[])
    }

    /// Number of subtasks flagged as checkpoints.
    pub fn checkpoint_count(&self) -> usize {
        self.subtasks().iter().filter(|s| s.is_checkpoint).count()
    }
}
