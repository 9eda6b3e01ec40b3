//! Project record and its orchestration bookkeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Unique identifier for a project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub String);

impl ProjectId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ProjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ProjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ProjectId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ProjectId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Orchestration status of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrchestrationStatus {
    /// No trigger has succeeded yet.
    #[default]
    NotStarted,
    /// At least one trigger succeeded and tasks remain.
    Running,
    /// Set externally. Triggers are refused while paused.
    Paused,
    /// No pending or in-progress tasks remain.
    Completed,
    /// Retry budget exhausted. Needs manual intervention.
    Failed,
}

impl OrchestrationStatus {
    /// Whether no further cycles should run without outside action.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrchestrationStatus::Completed | OrchestrationStatus::Failed
        )
    }
}

impl std::fmt::Display for OrchestrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrchestrationStatus::NotStarted => write!(f, "not_started"),
            OrchestrationStatus::Running => write!(f, "running"),
            OrchestrationStatus::Paused => write!(f, "paused"),
            OrchestrationStatus::Completed => write!(f, "completed"),
            OrchestrationStatus::Failed => write!(f, "failed"),
        }
    }
}

/// The last trigger the engine accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastTrigger {
    pub at: DateTime<Utc>,
    /// Response body echoed back by the engine, `null` when empty.
    pub response: Value,
    pub attempt: u32,
}

/// The last trigger the engine answered with a non-success status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerFailure {
    pub status_code: u16,
    pub body: String,
    pub timestamp: DateTime<Utc>,
    pub attempt: u32,
}

/// The last trigger that failed before a status code was received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerError {
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub attempt: u32,
}

/// Outcome history of trigger attempts.
///
/// Each slot is overwritten only by an event of its own kind, so a later
/// success does not erase the diagnostics of an earlier failure.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OrchestrationMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_trigger: Option<LastTrigger>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_trigger_failure: Option<TriggerFailure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<TriggerError>,
}

impl OrchestrationMetadata {
    pub fn is_empty(&self) -> bool {
        self.last_trigger.is_none()
            && self.last_trigger_failure.is_none()
            && self.last_error.is_none()
    }

    /// Attempt number to use for the next trigger.
    ///
    /// Continues counting after a rejection that is newer than the last
    /// success; starts over at 1 otherwise.
    pub fn next_attempt(&self) -> u32 {
        match (&self.last_trigger_failure, &self.last_trigger) {
            (Some(failure), Some(success)) if failure.timestamp <= success.at => 1,
            (Some(failure), _) => failure.attempt.saturating_add(1),
            (None, _) => 1,
        }
    }
}

/// A project whose task graph is being orchestrated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    #[serde(default)]
    pub orchestration_status: OrchestrationStatus,
    #[serde(default)]
    pub orchestration_metadata: OrchestrationMetadata,
    /// Count of accepted triggers. Never decremented.
    #[serde(default)]
    pub total_orchestration_runs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orchestration_completed_at: Option<DateTime<Utc>>,
    /// Fields owned by other parts of the system, kept as-is on save.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Project {
    pub fn new(name: &str) -> Self {
        Self {
            id: ProjectId::new(),
            name: name.to_string(),
            orchestration_status: OrchestrationStatus::NotStarted,
            orchestration_metadata: OrchestrationMetadata::default(),
            total_orchestration_runs: 0,
            orchestration_completed_at: None,
            extra: Map::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<ProjectId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_status(mut self, status: OrchestrationStatus) -> Self {
        self.orchestration_status = status;
        self
    }

    pub fn is_paused(&self) -> bool {
        self.orchestration_status == OrchestrationStatus::Paused
    }
}
