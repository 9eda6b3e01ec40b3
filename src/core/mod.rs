//! Core domain models for taskpilot.
//!
//! Tasks, projects and the dependency graph between tasks. Everything here
//! is plain data plus pure queries; scheduling decisions live in
//! `orchestration`.

pub mod dag;
pub mod project;
pub mod task;

pub use dag::{DependencyGraph, MissingDependency};
pub use project::{
    LastTrigger, OrchestrationMetadata, OrchestrationStatus, Project, ProjectId, TriggerError,
    TriggerFailure,
};
pub use task::{Subtask, Task, TaskId, TaskMetadata, TaskStatus, TaskType};
