//! Orchestration layer for taskpilot.
//!
//! Readiness resolution, batch selection, the trigger handshake with the
//! external workflow engine, completion evaluation, and the cycle runner
//! that ties them together per project.

mod batch;
mod completion;
mod cycle;
mod readiness;
mod trigger;

pub use batch::{select_batch, select_batch_with, BatchItem, BatchLimits};
pub use completion::{is_complete, TaskCounts};
pub use cycle::{CycleReport, Orchestrator, ProjectCycle, ProjectLocks};
pub use readiness::{
    resolve_ready, unmet_dependencies, CycleStrictness, ReadinessResolver, UnmetDependency,
};
pub use trigger::{
    Alert, AlertSink, EngineResponse, HttpWorkflowEngine, LogAlertSink, OrchestrationTrigger,
    TriggerConfig, TriggerOutcome, TriggerRequest, WorkflowEngine,
};
