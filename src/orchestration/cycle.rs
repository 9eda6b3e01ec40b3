//! Orchestration cycle runner.
//!
//! One cycle loads a project, decides what is ready, picks a batch, triggers
//! the engine and evaluates completion. Cycles for the same project are
//! serialized through `ProjectLocks`, so metadata and run counters are never
//! written by two triggers at once.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::core::project::{OrchestrationStatus, ProjectId};
use crate::core::task::{TaskId, TaskStatus};
use crate::error::{Error, Result};
use crate::orchestration::batch::{select_batch_with, BatchItem, BatchLimits};
use crate::orchestration::completion::{is_complete, TaskCounts};
use crate::orchestration::readiness::ReadinessResolver;
use crate::orchestration::trigger::{OrchestrationTrigger, TriggerOutcome};
use crate::store::TaskStore;
use crate::{tplog, tplog_debug, tplog_error};

/// One async mutex per project id.
#[derive(Debug, Clone, Default)]
pub struct ProjectLocks {
    locks: Arc<Mutex<HashMap<ProjectId, Arc<Mutex<()>>>>>,
}

impl ProjectLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `id`. Released when the guard drops.
    pub async fn acquire(&self, id: &ProjectId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(id.clone()).or_default())
        };
        lock.lock_owned().await
    }

    /// Whether a cycle currently holds the lock for `id`.
    pub async fn is_held(&self, id: &ProjectId) -> bool {
        let locks = self.locks.lock().await;
        locks
            .get(id)
            .map(|lock| lock.try_lock().is_err())
            .unwrap_or(false)
    }
}

/// What a cycle saw and did.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub project_id: ProjectId,
    pub counts: TaskCounts,
    pub ready: usize,
    pub batch: Vec<BatchItem>,
    /// `None` when no trigger was attempted.
    pub outcome: Option<TriggerOutcome>,
    pub completed: bool,
    pub status: OrchestrationStatus,
}

impl CycleReport {
    pub fn batch_ids(&self) -> Vec<&TaskId> {
        self.batch.iter().map(BatchItem::id).collect()
    }
}

/// Result of one project's cycle within `Orchestrator::run_all`.
#[derive(Debug)]
pub struct ProjectCycle {
    pub project_id: ProjectId,
    pub result: Result<CycleReport>,
}

/// Runs orchestration cycles against a task store.
pub struct Orchestrator {
    store: Arc<dyn TaskStore>,
    trigger: Option<OrchestrationTrigger>,
    resolver: ReadinessResolver,
    limits: BatchLimits,
    locks: ProjectLocks,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn TaskStore>, trigger: OrchestrationTrigger) -> Self {
        Self {
            trigger: Some(trigger),
            ..Self::for_store(store)
        }
    }

    /// An orchestrator without a workflow engine. It can record task
    /// statuses and evaluate completion; cycles that reach the trigger step
    /// fail with `Error::Config`.
    pub fn for_store(store: Arc<dyn TaskStore>) -> Self {
        Self {
            store,
            trigger: None,
            resolver: ReadinessResolver::default(),
            limits: BatchLimits::default(),
            locks: ProjectLocks::new(),
        }
    }

    pub fn with_resolver(mut self, resolver: ReadinessResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_limits(mut self, limits: BatchLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Share locks with other orchestrators in the same process.
    pub fn with_locks(mut self, locks: ProjectLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn locks(&self) -> &ProjectLocks {
        &self.locks
    }

    /// Run one orchestration cycle for `id`.
    ///
    /// # Errors
    /// Store failures and, with a strict resolver, dependency cycles. Engine
    /// failures are not errors here; they are recorded on the project and
    /// reported through `CycleReport::outcome`.
    pub async fn run_cycle(&self, id: &ProjectId) -> Result<CycleReport> {
        let _guard = self.locks.acquire(id).await;

        let mut project = self.store.load_project(id).await?;
        let tasks = self.store.list_tasks(id).await?;
        let counts = TaskCounts::from_tasks(&tasks);

        let mut report = CycleReport {
            project_id: id.clone(),
            counts,
            ready: 0,
            batch: Vec::new(),
            outcome: None,
            completed: false,
            status: project.orchestration_status,
        };

        if project.orchestration_status.is_terminal() {
            tplog_debug!(
                "Project {} is {}, skipping cycle",
                id,
                project.orchestration_status
            );
            return Ok(report);
        }

        if is_complete(&mut project, &tasks) {
            self.store.save_project(&project).await?;
            report.completed = true;
            report.status = project.orchestration_status;
            return Ok(report);
        }

        let ready = self.resolver.resolve(&tasks)?;
        report.ready = ready.len();
        report.batch = select_batch_with(&ready, &self.limits);

        if report.batch.is_empty() {
            tplog_debug!(
                "Project {}: nothing ready ({} pending, {} in progress)",
                id,
                counts.pending,
                counts.in_progress
            );
            return Ok(report);
        }

        let trigger = self
            .trigger
            .as_ref()
            .ok_or_else(|| Error::Config("no workflow engine configured".to_string()))?;
        let attempt = project.orchestration_metadata.next_attempt();
        let batch_ids: Vec<TaskId> = report.batch_ids().into_iter().cloned().collect();
        tplog!(
            "Project {}: triggering batch of {} (attempt {})",
            id,
            batch_ids.len(),
            attempt
        );
        let outcome = trigger.trigger_batch(&mut project, attempt, &batch_ids).await;

        if outcome != TriggerOutcome::Skipped {
            self.store.save_project(&project).await?;
        }
        report.outcome = Some(outcome);
        report.status = project.orchestration_status;
        Ok(report)
    }

    /// Run one cycle per project in `ids`, in order.
    ///
    /// A failing project is logged and reported in its `ProjectCycle`; the
    /// remaining projects still run.
    pub async fn run_all(&self, ids: &[ProjectId]) -> Vec<ProjectCycle> {
        let mut cycles = Vec::with_capacity(ids.len());
        for id in ids {
            let result = self.run_cycle(id).await;
            if let Err(e) = &result {
                tplog_error!("Cycle for project {} failed: {}", id, e);
            }
            cycles.push(ProjectCycle {
                project_id: id.clone(),
                result,
            });
        }
        cycles
    }

    /// Evaluate completion for `id` and persist the project if it changed.
    ///
    /// Returns true if the project is complete.
    pub async fn evaluate_completion(&self, id: &ProjectId) -> Result<bool> {
        let _guard = self.locks.acquire(id).await;
        self.complete_locked(id).await
    }

    /// Record a task status reported back by the engine or a reviewer, then
    /// re-evaluate completion.
    ///
    /// Returns true if the project is now complete.
    pub async fn report_task_status(
        &self,
        project_id: &ProjectId,
        task_id: &TaskId,
        status: TaskStatus,
    ) -> Result<bool> {
        let _guard = self.locks.acquire(project_id).await;

        self.store
            .set_task_status(project_id, task_id, status)
            .await?;
        tplog!("Task {} in {} is now {:?}", task_id, project_id, status);
        self.complete_locked(project_id).await
    }

    async fn complete_locked(&self, id: &ProjectId) -> Result<bool> {
        let mut project = self.store.load_project(id).await?;
        let tasks = self.store.list_tasks(id).await?;
        let before = project.clone();
        let complete = is_complete(&mut project, &tasks);
        if project != before {
            self.store.save_project(&project).await?;
        }
        Ok(complete)
    }
}
