//! End-to-end orchestration cycles against the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use taskpilot::core::{
    OrchestrationStatus, Project, ProjectId, Task, TaskId, TaskStatus, TaskType,
};
use taskpilot::orchestration::{
    CycleStrictness, Orchestrator, ReadinessResolver, TriggerOutcome,
};
use taskpilot::store::{MemoryStore, TaskStore};
use taskpilot::Error;

use crate::fixtures::{
    hybrid_store, hybrid_tasks, project, trigger_for, FakeEngine, RecordingSink, PROJECT_ID,
};

fn ids(report: &taskpilot::CycleReport) -> Vec<&str> {
    report.batch_ids().into_iter().map(TaskId::as_str).collect()
}

/// Test: Full project lifecycle
/// Given a hybrid project with dependencies
/// When cycles run and workers report back
/// Then batches follow readiness and the project completes
#[tokio::test]
async fn test_project_runs_to_completion() {
    let store = hybrid_store();
    let engine = FakeEngine::accepting();
    let sink = RecordingSink::new();
    let trigger = trigger_for(engine.clone(), sink.clone());
    let orchestrator = Orchestrator::new(store.clone(), trigger);
    let pid = ProjectId::from(PROJECT_ID);

    // First cycle: only tasks without dependencies are ready.
    let report = orchestrator.run_cycle(&pid).await.unwrap();
    assert_eq!(ids(&report), vec!["design", "copy"]);
    assert!(matches!(report.outcome, Some(TriggerOutcome::Succeeded { attempt: 1, .. })));
    assert_eq!(report.status, OrchestrationStatus::Running);
    assert_eq!(
        engine.requests()[0].task_ids,
        vec![TaskId::from("design"), TaskId::from("copy")]
    );

    // Workers pick up and finish design; copy is underway.
    for (task, status) in [
        ("design", TaskStatus::Completed),
        ("copy", TaskStatus::InProgress),
    ] {
        let done = orchestrator
            .report_task_status(&pid, &TaskId::from(task), status)
            .await
            .unwrap();
        assert!(!done);
    }

    // Second cycle: design's dependents open up, HITL carries checkpoints.
    let report = orchestrator.run_cycle(&pid).await.unwrap();
    assert_eq!(ids(&report), vec!["build", "signoff"]);
    let signoff = &report.batch[1];
    assert_eq!(signoff.total_checkpoints, Some(2));
    assert_eq!(signoff.checkpoint_subtasks.as_ref().map(Vec::len), Some(3));
    assert_eq!(report.batch[0].total_checkpoints, None);

    for task in ["build", "copy"] {
        orchestrator
            .report_task_status(&pid, &TaskId::from(task), TaskStatus::Completed)
            .await
            .unwrap();
    }
    // A task waiting on a reviewer does not hold completion back.
    let done = orchestrator
        .report_task_status(&pid, &TaskId::from("signoff"), TaskStatus::Review)
        .await
        .unwrap();
    assert!(done);

    let stored = store.load_project(&pid).await.unwrap();
    assert_eq!(stored.orchestration_status, OrchestrationStatus::Completed);
    assert!(stored.orchestration_completed_at.is_some());
    assert_eq!(stored.total_orchestration_runs, 2);

    // Completed projects are left alone.
    let report = orchestrator.run_cycle(&pid).await.unwrap();
    assert!(report.outcome.is_none());
    assert_eq!(engine.call_count(), 2);
    assert!(sink.alerts().is_empty());
}

/// Test: Nothing ready
/// Given every pending task waiting on work in progress
/// When a cycle runs
/// Then the engine is not called and the project is unchanged
#[tokio::test]
async fn test_cycle_without_ready_tasks_does_not_trigger() {
    let store = hybrid_store();
    let pid = ProjectId::from(PROJECT_ID);
    for task in ["design", "copy"] {
        store
            .set_task_status(&pid, &TaskId::from(task), TaskStatus::InProgress)
            .await
            .unwrap();
    }
    let before = store.load_project(&pid).await.unwrap();

    let engine = FakeEngine::accepting();
    let trigger = trigger_for(engine.clone(), RecordingSink::new());
    let orchestrator = Orchestrator::new(store.clone(), trigger);
    let report = orchestrator.run_cycle(&pid).await.unwrap();

    assert!(report.batch.is_empty());
    assert!(report.outcome.is_none());
    assert_eq!(report.counts.in_progress, 2);
    assert_eq!(engine.call_count(), 0);
    assert_eq!(store.load_project(&pid).await.unwrap(), before);
}

/// Test: Empty project
/// Given a project with no tasks
/// When a cycle runs
/// Then it is marked complete without calling the engine
#[tokio::test]
async fn test_empty_project_completes() {
    let store = Arc::new(MemoryStore::new().with_project(project(), Vec::new()));
    let engine = FakeEngine::accepting();
    let trigger = trigger_for(engine.clone(), RecordingSink::new());
    let orchestrator = Orchestrator::new(store.clone(), trigger);

    let report = orchestrator
        .run_cycle(&ProjectId::from(PROJECT_ID))
        .await
        .unwrap();

    assert!(report.completed);
    assert_eq!(report.status, OrchestrationStatus::Completed);
    assert_eq!(engine.call_count(), 0);
}

/// Test: Per-project serialization
/// Given two cycles for the same project started together
/// When the engine is slow
/// Then only one trigger is in flight at a time
#[tokio::test]
async fn test_concurrent_cycles_are_serialized() {
    let store = hybrid_store();
    let engine = FakeEngine::slow(Duration::from_millis(30));
    let trigger = trigger_for(engine.clone(), RecordingSink::new());
    let orchestrator = Orchestrator::new(store.clone(), trigger);
    let pid = ProjectId::from(PROJECT_ID);

    let (first, second) =
        tokio::join!(orchestrator.run_cycle(&pid), orchestrator.run_cycle(&pid));
    assert!(first.unwrap().outcome.unwrap().is_success());
    assert!(second.unwrap().outcome.unwrap().is_success());

    assert_eq!(engine.call_count(), 2);
    assert_eq!(engine.peak_in_flight(), 1);
    assert_eq!(store.load_project(&pid).await.unwrap().total_orchestration_runs, 2);
}

/// Test: Different projects do not block each other
#[tokio::test]
async fn test_cycles_for_different_projects_overlap() {
    let store = Arc::new(
        MemoryStore::new()
            .with_project(project(), hybrid_tasks())
            .with_project(
                Project::new("Other").with_id("proj-2"),
                hybrid_tasks(),
            ),
    );
    let engine = FakeEngine::slow(Duration::from_millis(50));
    let trigger = trigger_for(engine.clone(), RecordingSink::new());
    let orchestrator = Orchestrator::new(store, trigger);

    let a = ProjectId::from(PROJECT_ID);
    let b = ProjectId::from("proj-2");
    let (first, second) =
        tokio::join!(orchestrator.run_cycle(&a), orchestrator.run_cycle(&b));
    first.unwrap();
    second.unwrap();

    assert_eq!(engine.peak_in_flight(), 2);
}

/// Test: One broken project does not stop the others
/// Given a strict resolver, a project with a dependency cycle and a healthy one
/// When all projects are cycled
/// Then the broken one reports its error and the healthy one is still triggered
#[tokio::test]
async fn test_run_all_isolates_failing_project() {
    let cyclic = vec![
        Task::new("x", TaskType::Ai, 1).with_id("x").with_dependencies(["y"]),
        Task::new("y", TaskType::Ai, 2).with_id("y").with_dependencies(["x"]),
        Task::new("z", TaskType::Ai, 3).with_id("z"),
    ];
    let healthy = vec![Task::new("t", TaskType::Human, 1).with_id("t")];
    let store = Arc::new(
        MemoryStore::new()
            .with_project(Project::new("Cyclic").with_id("a-cyclic"), cyclic)
            .with_project(Project::new("Healthy").with_id("b-healthy"), healthy),
    );
    let engine = FakeEngine::accepting();
    let trigger = trigger_for(engine.clone(), RecordingSink::new());
    let orchestrator = Orchestrator::new(store.clone(), trigger)
        .with_resolver(ReadinessResolver::new(CycleStrictness::Strict));

    let ids = [
        ProjectId::from("a-cyclic"),
        ProjectId::from("missing"),
        ProjectId::from("b-healthy"),
    ];
    let cycles = orchestrator.run_all(&ids).await;

    assert_eq!(cycles.len(), 3);
    assert!(matches!(cycles[0].result, Err(Error::DependencyCycle { .. })));
    assert!(matches!(cycles[1].result, Err(Error::ProjectNotFound(_))));
    let healthy = cycles[2].result.as_ref().unwrap();
    assert!(healthy.outcome.as_ref().unwrap().is_success());

    assert_eq!(engine.call_count(), 1);
    let stored = store.load_project(&ProjectId::from("b-healthy")).await.unwrap();
    assert_eq!(stored.total_orchestration_runs, 1);
}

/// Test: Late status reports keep the completion time
/// Given a project that has already completed
/// When another status report arrives
/// Then `orchestration_completed_at` is not moved
#[tokio::test]
async fn test_status_report_after_completion_keeps_timestamp() {
    let tasks = vec![Task::new("t", TaskType::Human, 1).with_id("t")];
    let store = Arc::new(MemoryStore::new().with_project(project(), tasks));
    let orchestrator = Orchestrator::for_store(store.clone());
    let pid = ProjectId::from(PROJECT_ID);
    let tid = TaskId::from("t");

    assert!(orchestrator
        .report_task_status(&pid, &tid, TaskStatus::Completed)
        .await
        .unwrap());
    let first = store.load_project(&pid).await.unwrap();
    assert!(first.orchestration_completed_at.is_some());

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(orchestrator
        .report_task_status(&pid, &tid, TaskStatus::Completed)
        .await
        .unwrap());
    assert!(orchestrator.evaluate_completion(&pid).await.unwrap());

    let second = store.load_project(&pid).await.unwrap();
    assert_eq!(
        second.orchestration_completed_at,
        first.orchestration_completed_at
    );
}

/// Test: No engine configured
#[tokio::test]
async fn test_cycle_without_engine_fails_at_trigger_step() {
    let orchestrator = Orchestrator::for_store(hybrid_store());
    let result = orchestrator.run_cycle(&ProjectId::from(PROJECT_ID)).await;
    assert!(matches!(result, Err(Error::Config(_))));
}
