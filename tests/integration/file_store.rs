//! Cycles persisted through the JSON file store.

use std::sync::Arc;
use tempfile::TempDir;

use taskpilot::core::{OrchestrationStatus, ProjectId, TaskId, TaskStatus};
use taskpilot::orchestration::Orchestrator;
use taskpilot::store::{JsonFileStore, ProjectDocument, TaskStore};

use crate::fixtures::{hybrid_tasks, project, trigger_for, FakeEngine, RecordingSink, PROJECT_ID};

#[tokio::test]
async fn test_cycle_state_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let store = JsonFileStore::new(dir.path());
    store
        .write_document(&ProjectDocument::new(project(), hybrid_tasks()))
        .await
        .unwrap();

    let engine = FakeEngine::accepting();
    let orchestrator = Orchestrator::new(
        Arc::new(store.clone()),
        trigger_for(engine.clone(), RecordingSink::new()),
    );
    let pid = ProjectId::from(PROJECT_ID);
    orchestrator.run_cycle(&pid).await.unwrap();
    orchestrator
        .report_task_status(&pid, &TaskId::from("design"), TaskStatus::Completed)
        .await
        .unwrap();

    let reopened = JsonFileStore::new(dir.path());
    let doc = reopened.read_document(&pid).await.unwrap();
    assert_eq!(doc.project.orchestration_status, OrchestrationStatus::Running);
    assert_eq!(doc.project.total_orchestration_runs, 1);
    assert_eq!(
        doc.project
            .orchestration_metadata
            .last_trigger
            .as_ref()
            .map(|t| t.attempt),
        Some(1)
    );
    assert_eq!(doc.tasks[0].status, TaskStatus::Completed);
    assert_eq!(doc.tasks.len(), 4);
}

#[tokio::test]
async fn test_document_accepts_extra_fields() {
    let dir = TempDir::new().unwrap();
    let raw = r#"{
        "project": { "id": "imported", "name": "From JSON", "owner": "ops" },
        "tasks": [
            { "id": "t1", "name": "Plan", "type": "ai", "sequence": 1,
              "status": "completed", "dependencies": [], "priority": "high" },
            { "id": "t2", "name": "Review", "type": "hitl", "sequence": 2,
              "dependencies": ["t1"],
              "metadata": { "subtasks": [ { "name": "sign", "is_checkpoint": true } ] } }
        ]
    }"#;
    std::fs::write(dir.path().join("imported.json"), raw).unwrap();

    let store = JsonFileStore::new(dir.path());
    let pid = ProjectId::from("imported");
    let tasks = store.list_tasks(&pid).await.unwrap();

    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[1].status, TaskStatus::Pending);
    assert_eq!(tasks[1].checkpoint_count(), 1);
    assert_eq!(tasks[0].extra.get("priority").and_then(|v| v.as_str()), Some("high"));

    let mut project = store.load_project(&pid).await.unwrap();
    assert_eq!(project.orchestration_status, OrchestrationStatus::NotStarted);
    assert!(project.orchestration_metadata.is_empty());

    project.total_orchestration_runs = 1;
    store.save_project(&project).await.unwrap();

    let text = std::fs::read_to_string(dir.path().join("imported.json")).unwrap();
    let saved: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(saved["project"]["owner"], "ops");
    assert_eq!(saved["project"]["total_orchestration_runs"], 1);
    assert_eq!(saved["tasks"][0]["priority"], "high");
}
