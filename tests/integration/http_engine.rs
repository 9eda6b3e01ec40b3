//! The HTTP workflow engine against a local mock webhook.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use taskpilot::core::{OrchestrationStatus, TaskId};
use taskpilot::orchestration::{
    HttpWorkflowEngine, OrchestrationTrigger, TriggerConfig, TriggerOutcome,
};

use crate::fixtures::{project, RecordingSink, PROJECT_ID};

fn trigger_against(url: &str, config: TriggerConfig) -> (OrchestrationTrigger, Arc<RecordingSink>) {
    let sink = RecordingSink::new();
    let engine = HttpWorkflowEngine::new(url).unwrap();
    let trigger = OrchestrationTrigger::new(Arc::new(engine), config).with_alert_sink(sink.clone());
    (trigger, sink)
}

fn quick(max_retries: u32) -> TriggerConfig {
    TriggerConfig::new(Duration::from_millis(500), max_retries, Duration::from_millis(5))
}

#[tokio::test]
async fn test_posts_payload_and_records_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hooks/orchestrate"))
        .and(body_partial_json(json!({
            "project_id": PROJECT_ID,
            "trigger_source": "taskpilot",
            "attempt": 1,
            "task_ids": ["design", "copy"],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "execution_id": "ex-42" })))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/hooks/orchestrate", server.uri());
    let (trigger, _) = trigger_against(&url, quick(3));
    let mut project = project();

    let outcome = trigger
        .trigger_batch(&mut project, 1, &[TaskId::from("design"), TaskId::from("copy")])
        .await;

    assert!(outcome.is_success());
    assert_eq!(project.orchestration_status, OrchestrationStatus::Running);
    let last = project.orchestration_metadata.last_trigger.unwrap();
    assert_eq!(last.response, json!({ "execution_id": "ex-42" }));
    assert_eq!(last.attempt, 1);
}

#[tokio::test]
async fn test_empty_success_body_reads_as_null() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let (trigger, _) = trigger_against(&server.uri(), quick(3));
    let mut project = project();

    assert!(trigger.trigger(&mut project, 1).await);
    let last = project.orchestration_metadata.last_trigger.unwrap();
    assert!(last.response.is_null());
}

#[tokio::test]
async fn test_server_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("engine exploded"))
        .expect(1)
        .mount(&server)
        .await;

    let (trigger, sink) = trigger_against(&server.uri(), quick(3));
    let mut project = project();

    let outcome = trigger.trigger_batch(&mut project, 3, &[]).await;

    assert_eq!(
        outcome,
        TriggerOutcome::Rejected {
            status_code: 500,
            attempt: 3,
            terminal: true,
        }
    );
    assert_eq!(project.orchestration_status, OrchestrationStatus::Failed);
    let failure = project.orchestration_metadata.last_trigger_failure.unwrap();
    assert_eq!(failure.body, "engine exploded");
    assert_eq!(sink.alerts().len(), 1);
}

#[tokio::test]
async fn test_slow_webhook_is_retried_then_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(400)))
        .mount(&server)
        .await;

    let config = TriggerConfig::new(Duration::from_millis(50), 2, Duration::from_millis(5));
    let (trigger, _) = trigger_against(&server.uri(), config);
    let mut project = project();

    let outcome = trigger.trigger_batch(&mut project, 1, &[]).await;

    assert!(matches!(outcome, TriggerOutcome::Errored { attempt: 1, .. }));
    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 3);
    assert!(project.orchestration_metadata.last_error.is_some());
}

#[tokio::test]
async fn test_unreachable_engine_records_error() {
    // Grab a free port, then close it so nothing is listening.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let url = format!("http://127.0.0.1:{}/hook", port);
    let (trigger, sink) = trigger_against(&url, quick(2));
    let mut project = project();

    let outcome = trigger.trigger_batch(&mut project, 1, &[]).await;

    assert!(matches!(outcome, TriggerOutcome::Errored { .. }));
    assert_eq!(project.orchestration_status, OrchestrationStatus::NotStarted);
    assert!(project.orchestration_metadata.last_error.is_some());
    assert!(sink.alerts().is_empty());
}
