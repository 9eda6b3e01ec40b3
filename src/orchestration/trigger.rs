//! Orchestration trigger.
//!
//! Hands a project (and optionally a batch of task ids) to the external
//! workflow engine. Connectivity failures are retried in place with a
//! constant delay; any status code the engine returns is final for this
//! call. Every outcome except a paused skip is written into the project's
//! orchestration metadata.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::config::DEFAULT_TRIGGER_SOURCE;
use crate::core::project::{
    LastTrigger, OrchestrationStatus, Project, ProjectId, TriggerError, TriggerFailure,
};
use crate::core::task::TaskId;
use crate::error::{Error, Result};
use crate::{tplog, tplog_critical, tplog_debug, tplog_error, tplog_trace, tplog_warn};

/// Timeout and retry budget for the engine call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerConfig {
    /// Upper bound for a single request.
    pub timeout: Duration,
    /// Connectivity retries per call, and the attempt number at which a
    /// rejected trigger becomes terminal.
    pub max_retries: u32,
    /// Constant pause between connectivity retries.
    pub retry_delay: Duration,
}

impl TriggerConfig {
    pub fn new(timeout: Duration, max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            timeout,
            max_retries,
            retry_delay,
        }
    }

    /// Longest a single `trigger` call can block.
    pub fn worst_case_duration(&self) -> Duration {
        self.timeout * (self.max_retries + 1) + self.retry_delay * self.max_retries
    }
}

/// Payload posted to the workflow engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriggerRequest {
    pub project_id: ProjectId,
    pub trigger_source: String,
    pub attempt: u32,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub task_ids: Vec<TaskId>,
}

/// Status and raw body returned by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineResponse {
    pub status: u16,
    pub body: String,
}

impl EngineResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parse the body as JSON. An empty body reads as `null`.
    pub fn json(&self) -> Result<Value> {
        if self.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// The external workflow engine.
///
/// Implementations return `Error::Connectivity` or `Error::Timeout` when the
/// engine could not be reached, and `Ok` for any response carrying a status.
#[async_trait]
pub trait WorkflowEngine: Send + Sync {
    async fn send(&self, request: &TriggerRequest) -> Result<EngineResponse>;
}

/// Workflow engine reached over HTTP (a webhook that accepts JSON POSTs).
pub struct HttpWorkflowEngine {
    client: reqwest::Client,
    url: String,
}

impl HttpWorkflowEngine {
    pub fn new(url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Http(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(client, url))
    }

    pub fn with_client(client: reqwest::Client, url: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

fn classify(err: reqwest::Error) -> Error {
    if err.is_connect() || err.is_timeout() {
        Error::Connectivity(err.to_string())
    } else {
        Error::Http(err.to_string())
    }
}

#[async_trait]
impl WorkflowEngine for HttpWorkflowEngine {
    async fn send(&self, request: &TriggerRequest) -> Result<EngineResponse> {
        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(classify)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(classify)?;
        Ok(EngineResponse { status, body })
    }
}

/// A condition an operator has to act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub project_id: ProjectId,
    pub message: String,
    pub attempt: u32,
    pub status_code: Option<u16>,
}

/// Receiver for critical alerts.
pub trait AlertSink: Send + Sync {
    fn critical(&self, alert: &Alert);
}

/// Writes alerts to the log at CRITICAL level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn critical(&self, alert: &Alert) {
        tplog_critical!(
            "project={} attempt={} status={:?}: {}",
            alert.project_id,
            alert.attempt,
            alert.status_code,
            alert.message
        );
    }
}

/// How a trigger call ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum TriggerOutcome {
    /// The project is paused; nothing was sent.
    Skipped,
    /// The engine accepted the trigger.
    Succeeded { attempt: u32, response: Value },
    /// The engine answered with a non-success status.
    Rejected {
        status_code: u16,
        attempt: u32,
        /// The retry budget is spent and the project is now `failed`.
        terminal: bool,
    },
    /// No usable response (unreachable after retries, malformed body, ...).
    Errored { message: String, attempt: u32 },
}

impl TriggerOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TriggerOutcome::Succeeded { .. })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TriggerOutcome::Rejected { terminal: true, .. })
    }
}

/// Drives one trigger attempt against the workflow engine.
///
/// Callers must not run two triggers for the same project at once; the
/// cycle runner serializes them with `ProjectLocks`.
pub struct OrchestrationTrigger {
    engine: Arc<dyn WorkflowEngine>,
    config: TriggerConfig,
    trigger_source: String,
    alerts: Arc<dyn AlertSink>,
}

impl OrchestrationTrigger {
    pub fn new(engine: Arc<dyn WorkflowEngine>, config: TriggerConfig) -> Self {
        Self {
            engine,
            config,
            trigger_source: DEFAULT_TRIGGER_SOURCE.to_string(),
            alerts: Arc::new(LogAlertSink),
        }
    }

    pub fn with_trigger_source(mut self, source: &str) -> Self {
        self.trigger_source = source.to_string();
        self
    }

    pub fn with_alert_sink(mut self, alerts: Arc<dyn AlertSink>) -> Self {
        self.alerts = alerts;
        self
    }

    pub fn config(&self) -> &TriggerConfig {
        &self.config
    }

    /// Trigger the engine for `project`. Returns true if it was accepted.
    pub async fn trigger(&self, project: &mut Project, attempt: u32) -> bool {
        self.trigger_batch(project, attempt, &[]).await.is_success()
    }

    /// Trigger the engine for `project`, referencing the tasks in `batch`.
    pub async fn trigger_batch(
        &self,
        project: &mut Project,
        attempt: u32,
        batch: &[TaskId],
    ) -> TriggerOutcome {
        if project.is_paused() {
            tplog_debug!("Project {} is paused, not triggering", project.id);
            return TriggerOutcome::Skipped;
        }

        let attempt = attempt.max(1);
        let request = TriggerRequest {
            project_id: project.id.clone(),
            trigger_source: self.trigger_source.clone(),
            attempt,
            timestamp: Utc::now(),
            task_ids: batch.to_vec(),
        };
        tplog_trace!("Trigger request: {:?}", request);

        let result = self
            .send_with_retry(&request)
            .await
            .and_then(|response| {
                if response.is_success() {
                    response.json().map(Ok)
                } else {
                    Ok(Err(response))
                }
            });

        match result {
            Ok(Ok(body)) => self.record_success(project, attempt, body),
            Ok(Err(response)) => self.record_rejection(project, attempt, response),
            Err(err) => self.record_error(project, attempt, err),
        }
    }

    async fn send_with_retry(&self, request: &TriggerRequest) -> Result<EngineResponse> {
        let mut retries = 0;
        loop {
            let result = match tokio::time::timeout(self.config.timeout, self.engine.send(request))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout(self.config.timeout)),
            };

            match result {
                Err(err) if err.is_connectivity() && retries < self.config.max_retries => {
                    retries += 1;
                    tplog_warn!(
                        "Engine unreachable for project {} ({}), retry {}/{} in {:?}",
                        request.project_id,
                        err,
                        retries,
                        self.config.max_retries,
                        self.config.retry_delay
                    );
                    tokio::time::sleep(self.config.retry_delay).await;
                }
                other => return other,
            }
        }
    }

    fn record_success(&self, project: &mut Project, attempt: u32, body: Value) -> TriggerOutcome {
        project.total_orchestration_runs += 1;
        project.orchestration_status = OrchestrationStatus::Running;
        project.orchestration_metadata.last_trigger = Some(LastTrigger {
            at: Utc::now(),
            response: body.clone(),
            attempt,
        });
        tplog!(
            "Triggered project {} (attempt {}, run {})",
            project.id,
            attempt,
            project.total_orchestration_runs
        );
        TriggerOutcome::Succeeded {
            attempt,
            response: body,
        }
    }

    fn record_rejection(
        &self,
        project: &mut Project,
        attempt: u32,
        response: EngineResponse,
    ) -> TriggerOutcome {
        let status_code = response.status;
        tplog_error!(
            "Engine rejected trigger for project {} with status {} (attempt {}/{})",
            project.id,
            status_code,
            attempt,
            self.config.max_retries
        );
        project.orchestration_metadata.last_trigger_failure = Some(TriggerFailure {
            status_code,
            body: response.body,
            timestamp: Utc::now(),
            attempt,
        });

        let terminal = attempt >= self.config.max_retries;
        if terminal {
            project.orchestration_status = OrchestrationStatus::Failed;
            self.alerts.critical(&Alert {
                project_id: project.id.clone(),
                message: format!(
                    "orchestration failed after {} attempts; manual intervention required",
                    attempt
                ),
                attempt,
                status_code: Some(status_code),
            });
        }

        TriggerOutcome::Rejected {
            status_code,
            attempt,
            terminal,
        }
    }

    fn record_error(&self, project: &mut Project, attempt: u32, err: Error) -> TriggerOutcome {
        let message = err.to_string();
        tplog_error!(
            "Trigger for project {} failed (attempt {}): {}",
            project.id,
            attempt,
            message
        );
        project.orchestration_metadata.last_error = Some(TriggerError {
            message: message.clone(),
            timestamp: Utc::now(),
            attempt,
        });
        TriggerOutcome::Errored { message, attempt }
    }
}
