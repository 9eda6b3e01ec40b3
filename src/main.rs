use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::json;

use taskpilot::config::Config;
use taskpilot::core::{ProjectId, TaskId, TaskStatus};
use taskpilot::orchestration::{
    select_batch_with, unmet_dependencies, BatchLimits, HttpWorkflowEngine, Orchestrator,
    OrchestrationTrigger, ReadinessResolver, TaskCounts,
};
use taskpilot::store::{JsonFileStore, ProjectDocument, TaskStore};
use taskpilot::{tplog, Error, Result};

/// Taskpilot - dependency-aware task orchestration for hybrid AI/human projects
#[derive(Parser, Debug)]
#[command(name = "taskpilot")]
#[command(version, about, long_about = None)]
#[command(after_help = concat!(
    "ENVIRONMENT:\n",
    "    TASKPILOT_DEBUG=1     Enable debug logging (alternative to --debug)"
))]
pub struct Cli {
    /// Enable debug logging (writes to ~/.taskpilot/taskpilot.log)
    #[arg(short = 'd', long)]
    pub debug: bool,

    /// Read configuration from this file instead of ~/.taskpilot/taskpilot.toml
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Import a project document (project plus tasks) from a JSON file
    Import {
        /// Path to the JSON document
        file: PathBuf,
    },

    /// List the tasks that are ready to start
    Ready {
        project: String,

        /// Also list blocked pending tasks and what they wait on
        #[arg(long)]
        explain: bool,
    },

    /// Show the batch the next cycle would dispatch
    Batch { project: String },

    /// Trigger the workflow engine for a project
    Trigger {
        project: String,

        /// Attempt number (defaults to the one after the last failure)
        #[arg(long)]
        attempt: Option<u32>,
    },

    /// Record a task status reported by a worker or reviewer
    SetStatus {
        project: String,
        task: String,
        /// pending, in_progress, blocked, review or completed
        status: String,
    },

    /// Evaluate whether a project's orchestration is complete
    Complete { project: String },

    /// Run one orchestration cycle (all projects if none is given)
    Cycle { project: Option<String> },

    /// Show orchestration status of stored projects
    Status { project: Option<String> },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    taskpilot::log::init_with_debug(cli.debug);
    if taskpilot::log::is_debug() {
        tplog!("taskpilot starting (debug mode enabled)");
    }

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let store = JsonFileStore::new(config.state_dir()?);
    tplog!("taskpilot {:?} (state dir {})", cli.command, store.dir().display());

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(cli.command, config, store))
}

async fn run(command: Command, config: Config, store: JsonFileStore) -> Result<()> {
    match command {
        Command::Import { file } => run_import(&store, file).await,
        Command::Ready { project, explain } => {
            run_ready(&config, &store, &ProjectId::from(project), explain).await
        }
        Command::Batch { project } => run_batch(&config, &store, &ProjectId::from(project)).await,
        Command::Trigger { project, attempt } => {
            run_trigger(&config, &store, &ProjectId::from(project), attempt).await
        }
        Command::SetStatus {
            project,
            task,
            status,
        } => {
            let status: TaskStatus = status.parse()?;
            run_set_status(&store, &ProjectId::from(project), &TaskId::from(task), status).await
        }
        Command::Complete { project } => run_complete(&store, &ProjectId::from(project)).await,
        Command::Cycle { project } => run_cycle(&config, store, project).await,
        Command::Status { project } => run_status(&store, project).await,
    }
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_import(store: &JsonFileStore, file: PathBuf) -> Result<()> {
    let text = tokio::fs::read_to_string(&file).await?;
    let doc: ProjectDocument = serde_json::from_str(&text)?;
    store.write_document(&doc).await?;
    tplog!(
        "Imported project {} with {} tasks from {}",
        doc.project.id,
        doc.tasks.len(),
        file.display()
    );
    print_json(&json!({
        "project_id": doc.project.id,
        "tasks": doc.tasks.len(),
    }))
}

async fn run_ready(
    config: &Config,
    store: &JsonFileStore,
    id: &ProjectId,
    explain: bool,
) -> Result<()> {
    let tasks = store.list_tasks(id).await?;
    let ready = ReadinessResolver::new(config.cycle_strictness()).resolve(&tasks)?;
    let ready_ids: Vec<&TaskId> = ready.iter().map(|t| &t.id).collect();

    if !explain {
        return print_json(&json!({ "project_id": id, "ready": ready }));
    }

    let waiting: Vec<_> = tasks
        .iter()
        .filter(|t| t.is_pending() && !ready_ids.contains(&&t.id))
        .map(|t| {
            json!({
                "id": t.id,
                "name": t.name,
                "unmet": unmet_dependencies(t, &tasks),
            })
        })
        .collect();
    print_json(&json!({ "project_id": id, "ready": ready, "waiting": waiting }))
}

async fn run_batch(config: &Config, store: &JsonFileStore, id: &ProjectId) -> Result<()> {
    let tasks = store.list_tasks(id).await?;
    let ready = ReadinessResolver::new(config.cycle_strictness()).resolve(&tasks)?;
    let batch = select_batch_with(&ready, &BatchLimits::default());
    print_json(&json!({ "project_id": id, "batch": batch }))
}

fn build_trigger(config: &Config) -> Result<OrchestrationTrigger> {
    let trigger_config = config.trigger_config()?;
    let url = config.trigger_url().unwrap_or_default();
    let engine = HttpWorkflowEngine::new(url)?;
    Ok(OrchestrationTrigger::new(Arc::new(engine), trigger_config)
        .with_trigger_source(config.trigger_source()))
}

async fn run_trigger(
    config: &Config,
    store: &JsonFileStore,
    id: &ProjectId,
    attempt: Option<u32>,
) -> Result<()> {
    let trigger = build_trigger(config)?;
    let mut project = store.load_project(id).await?;
    let attempt = attempt.unwrap_or_else(|| project.orchestration_metadata.next_attempt());

    let outcome = trigger.trigger_batch(&mut project, attempt, &[]).await;
    store.save_project(&project).await?;

    print_json(&json!({
        "project_id": id,
        "success": outcome.is_success(),
        "result": outcome,
        "orchestration_status": project.orchestration_status,
    }))
}

async fn run_set_status(
    store: &JsonFileStore,
    project_id: &ProjectId,
    task_id: &TaskId,
    status: TaskStatus,
) -> Result<()> {
    let orchestrator = Orchestrator::for_store(Arc::new(store.clone()));
    let complete = orchestrator
        .report_task_status(project_id, task_id, status)
        .await?;
    print_json(&json!({
        "project_id": project_id,
        "task_id": task_id,
        "status": status,
        "project_complete": complete,
    }))
}

async fn run_complete(store: &JsonFileStore, id: &ProjectId) -> Result<()> {
    let orchestrator = Orchestrator::for_store(Arc::new(store.clone()));
    let complete = orchestrator.evaluate_completion(id).await?;

    let doc = store.read_document(id).await?;
    print_json(&json!({
        "project_id": id,
        "complete": complete,
        "counts": TaskCounts::from_tasks(&doc.tasks),
        "orchestration_completed_at": doc.project.orchestration_completed_at,
    }))
}

async fn run_cycle(config: &Config, store: JsonFileStore, project: Option<String>) -> Result<()> {
    let ids = match project {
        Some(id) => vec![ProjectId::from(id)],
        None => store.list_projects().await?,
    };

    let orchestrator = Orchestrator::new(Arc::new(store), build_trigger(config)?)
        .with_resolver(ReadinessResolver::new(config.cycle_strictness()));

    let mut entries = Vec::with_capacity(ids.len());
    let mut failed = 0;
    for cycle in orchestrator.run_all(&ids).await {
        match cycle.result {
            Ok(report) => entries.push(serde_json::to_value(&report)?),
            Err(e) => {
                failed += 1;
                entries.push(json!({
                    "project_id": cycle.project_id,
                    "error": e.to_string(),
                }));
            }
        }
    }
    print_json(&json!({ "cycles": entries }))?;

    if failed > 0 {
        return Err(Error::CyclesFailed {
            failed,
            total: ids.len(),
        });
    }
    Ok(())
}

async fn run_status(store: &JsonFileStore, project: Option<String>) -> Result<()> {
    let ids = match project {
        Some(id) => vec![ProjectId::from(id)],
        None => store.list_projects().await?,
    };

    let mut projects = Vec::with_capacity(ids.len());
    for id in &ids {
        let doc = store.read_document(id).await?;
        projects.push(json!({
            "id": doc.project.id,
            "name": doc.project.name,
            "orchestration_status": doc.project.orchestration_status,
            "total_orchestration_runs": doc.project.total_orchestration_runs,
            "orchestration_completed_at": doc.project.orchestration_completed_at,
            "metadata": doc.project.orchestration_metadata,
            "counts": TaskCounts::from_tasks(&doc.tasks),
        }));
    }
    print_json(&json!({ "projects": projects }))
}
