//! `agent-workflows` CLI entry-point.
//!
//! Available sub-commands:
//! - `serve`    — start the HTTP trigger API.
//! - `migrate`  — run pending database migrations.
//! - `import`   — validate a workflow JSON file and store it.
//! - `run`      — run one pending execution from the command line.
//! - `validate` — validate a workflow JSON file.
//! - `simulate` — run a workflow JSON file in memory against a trigger payload.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

use db::{ExecutionStore, MemoryStore, PgStore};
use engine::{validate_workflow, ExecutorConfig, WorkflowDefinition, WorkflowExecutor};
use nodes::{ActionDispatcher, ActionLimits, LogMailer, ReqwestTransport};

#[derive(Parser)]
#[command(
    name = "agent-workflows",
    about = "Workflow execution engine for collaborating AI agents",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct DatabaseArgs {
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    #[arg(long, default_value_t = 10)]
    max_connections: u32,
}

#[derive(Args)]
struct EngineArgs {
    /// Maximum number of nodes one run may visit.
    #[arg(long, env = "ENGINE_MAX_STEPS", default_value_t = 100)]
    max_steps: usize,

    /// Ceiling on a whole webhook call, in seconds.
    #[arg(long, env = "ENGINE_WEBHOOK_TIMEOUT_SECS", default_value_t = 30)]
    webhook_timeout_secs: u64,
}

impl EngineArgs {
    fn executor(&self, store: Arc<dyn ExecutionStore>) -> anyhow::Result<WorkflowExecutor> {
        let limits = ActionLimits {
            webhook_timeout: Duration::from_secs(self.webhook_timeout_secs),
            ..ActionLimits::default()
        };
        let transport = ReqwestTransport::new(limits.webhook_timeout)
            .context("failed to build webhook client")?;
        let dispatcher =
            ActionDispatcher::with_builtins(Arc::new(LogMailer), Arc::new(transport), &limits);
        let config = ExecutorConfig { max_steps: self.max_steps, ..ExecutorConfig::default() };
        Ok(WorkflowExecutor::new(store, dispatcher, config))
    }
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP trigger API.
    Serve {
        #[arg(long, default_value = "0.0.0.0:8080")]
        bind: String,
        #[command(flatten)]
        db: DatabaseArgs,
        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Run pending database migrations.
    Migrate {
        #[command(flatten)]
        db: DatabaseArgs,
    },
    /// Validate a workflow definition JSON file and store it.
    Import {
        /// Path to the workflow JSON file.
        path: PathBuf,
        #[command(flatten)]
        db: DatabaseArgs,
    },
    /// Run a pending execution and print its summary.
    Run {
        execution_id: String,
        #[command(flatten)]
        db: DatabaseArgs,
        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Validate a workflow definition JSON file.
    Validate {
        /// Path to the workflow JSON file.
        path: PathBuf,
    },
    /// Run a workflow definition JSON file in memory and print the step log.
    Simulate {
        /// Path to the workflow JSON file.
        path: PathBuf,
        /// Trigger payload as JSON.
        #[arg(long, default_value = "{}")]
        trigger: String,
        #[command(flatten)]
        engine: EngineArgs,
    },
}

fn read_definition(path: &Path) -> anyhow::Result<WorkflowDefinition> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read file {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid workflow JSON in {}", path.display()))
}

async fn connect(db: &DatabaseArgs) -> anyhow::Result<PgStore> {
    let pool = db::pool::create_pool(&db.database_url, db.max_connections)
        .await
        .context("failed to connect to database")?;
    Ok(PgStore::new(pool))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so command output on stdout stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { bind, db, engine } => {
            let store = connect(&db).await?;
            let executor = engine.executor(Arc::new(store))?;
            info!(max_steps = engine.max_steps, "starting API server on {bind}");
            api::serve(&bind, api::AppState::new(executor)).await?;
        }
        Command::Migrate { db } => {
            let store = connect(&db).await?;
            db::pool::run_migrations(store.pool()).await.context("migration failed")?;
            info!("migrations applied successfully");
        }
        Command::Import { path, db } => {
            let definition = read_definition(&path)?;
            validate_workflow(&definition.clone().into_workflow())
                .context("workflow failed validation")?;

            let store = connect(&db).await?;
            let (workflow, nodes, edges) = definition.into_rows();
            store.save_workflow(&workflow, &nodes, &edges).await?;
            info!(workflow_id = %workflow.id, nodes = nodes.len(), edges = edges.len(), "workflow imported");
            println!("{}", workflow.id);
        }
        Command::Run { execution_id, db, engine } => {
            let store = connect(&db).await?;
            let executor = engine.executor(Arc::new(store))?;
            let summary = executor.run_execution(&execution_id).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Validate { path } => {
            let workflow = read_definition(&path)?.into_workflow();

            match validate_workflow(&workflow) {
                Ok(reachable) => {
                    println!("✅ Workflow is valid. Reachable from trigger: {reachable:?}");
                    let unreachable: Vec<&str> = workflow
                        .nodes
                        .iter()
                        .map(|n| n.id.as_str())
                        .filter(|id| !reachable.iter().any(|r| r == id))
                        .collect();
                    if !unreachable.is_empty() {
                        println!("⚠️  Never visited: {unreachable:?}");
                    }
                }
                Err(e) => {
                    eprintln!("❌ Validation failed: {e}");
                    std::process::exit(1);
                }
            }
        }
        Command::Simulate { path, trigger, engine } => {
            let trigger_data: Value =
                serde_json::from_str(&trigger).context("--trigger is not valid JSON")?;
            if !trigger_data.is_object() {
                bail!("--trigger must be a JSON object");
            }

            let definition = read_definition(&path)?;
            let workflow_id = definition.id;
            let (workflow, nodes, edges) = definition.into_rows();

            let store = Arc::new(MemoryStore::new());
            store.insert_workflow(workflow, nodes, edges).await;

            let executor = engine.executor(store)?;
            let execution = executor.create_execution(workflow_id, trigger_data).await?;
            let summary = executor.run_execution(&execution.id.to_string()).await?;
            let steps = executor.list_steps(execution.id).await?;
            let finished = executor.get_execution(execution.id).await?;

            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "summary": summary,
                    "execution": finished,
                    "steps": steps,
                }))?
            );
        }
    }

    Ok(())
}
