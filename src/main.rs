// Async CLI entrypoint — see `lib.rs` for the module map the binary drives
// through the `Core` facade.
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use uuid::Uuid;

use tiny_agent_graph::config::Config;
use tiny_agent_graph::models::WorkflowDefinition;
use tiny_agent_graph::Core;

/// CLI entrypoint using `clap` to define subcommands.
#[derive(Parser)]
#[command(name = "tiny-agent-graph", version, about = "Durable DAG runner for agent workflows")]
struct Cli {
    /// Override the sqlite database location (defaults to TINY_AGENT_GRAPH_DB or a local file).
    #[arg(long, global = true)]
    db: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Parse and persist a workflow definition (JSON or YAML) from disk.
    CreateWorkflow { path: PathBuf },
    /// Start a run for an already-created workflow.
    StartRun {
        workflow_id: Uuid,
        #[arg(long)]
        business_object: Option<Uuid>,
    },
    /// Print a run's current status and per-step results.
    GetRun { run_id: Uuid },
    /// List every run.
    ListRuns,
    /// List every workflow.
    ListWorkflows,
    /// Print a workflow's stored definition.
    GetWorkflow { workflow_id: Uuid },
    /// Create a demo order (BusinessObject) with a starting amount.
    CreateOrder {
        #[arg(long)]
        amount: f64,
    },
    /// Print a demo order's current status.
    GetOrder { id: Uuid },
    /// Run recovery, then report how many in-flight runs were resubmitted.
    Serve,
}

fn parse_definition(path: &PathBuf) -> anyhow::Result<WorkflowDefinition> {
    let contents = std::fs::read_to_string(path)?;
    if path.extension().and_then(|e| e.to_str()) == Some("json") {
        Ok(serde_json::from_str(&contents)?)
    } else {
        Ok(serde_yaml::from_str(&contents)?)
    }
}

/// `Core::start_run` submits the run's worker to the Supervisor and returns
/// immediately (spec §4.4), but this CLI is a one-shot process: once `main`
/// returns, the Tokio runtime is torn down and an unpolled `RunWorker` task
/// is simply dropped. A Run abandoned at PENDING is invisible to recovery
/// (`recover_all` only scans for RUNNING), so it would never be picked up
/// by any future process. Block here until the worker has made its first
/// write (status leaves PENDING) before letting the process exit, so the
/// Run is always either already terminal or durably RUNNING and therefore
/// recoverable.
async fn wait_until_scheduled(core: &Core, run_id: Uuid) -> anyhow::Result<String> {
    for _ in 0..200 {
        let run = core.get_run(run_id).await?;
        if run.status != "PENDING" {
            return Ok(run.status);
        }
        tokio::time::sleep(std::time::Duration::from_millis(25)).await;
    }
    anyhow::bail!("run {run_id} was never scheduled off PENDING by its worker")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(db) = &cli.db {
        config.database_url = db.clone();
    }

    tracing_subscriber::fmt()
        .with_env_filter(config.log_filter.clone())
        .with_writer(std::io::stderr)
        .init();

    let core = Core::connect(&config.database_url).await?;
    let recovered = core.recover().await?;
    info!(recovered, "🔁 recovery complete, external interface now open");

    match cli.command {
        Commands::CreateWorkflow { path } => {
            info!("📄 loading workflow from {:?}", path);
            match parse_definition(&path) {
                Ok(definition) => match core.create_workflow(&definition.name, definition).await {
                    Ok(id) => println!("✅ created workflow {id}"),
                    Err(err) => {
                        error!("❌ failed to create workflow: {err}");
                        std::process::exit(1);
                    }
                },
                Err(err) => {
                    error!("❌ failed to parse workflow definition: {err}");
                    std::process::exit(1);
                }
            }
        }
        Commands::StartRun {
            workflow_id,
            business_object,
        } => match core.start_run(workflow_id, business_object).await {
            Ok(run_id) => match wait_until_scheduled(&core, run_id).await {
                Ok(status) => println!("🚀 started run {run_id} (status: {status})"),
                Err(err) => {
                    error!("❌ run {run_id} was submitted but never scheduled: {err}");
                    std::process::exit(1);
                }
            },
            Err(err) => {
                error!("❌ failed to start run: {err}");
                std::process::exit(1);
            }
        },
        Commands::GetRun { run_id } => match core.get_run(run_id).await {
            Ok(run) => println!("{}", serde_json::to_string_pretty(&run)?),
            Err(err) => {
                error!("failed to fetch run: {err}");
                std::process::exit(1);
            }
        },
        Commands::ListRuns => {
            let runs = core.list_runs().await?;
            println!("{}", serde_json::to_string_pretty(&runs)?);
        }
        Commands::ListWorkflows => {
            let workflows = core.list_workflows().await?;
            println!("{}", serde_json::to_string_pretty(&workflows)?);
        }
        Commands::GetWorkflow { workflow_id } => match core.get_workflow(workflow_id).await {
            Ok(workflow) => println!("{}", serde_json::to_string_pretty(&workflow)?),
            Err(err) => {
                error!("failed to fetch workflow: {err}");
                std::process::exit(1);
            }
        },
        Commands::CreateOrder { amount } => match core.create_business_object(amount).await {
            Ok(id) => println!("created order {id}"),
            Err(err) => {
                error!("failed to create order: {err}");
                std::process::exit(1);
            }
        },
        Commands::GetOrder { id } => match core.get_business_object(id).await {
            Ok(obj) => println!("{}", serde_json::to_string_pretty(&obj)?),
            Err(err) => {
                error!("failed to fetch order: {err}");
                std::process::exit(1);
            }
        },
        Commands::Serve => {
            println!("🔁 recovery resubmitted {recovered} run(s)");
            // Block until every recovered run reaches a terminal state so the
            // process doesn't exit (and drop its spawned workers) while work
            // is still in flight — this binary has no long-lived server loop
            // of its own beyond this subcommand.
            loop {
                let runs = core.list_runs().await?;
                let still_pending = runs
                    .iter()
                    .any(|r| r.status == "RUNNING" || r.status == "PENDING");
                if !still_pending {
                    break;
                }
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            }
            println!("✅ all runs reached a terminal state");
        }
    }

    Ok(())
}
