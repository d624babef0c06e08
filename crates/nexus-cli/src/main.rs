//! `nexus` command-line coordinator.

mod config;

use anyhow::Context;
use clap::{Parser, Subcommand};
use config::NexusConfig;
use nexus_broker::{Broker, PubSub};
use nexus_capability::{CapabilityMatcher, CapabilityRegistry, MatchResult};
use nexus_core::{AgentDefinition, Task, TaskResult};
use nexus_orchestrator::{
    load_agent_definitions, AgentWorker, HttpExecutor, InMemoryMetrics, MetricsCollector,
    ParametersPayloadGenerator, TaskRouter, WorkerHandle,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nexus", version, about = "Capability-based task routing for agent fleets")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "nexus.toml")]
    config: PathBuf,

    /// Agent definitions file, overriding `agents_file` from the config
    #[arg(short, long)]
    agents: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered capabilities and actions
    Capabilities,
    /// Rank candidate agents for the tasks in a file without dispatching
    Match {
        #[arg(short, long)]
        task: PathBuf,
    },
    /// Start workers, route the tasks in a file and print the results
    Route {
        #[arg(short, long)]
        task: PathBuf,
        /// How long to wait for results before giving up
        #[arg(long, default_value_t = 30)]
        wait_secs: u64,
    },
    /// Check a payload against an action's input schema
    Validate {
        #[arg(long)]
        agent: String,
        #[arg(long)]
        action: String,
        #[arg(long)]
        payload: PathBuf,
    },
    /// Run workers until Ctrl-C
    Serve,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let config = NexusConfig::load(&cli.config)?;
    let agents_file = cli.agents.clone().unwrap_or_else(|| config.agents_file.clone());
    let definitions = load_agent_definitions(&agents_file)
        .with_context(|| format!("Failed to load agents from '{}'", agents_file.display()))?;
    info!(agents = definitions.len(), file = %agents_file.display(), "Agent definitions loaded");

    match cli.command {
        Commands::Capabilities => {
            print_capabilities(&definitions);
            Ok(())
        }
        Commands::Match { task } => {
            let tasks = read_tasks(&task)?;
            let registry = Arc::new(CapabilityRegistry::new());
            for definition in &definitions {
                registry.register(definition.agent_id(), definition.to_capability());
            }
            let matcher = CapabilityMatcher::new(registry, config.matcher.clone())?;
            let report: Vec<serde_json::Value> = tasks
                .iter()
                .map(|t| {
                    let matches: Vec<_> = matcher.find_matching_agents(t).iter().map(match_json).collect();
                    serde_json::json!({ "taskId": t.id, "title": t.title, "matches": matches })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Commands::Route { task, wait_secs } => {
            let tasks = read_tasks(&task)?;
            route(&config, definitions, tasks, Duration::from_secs(wait_secs)).await
        }
        Commands::Validate {
            agent,
            action,
            payload,
        } => validate_payload(&definitions, &agent, &action, &payload),
        Commands::Serve => serve(&config, definitions).await,
    }
}

fn print_capabilities(definitions: &[AgentDefinition]) {
    let registry = CapabilityRegistry::new();
    for definition in definitions {
        registry.register(definition.agent_id(), definition.to_capability());
    }
    println!("Capabilities: {}", registry.top_level_capabilities());
    for capability in registry.all() {
        println!("\n{}", capability.agent_id);
        for skill in &capability.capabilities {
            if skill.level.is_empty() {
                println!("  skill  {}", skill.skill_path);
            } else {
                println!("  skill  {} ({})", skill.skill_path, skill.level);
            }
        }
        for action in &capability.actions {
            println!("  action {} {} {}", action.name, action.method, action.path);
        }
    }
}

fn match_json(m: &MatchResult) -> serde_json::Value {
    serde_json::json!({
        "agentId": m.agent_id.as_str(),
        "action": m.action.name,
        "score": m.score,
        "pathScore": m.path_score,
        "actionScore": m.action_score,
    })
}

/// A task file holds either one task or an array of them.
fn read_tasks(path: &Path) -> anyhow::Result<Vec<Task>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read task file '{}'", path.display()))?;
    parse_tasks(&raw).with_context(|| format!("Invalid task file '{}'", path.display()))
}

fn parse_tasks(raw: &str) -> anyhow::Result<Vec<Task>> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    if value.is_array() {
        Ok(serde_json::from_value(value)?)
    } else {
        Ok(vec![serde_json::from_value(value)?])
    }
}

fn validate_payload(
    definitions: &[AgentDefinition],
    agent: &str,
    action: &str,
    payload: &Path,
) -> anyhow::Result<()> {
    let definition = definitions
        .iter()
        .find(|d| d.id == agent)
        .with_context(|| format!("Unknown agent '{agent}'"))?;
    let action = definition
        .actions
        .iter()
        .find(|a| a.name == action)
        .with_context(|| format!("Agent '{agent}' has no action '{action}'"))?;
    let bytes = std::fs::read(payload)
        .with_context(|| format!("Failed to read payload '{}'", payload.display()))?;

    match nexus_schema::validate_bytes(&action.input_schema, &bytes) {
        Ok(_) => {
            println!("valid: payload matches {agent}/{}", action.name);
            Ok(())
        }
        Err(e) => anyhow::bail!("invalid: {e}"),
    }
}

/// Registry, broker and metrics shared by the workers and the router.
struct Fleet {
    registry: Arc<CapabilityRegistry>,
    broker: Arc<PubSub>,
    metrics: Arc<InMemoryMetrics>,
    workers: Vec<WorkerHandle>,
}

impl Fleet {
    fn start(
        config: &NexusConfig,
        definitions: Vec<AgentDefinition>,
        results: Option<mpsc::UnboundedSender<TaskResult>>,
    ) -> anyhow::Result<Self> {
        let registry = Arc::new(CapabilityRegistry::new());
        let broker = Arc::new(PubSub::new(config.broker.clone())?);
        let metrics = Arc::new(InMemoryMetrics::new());
        let mut fleet = Self {
            registry,
            broker,
            metrics,
            workers: Vec::new(),
        };

        for definition in definitions {
            let executor = HttpExecutor::new(definition.clone(), &config.http, config.retry.clone())?
                .with_generator(Arc::new(ParametersPayloadGenerator));
            let mut worker = AgentWorker::new(
                definition,
                fleet.registry.clone(),
                fleet.broker.clone(),
                Arc::new(executor),
                fleet.metrics.clone(),
                config.worker.clone(),
            );
            if let Some(tx) = &results {
                worker = worker.with_results(tx.clone());
            }
            fleet.workers.push(worker.start()?);
        }
        info!(workers = fleet.workers.len(), "Workers started");
        Ok(fleet)
    }

    fn router(&self, config: &NexusConfig) -> anyhow::Result<TaskRouter> {
        let matcher = CapabilityMatcher::new(self.registry.clone(), config.matcher.clone())?;
        Ok(TaskRouter::new(
            Arc::new(matcher),
            self.broker.clone(),
            self.metrics.clone(),
        ))
    }

    async fn shutdown(self) {
        for worker in self.workers {
            let agent_id = worker.agent_id().clone();
            if let Err(e) = worker.shutdown().await {
                warn!(agent = %agent_id, error = %e, "Worker shutdown failed");
            }
        }
        self.broker.close();
        for (key, data) in self.metrics.all() {
            info!(
                skill_path = %key.skill_path,
                action = %key.action,
                routed = data.routing_successes,
                unroutable = data.routing_failures,
                completed = data.tasks_completed,
                failed = data.tasks_failed,
                avg_ms = data.average_processing_ms,
                "Metrics"
            );
        }
    }
}

async fn route(
    config: &NexusConfig,
    definitions: Vec<AgentDefinition>,
    tasks: Vec<Task>,
    wait: Duration,
) -> anyhow::Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let fleet = Fleet::start(config, definitions, Some(tx))?;
    let router = fleet.router(config)?;

    let mut report: HashMap<String, serde_json::Value> = HashMap::new();
    let mut order = Vec::with_capacity(tasks.len());
    let mut outstanding = 0usize;
    for mut task in tasks {
        order.push(task.id.clone());
        match router.route_task(&mut task) {
            Ok(best) => {
                outstanding += 1;
                report.insert(
                    task.id.clone(),
                    serde_json::json!({ "taskId": task.id, "routedTo": best.agent_id.as_str() }),
                );
            }
            Err(e) => {
                error!(task_id = %task.id, error = %e, "Task could not be routed");
                report.insert(
                    task.id.clone(),
                    serde_json::json!({ "taskId": task.id, "routed": false, "error": e.to_string() }),
                );
            }
        }
    }

    let deadline = tokio::time::Instant::now() + wait;
    while outstanding > 0 {
        match tokio::time::timeout_at(deadline, rx.recv()).await {
            Ok(Some(result)) => {
                outstanding -= 1;
                if let Some(entry) = report.get_mut(&result.task_id) {
                    entry["result"] = serde_json::to_value(&result)?;
                    if let Ok(output) = serde_json::from_slice::<serde_json::Value>(&result.output) {
                        entry["output"] = output;
                    }
                }
            }
            Ok(None) => break,
            Err(_) => {
                warn!(outstanding, "Timed out waiting for results");
                break;
            }
        }
    }

    fleet.shutdown().await;
    let ordered: Vec<_> = order.iter().filter_map(|id| report.remove(id)).collect();
    println!("{}", serde_json::to_string_pretty(&ordered)?);
    Ok(())
}

async fn serve(config: &NexusConfig, definitions: Vec<AgentDefinition>) -> anyhow::Result<()> {
    let fleet = Fleet::start(config, definitions, None)?;
    info!(
        capabilities = %fleet.registry.top_level_capabilities(),
        "Serving, press Ctrl-C to stop"
    );
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Shutting down");
    fleet.shutdown().await;
    Ok(())
}
