use crate::executor::Executor;
use crate::metrics::MetricsCollector;
use nexus_broker::{Broker, Subscription};
use nexus_capability::CapabilityRegistry;
use nexus_core::{AgentDefinition, AgentId, NexusError, NexusResult, Task, TaskResult, TaskStatus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{error, info, warn};

/// Execution limits for one agent worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Upper bound on a single execution.
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,
    /// Executions allowed to run at once.
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: usize,
}

fn default_task_timeout_secs() -> u64 {
    300
}

fn default_max_concurrent_tasks() -> usize {
    8
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            task_timeout_secs: default_task_timeout_secs(),
            max_concurrent_tasks: default_max_concurrent_tasks(),
        }
    }
}

impl WorkerConfig {
    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }
}

/// Shared state of a running worker's executions.
struct WorkerContext {
    agent_id: AgentId,
    executor: Arc<dyn Executor>,
    metrics: Arc<dyn MetricsCollector>,
    timeout: Duration,
    results: Option<mpsc::UnboundedSender<TaskResult>>,
}

impl WorkerContext {
    async fn process(&self, mut task: Task) {
        task.set_status(TaskStatus::Running);
        self.metrics.record_task_start(&task.id);
        info!(agent_id = %self.agent_id, task_id = %task.id, title = %task.title, "Task started");

        let result = match tokio::time::timeout(self.timeout, self.executor.execute(&task)).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => TaskResult::failure(&task.id, e.to_string()),
            Err(_) => TaskResult::failure(
                &task.id,
                format!("timed out after {}s", self.timeout.as_secs()),
            ),
        };

        if result.success {
            task.set_status(TaskStatus::Complete);
            self.metrics
                .record_task_complete(&task.requirements, &task.id);
            info!(agent_id = %self.agent_id, task_id = %task.id, "Task complete");
        } else {
            task.set_status(TaskStatus::Failed);
            let reason = result.error.as_deref().unwrap_or("unknown error");
            self.metrics
                .record_task_error(&task.requirements, &task.id, reason);
            warn!(agent_id = %self.agent_id, task_id = %task.id, error = reason, "Task failed");
        }

        if let Some(results) = &self.results {
            // The receiver may be gone if nobody is collecting results.
            let _ = results.send(result);
        }
    }
}

/// Long-lived consumer for one agent: registers it, listens on its topic
/// and runs each received task through an [`Executor`].
pub struct AgentWorker {
    definition: AgentDefinition,
    registry: Arc<CapabilityRegistry>,
    broker: Arc<dyn Broker>,
    executor: Arc<dyn Executor>,
    metrics: Arc<dyn MetricsCollector>,
    config: WorkerConfig,
    results: Option<mpsc::UnboundedSender<TaskResult>>,
}

impl AgentWorker {
    pub fn new(
        definition: AgentDefinition,
        registry: Arc<CapabilityRegistry>,
        broker: Arc<dyn Broker>,
        executor: Arc<dyn Executor>,
        metrics: Arc<dyn MetricsCollector>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            definition,
            registry,
            broker,
            executor,
            metrics,
            config,
            results: None,
        }
    }

    /// Forward every finished [`TaskResult`] to `results`.
    pub fn with_results(mut self, results: mpsc::UnboundedSender<TaskResult>) -> Self {
        self.results = Some(results);
        self
    }

    /// Subscribe, register and spawn the receive loop.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn start(self) -> NexusResult<WorkerHandle> {
        let agent_id = self.definition.agent_id();
        if self.config.max_concurrent_tasks == 0 {
            return Err(NexusError::Config(format!(
                "worker '{agent_id}' needs max_concurrent_tasks >= 1"
            )));
        }

        // Subscribed before registered: a routable agent always has a listener.
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let subscription = self
            .broker
            .subscribe_with_cancel(agent_id.as_str(), cancel_rx)?;
        self.registry
            .register(agent_id.clone(), self.definition.to_capability());

        let ctx = Arc::new(WorkerContext {
            agent_id: agent_id.clone(),
            executor: self.executor,
            metrics: self.metrics,
            timeout: self.config.task_timeout(),
            results: self.results,
        });
        let join = tokio::spawn(run(subscription, ctx, self.config.max_concurrent_tasks));

        info!(agent_id = %agent_id, "Worker started");
        Ok(WorkerHandle {
            agent_id,
            cancel: cancel_tx,
            join,
            registry: self.registry,
        })
    }
}

async fn run(mut subscription: Subscription, ctx: Arc<WorkerContext>, limit: usize) {
    let mut in_flight = JoinSet::new();

    loop {
        while let Some(joined) = in_flight.try_join_next() {
            log_join(&ctx.agent_id, joined);
        }
        if in_flight.len() >= limit {
            if let Some(joined) = in_flight.join_next().await {
                log_join(&ctx.agent_id, joined);
            }
            continue;
        }

        let Some(task) = subscription.recv().await else {
            break;
        };
        let ctx = ctx.clone();
        in_flight.spawn(async move { ctx.process(task).await });
    }

    while let Some(joined) = in_flight.join_next().await {
        log_join(&ctx.agent_id, joined);
    }
    info!(agent_id = %ctx.agent_id, "Worker loop finished");
}

fn log_join(agent_id: &AgentId, joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        error!(agent_id = %agent_id, error = %e, "Task execution panicked");
    }
}

/// Control handle for a started [`AgentWorker`].
pub struct WorkerHandle {
    agent_id: AgentId,
    cancel: watch::Sender<bool>,
    join: JoinHandle<()>,
    registry: Arc<CapabilityRegistry>,
}

impl WorkerHandle {
    pub fn agent_id(&self) -> &AgentId {
        &self.agent_id
    }

    /// True once the receive loop has exited, e.g. after the broker closed.
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Stop receiving, wait for in-flight executions and deregister.
    ///
    /// Tasks still buffered on the subscription are discarded.
    pub async fn shutdown(self) -> NexusResult<()> {
        self.registry.deregister(&self.agent_id);
        // Fails only when the loop already exited on its own.
        let _ = self.cancel.send(true);
        self.join.await.map_err(|e| {
            NexusError::Agent(format!("worker '{}' did not stop cleanly: {e}", self.agent_id))
        })?;
        info!(agent_id = %self.agent_id, "Worker stopped");
        Ok(())
    }
}
