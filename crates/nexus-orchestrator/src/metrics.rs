use chrono::{DateTime, Utc};
use nexus_core::{AgentId, TaskRequirement};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

/// Routing failure reason: the matcher returned no candidate.
pub const REASON_NO_MATCHING_AGENTS: &str = "no_matching_agents";
/// Routing failure reason: the broker refused the publish.
pub const REASON_PUBLISH_FAILED: &str = "publish_failed";
/// Routing failure reason: the broker was already shut down.
pub const REASON_BROKER_CLOSED: &str = "broker_closed";

/// Aggregation key: dot-joined skill path plus action name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MetricsKey {
    pub skill_path: String,
    pub action: String,
}

impl MetricsKey {
    pub fn from_requirement(requirement: &TaskRequirement) -> Self {
        Self {
            skill_path: requirement.skill_path.dotted(),
            action: requirement.action.clone(),
        }
    }
}

/// Counters and timings for one [`MetricsKey`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsData {
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub routing_successes: u64,
    pub routing_failures: u64,
    /// Routing failures broken down by reason.
    pub failure_reasons: BTreeMap<String, u64>,
    pub last_error: Option<String>,
    pub last_error_time: Option<DateTime<Utc>>,
    /// Agent the last successful routing went to.
    pub last_agent: Option<AgentId>,
    /// Completions that had a recorded start and therefore a duration.
    pub timed_tasks: u64,
    pub total_processing_ms: u64,
    pub average_processing_ms: u64,
}

/// Sink for routing and execution counters.
///
/// Implementations are shared between the router and every worker, so all
/// methods take `&self`.
pub trait MetricsCollector: Send + Sync {
    /// Start the processing clock for `task_id`.
    fn record_task_start(&self, task_id: &str);
    /// Count a completion and, if a start was recorded, its duration.
    fn record_task_complete(&self, requirement: &TaskRequirement, task_id: &str);
    fn record_task_error(&self, requirement: &TaskRequirement, task_id: &str, error: &str);
    fn record_routing_success(&self, requirement: &TaskRequirement, agent_id: &AgentId);
    fn record_routing_failure(&self, requirement: &TaskRequirement, reason: &str);
    /// Snapshot for one requirement.
    fn get(&self, requirement: &TaskRequirement) -> Option<MetricsData>;
    /// Snapshot of everything.
    fn all(&self) -> HashMap<MetricsKey, MetricsData>;
    fn reset(&self);
}

#[derive(Default)]
struct MetricsState {
    data: HashMap<MetricsKey, MetricsData>,
    started: HashMap<String, Instant>,
}

impl MetricsState {
    fn entry(&mut self, requirement: &TaskRequirement) -> &mut MetricsData {
        self.data
            .entry(MetricsKey::from_requirement(requirement))
            .or_default()
    }
}

/// Process-local [`MetricsCollector`].
#[derive(Default)]
pub struct InMemoryMetrics {
    state: RwLock<MetricsState>,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tasks started but not yet completed or failed.
    pub fn in_flight(&self) -> usize {
        self.state.read().started.len()
    }
}

impl MetricsCollector for InMemoryMetrics {
    fn record_task_start(&self, task_id: &str) {
        self.state
            .write()
            .started
            .insert(task_id.to_string(), Instant::now());
    }

    fn record_task_complete(&self, requirement: &TaskRequirement, task_id: &str) {
        let mut state = self.state.write();
        let started = state.started.remove(task_id);
        let data = state.entry(requirement);
        data.tasks_completed += 1;
        if let Some(started) = started {
            let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
            data.timed_tasks += 1;
            data.total_processing_ms = data.total_processing_ms.saturating_add(elapsed);
            data.average_processing_ms = data.total_processing_ms / data.timed_tasks;
        }
    }

    fn record_task_error(&self, requirement: &TaskRequirement, task_id: &str, error: &str) {
        let mut state = self.state.write();
        state.started.remove(task_id);
        let data = state.entry(requirement);
        data.tasks_failed += 1;
        data.last_error = Some(error.to_string());
        data.last_error_time = Some(Utc::now());
    }

    fn record_routing_success(&self, requirement: &TaskRequirement, agent_id: &AgentId) {
        let mut state = self.state.write();
        let data = state.entry(requirement);
        data.routing_successes += 1;
        data.last_agent = Some(agent_id.clone());
    }

    fn record_routing_failure(&self, requirement: &TaskRequirement, reason: &str) {
        let mut state = self.state.write();
        let data = state.entry(requirement);
        data.routing_failures += 1;
        *data.failure_reasons.entry(reason.to_string()).or_default() += 1;
    }

    fn get(&self, requirement: &TaskRequirement) -> Option<MetricsData> {
        self.state
            .read()
            .data
            .get(&MetricsKey::from_requirement(requirement))
            .cloned()
    }

    fn all(&self) -> HashMap<MetricsKey, MetricsData> {
        self.state.read().data.clone()
    }

    fn reset(&self) {
        *self.state.write() = MetricsState::default();
    }
}
