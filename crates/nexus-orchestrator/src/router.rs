use crate::metrics::{
    MetricsCollector, REASON_BROKER_CLOSED, REASON_NO_MATCHING_AGENTS, REASON_PUBLISH_FAILED,
};
use nexus_broker::Broker;
use nexus_capability::{CapabilityMatcher, MatchResult};
use nexus_core::{NexusError, NexusResult, Task, TaskStatus};
use std::sync::Arc;
use tracing::{info, warn};

/// Matches a task to its best agent and publishes it on that agent's topic.
pub struct TaskRouter {
    matcher: Arc<CapabilityMatcher>,
    broker: Arc<dyn Broker>,
    metrics: Arc<dyn MetricsCollector>,
}

impl TaskRouter {
    pub fn new(
        matcher: Arc<CapabilityMatcher>,
        broker: Arc<dyn Broker>,
        metrics: Arc<dyn MetricsCollector>,
    ) -> Self {
        Self {
            matcher,
            broker,
            metrics,
        }
    }

    pub fn matcher(&self) -> &Arc<CapabilityMatcher> {
        &self.matcher
    }

    /// Route `task` to the top-ranked agent.
    ///
    /// On success the task is stamped `pending` and the winning match is
    /// returned. Every outcome is recorded against the task's requirement.
    pub fn route_task(&self, task: &mut Task) -> NexusResult<MatchResult> {
        let requirement = &task.requirements;

        if self.broker.is_closed() {
            self.metrics
                .record_routing_failure(requirement, REASON_BROKER_CLOSED);
            warn!(task_id = %task.id, "Routing refused, broker is closed");
            return Err(NexusError::BrokerClosed);
        }

        let Some(best) = self.matcher.find_matching_agents(task).into_iter().next() else {
            self.metrics
                .record_routing_failure(requirement, REASON_NO_MATCHING_AGENTS);
            warn!(
                task_id = %task.id,
                skill_path = %requirement.skill_path,
                action = %requirement.action,
                "No capable agent"
            );
            return Err(NexusError::NoCapableAgent {
                skill_path: requirement.skill_path.dotted(),
                action: requirement.action.clone(),
            });
        };

        task.set_status(TaskStatus::Pending);
        let topic = best.agent_id.as_str();

        match self.broker.publish(topic, task) {
            Ok(delivery) => {
                if delivery.is_empty() {
                    warn!(
                        task_id = %task.id,
                        agent_id = %best.agent_id,
                        dropped = delivery.dropped,
                        "Task published but no subscriber took it"
                    );
                }
                self.metrics
                    .record_routing_success(&task.requirements, &best.agent_id);
                info!(
                    task_id = %task.id,
                    agent_id = %best.agent_id,
                    action = %best.action.name,
                    score = best.score,
                    "Task routed"
                );
                Ok(best)
            }
            Err(NexusError::BrokerClosed) => {
                self.metrics
                    .record_routing_failure(&task.requirements, REASON_BROKER_CLOSED);
                Err(NexusError::BrokerClosed)
            }
            Err(e) => {
                self.metrics
                    .record_routing_failure(&task.requirements, REASON_PUBLISH_FAILED);
                warn!(task_id = %task.id, topic, error = %e, "Publish failed");
                Err(NexusError::PublishFailed {
                    topic: topic.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }
}
