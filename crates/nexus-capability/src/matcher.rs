use crate::registry::CapabilityRegistry;
use nexus_core::{
    segment_eq, Action, AgentCapability, AgentId, NexusError, NexusResult, SkillPath, Task,
    TaskRequirement,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Weights and cut-offs for the composite match score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatcherConfig {
    #[serde(default = "default_path_weight")]
    pub path_weight: f64,
    #[serde(default = "default_action_weight")]
    pub action_weight: f64,
    /// Candidates scoring below this are discarded.
    #[serde(default = "default_minimum_score")]
    pub minimum_score: f64,
    #[serde(default = "default_max_matches")]
    pub max_matches: usize,
}

fn default_path_weight() -> f64 {
    0.6
}
fn default_action_weight() -> f64 {
    0.4
}
fn default_minimum_score() -> f64 {
    0.7
}
fn default_max_matches() -> usize {
    5
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            path_weight: default_path_weight(),
            action_weight: default_action_weight(),
            minimum_score: default_minimum_score(),
            max_matches: default_max_matches(),
        }
    }
}

impl MatcherConfig {
    /// Reject weights outside `[0, 1]`, weights not summing to 1, a minimum
    /// score outside `[0, 1]` and a zero result cap.
    pub fn validate(&self) -> NexusResult<()> {
        let unit = 0.0..=1.0;
        if !unit.contains(&self.path_weight) || !unit.contains(&self.action_weight) {
            return Err(NexusError::Config(format!(
                "matcher weights must be within [0, 1] (path_weight={}, action_weight={})",
                self.path_weight, self.action_weight
            )));
        }
        if (self.path_weight + self.action_weight - 1.0).abs() > 1e-9 {
            return Err(NexusError::Config(format!(
                "matcher weights must sum to 1.0 (got {})",
                self.path_weight + self.action_weight
            )));
        }
        if !unit.contains(&self.minimum_score) {
            return Err(NexusError::Config(format!(
                "minimum_score must be within [0, 1] (got {})",
                self.minimum_score
            )));
        }
        if self.max_matches == 0 {
            return Err(NexusError::Config("max_matches must be at least 1".into()));
        }
        Ok(())
    }
}

/// One agent's best (capability, action) pairing against a requirement.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub agent_id: AgentId,
    /// Weighted composite in `[0, 1]`.
    pub score: f64,
    pub path_score: f64,
    pub action_score: f64,
    /// The action selected for dispatch.
    pub action: Action,
}

/// Fraction of the required path matched as a leading prefix of the
/// capability path. Zero if either path is empty.
pub fn path_score(required: &SkillPath, capability: &SkillPath) -> f64 {
    if required.is_empty() || capability.is_empty() {
        return 0.0;
    }
    required.common_prefix_len(capability) as f64 / required.len() as f64
}

/// `1.0` when the action names match case-insensitively, else `0.0`.
pub fn action_score(required: &str, action_name: &str) -> f64 {
    if segment_eq(required, action_name) {
        1.0
    } else {
        0.0
    }
}

/// Ranks registered agents against task requirements.
pub struct CapabilityMatcher {
    registry: Arc<CapabilityRegistry>,
    config: MatcherConfig,
}

impl CapabilityMatcher {
    /// Build a matcher over `registry`. Fails if `config` does not validate.
    pub fn new(registry: Arc<CapabilityRegistry>, config: MatcherConfig) -> NexusResult<Self> {
        config.validate()?;
        Ok(Self { registry, config })
    }

    /// A matcher with the default weights and thresholds.
    pub fn with_defaults(registry: Arc<CapabilityRegistry>) -> Self {
        Self {
            registry,
            config: MatcherConfig::default(),
        }
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    /// Ranked candidates for `task`'s requirement.
    pub fn find_matching_agents(&self, task: &Task) -> Vec<MatchResult> {
        self.rank(&task.requirements)
    }

    /// Score every agent against `requirement`, keep each agent's best pair,
    /// drop those under `minimum_score`, sort descending (ties by AgentID)
    /// and cap at `max_matches`.
    pub fn rank(&self, requirement: &TaskRequirement) -> Vec<MatchResult> {
        let mut results: Vec<MatchResult> = self.registry.scan(|agents| {
            agents
                .values()
                .filter_map(|agent| {
                    let best = self.best_pair(requirement, &agent.agent_id, agent)?;
                    (best.score >= self.config.minimum_score).then_some(best)
                })
                .collect()
        });

        results.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.agent_id.cmp(&b.agent_id))
        });
        results.truncate(self.config.max_matches);

        debug!(
            skill_path = %requirement.skill_path,
            action = %requirement.action,
            candidates = results.len(),
            top = results.first().map(|r| r.agent_id.as_str()).unwrap_or("-"),
            "Ranked agents"
        );
        results
    }

    fn best_pair(
        &self,
        requirement: &TaskRequirement,
        agent_id: &AgentId,
        agent: &AgentCapability,
    ) -> Option<MatchResult> {
        let mut best: Option<MatchResult> = None;
        for capability in &agent.capabilities {
            let p = path_score(&requirement.skill_path, &capability.skill_path);
            for action in &agent.actions {
                let a = action_score(&requirement.action, &action.name);
                let score = p * self.config.path_weight + a * self.config.action_weight;
                let better = match &best {
                    None => true,
                    Some(current) => score > current.score,
                };
                if better {
                    best = Some(MatchResult {
                        agent_id: agent_id.clone(),
                        score,
                        path_score: p,
                        action_score: a,
                        action: action.clone(),
                    });
                }
            }
        }
        best
    }
}
