use nexus_core::{AgentCapability, AgentId, Capability, SkillPath, TaskRequirement};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info};

/// Concurrent store of what every registered agent can do, keyed by AgentID.
///
/// Writes take the exclusive lock for a single map operation, so readers
/// always observe complete entries. Nothing here performs I/O while a lock
/// is held.
pub struct CapabilityRegistry {
    agents: RwLock<HashMap<AgentId, AgentCapability>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self {
            agents: RwLock::new(HashMap::new()),
        }
    }

    /// Insert or replace the entry for `agent_id`.
    ///
    /// The stored entry always carries `agent_id` as its key, even if the
    /// capability value was built for a different id.
    pub fn register(&self, agent_id: impl Into<AgentId>, mut capability: AgentCapability) {
        let agent_id = agent_id.into();
        capability.agent_id = agent_id.clone();
        let skills = capability.capabilities.len();
        let actions = capability.actions.len();
        let replaced = self
            .agents
            .write()
            .insert(agent_id.clone(), capability)
            .is_some();
        info!(agent_id = %agent_id, skills, actions, replaced, "Registered agent");
    }

    /// Register a capability-only entry for a workflow. Workflows expose no
    /// actions, so they never satisfy an action requirement.
    pub fn register_workflow(
        &self,
        workflow_id: impl Into<AgentId>,
        capabilities: Vec<Capability>,
        resources: HashMap<String, i64>,
    ) {
        let workflow_id = workflow_id.into();
        let entry = AgentCapability {
            agent_id: workflow_id.clone(),
            capabilities,
            actions: Vec::new(),
            resources,
        };
        self.register(workflow_id, entry);
    }

    /// Remove an entry, returning it if it was present.
    pub fn deregister(&self, agent_id: &AgentId) -> Option<AgentCapability> {
        let removed = self.agents.write().remove(agent_id);
        if removed.is_some() {
            info!(agent_id = %agent_id, "Deregistered agent");
        }
        removed
    }

    /// Snapshot of one entry.
    pub fn get(&self, agent_id: &AgentId) -> Option<AgentCapability> {
        self.agents.read().get(agent_id).cloned()
    }

    /// Coarse, unscored filter: agents holding a capability whose path
    /// begins with the required path and an action with the required name.
    ///
    /// A required path longer than every capability path of an agent never
    /// matches it. Results are sorted by AgentID.
    pub fn find_matching_agents(&self, requirement: &TaskRequirement) -> Vec<AgentId> {
        let agents = self.agents.read();
        let mut matched: Vec<AgentId> = agents
            .values()
            .filter(|agent| {
                let path_ok = !requirement.skill_path.is_empty()
                    && agent
                        .capabilities
                        .iter()
                        .any(|c| requirement.skill_path.is_prefix_of(&c.skill_path));
                path_ok && agent.action(&requirement.action).is_some()
            })
            .map(|agent| agent.agent_id.clone())
            .collect();
        drop(agents);

        matched.sort();
        debug!(
            skill_path = %requirement.skill_path,
            action = %requirement.action,
            matched = matched.len(),
            "Coarse capability filter"
        );
        matched
    }

    /// Every agent with at least one skill-path segment containing `needle`
    /// (case-sensitive). Sorted by AgentID.
    pub fn capabilities_by_skill(&self, needle: &str) -> Vec<AgentCapability> {
        let mut found: Vec<AgentCapability> = self
            .agents
            .read()
            .values()
            .filter(|agent| {
                agent.capabilities.iter().any(|c| {
                    c.skill_path
                        .segments()
                        .iter()
                        .any(|segment| segment.contains(needle))
                })
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        found
    }

    /// Deduplicated listing of every level-1 and level-1 --> level-2 skill
    /// path, e.g. `[Development] [Development --> Backend]`.
    ///
    /// All level-1 entries come first, each group sorted.
    pub fn top_level_capabilities(&self) -> String {
        let mut level1 = BTreeSet::new();
        let mut level2 = BTreeSet::new();
        {
            let agents = self.agents.read();
            for capability in agents.values().flat_map(|a| &a.capabilities) {
                let segments = capability.skill_path.segments();
                if let Some(first) = segments.first() {
                    level1.insert(first.clone());
                }
                if segments.len() >= 2 {
                    level2.insert(SkillPath::new(segments[..2].iter().cloned()).to_string());
                }
            }
        }

        level1
            .iter()
            .chain(&level2)
            .map(|entry| format!("[{entry}]"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Snapshot of every entry, sorted by AgentID.
    pub fn all(&self) -> Vec<AgentCapability> {
        let mut entries: Vec<AgentCapability> = self.agents.read().values().cloned().collect();
        entries.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        entries
    }

    /// Registered AgentIDs, sorted.
    pub fn agent_ids(&self) -> Vec<AgentId> {
        let mut ids: Vec<AgentId> = self.agents.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.agents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.read().is_empty()
    }

    /// Run `f` over the whole map under one shared lock.
    pub(crate) fn scan<R>(&self, f: impl FnOnce(&HashMap<AgentId, AgentCapability>) -> R) -> R {
        f(&self.agents.read())
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use nexus_core::Action;

    fn agent(id: &str, path: &[&str], action: &str) -> AgentCapability {
        AgentCapability::new(id)
            .with_capability(Capability::new(path))
            .with_action(Action::new(action))
    }

    #[test]
    fn test_register_and_get() {
        let registry = CapabilityRegistry::new();
        assert!(registry.is_empty());
        registry.register(
            "py-agent",
            agent("py-agent", &["Development", "Backend", "Python"], "generateCode"),
        );
        let entry = registry.get(&AgentId::from("py-agent")).unwrap();
        assert_eq!(entry.actions[0].name, "generateCode");
        assert!(registry.get(&AgentId::from("nobody")).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_is_upsert() {
        let registry = CapabilityRegistry::new();
        registry.register("a", agent("a", &["Development"], "first"));
        registry.register("a", agent("a", &["Operations"], "second"));
        assert_eq!(registry.len(), 1);
        let entry = registry.get(&AgentId::from("a")).unwrap();
        assert_eq!(entry.actions.len(), 1);
        assert_eq!(entry.actions[0].name, "second");
    }

    #[test]
    fn test_register_stamps_key_into_entry() {
        let registry = CapabilityRegistry::new();
        registry.register("real-id", agent("other-id", &["X"], "y"));
        assert_eq!(
            registry.get(&AgentId::from("real-id")).unwrap().agent_id,
            AgentId::from("real-id")
        );
    }

    #[test]
    fn test_deregister() {
        let registry = CapabilityRegistry::new();
        registry.register("a", agent("a", &["X"], "y"));
        assert!(registry.deregister(&AgentId::from("a")).is_some());
        assert!(registry.deregister(&AgentId::from("a")).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_coarse_filter() {
        let registry = CapabilityRegistry::new();
        registry.register(
            "py",
            agent("py", &["Development", "Backend", "Python"], "generateCode"),
        );
        registry.register("go", agent("go", &["Development", "Backend", "Go"], "generateCode"));
        registry.register("ops", agent("ops", &["Operations"], "deploy"));

        let req = TaskRequirement::new(["development", "backend"].as_slice(), "GenerateCode");
        assert_eq!(
            registry.find_matching_agents(&req),
            vec![AgentId::from("go"), AgentId::from("py")]
        );

        let too_specific = TaskRequirement::new(
            ["Development", "Backend", "Python", "CodeGeneration"].as_slice(),
            "generateCode",
        );
        assert!(registry.find_matching_agents(&too_specific).is_empty());

        let wrong_action =
            TaskRequirement::new(["Development", "Backend", "Python"].as_slice(), "deployPreview");
        assert!(registry.find_matching_agents(&wrong_action).is_empty());
    }

    #[test]
    fn test_workflow_never_matches_actions() {
        let registry = CapabilityRegistry::new();
        registry.register_workflow(
            "wf-release",
            vec![Capability::new(["Operations", "Release"].as_slice())],
            HashMap::from([("cpu".to_string(), 2)]),
        );
        let req = TaskRequirement::new(["Operations", "Release"].as_slice(), "run");
        assert!(registry.find_matching_agents(&req).is_empty());
        assert_eq!(
            registry.get(&AgentId::from("wf-release")).unwrap().resources["cpu"],
            2
        );
    }

    #[test]
    fn test_capabilities_by_skill_is_case_sensitive_substring() {
        let registry = CapabilityRegistry::new();
        registry.register("py", agent("py", &["Development", "Backend", "Python"], "gen"));
        registry.register("docs", agent("docs", &["Writing", "TechDocs"], "write"));

        let hits = registry.capabilities_by_skill("Back");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].agent_id.as_str(), "py");
        assert!(registry.capabilities_by_skill("back").is_empty());
        assert_eq!(registry.capabilities_by_skill("o").len(), 2);
    }

    #[test]
    fn test_top_level_capabilities_format() {
        let registry = CapabilityRegistry::new();
        registry.register("py", agent("py", &["Development", "Backend", "Python"], "gen"));
        registry.register("go", agent("go", &["Development", "Backend", "Go"], "gen"));
        registry.register("fe", agent("fe", &["Development", "Frontend"], "gen"));
        registry.register("ops", agent("ops", &["Operations"], "deploy"));

        assert_eq!(
            registry.top_level_capabilities(),
            "[Development] [Operations] [Development --> Backend] [Development --> Frontend]"
        );
        assert_eq!(CapabilityRegistry::new().top_level_capabilities(), "");
    }

    #[test]
    fn test_all_and_ids_sorted() {
        let registry = CapabilityRegistry::new();
        for id in ["c", "a", "b"] {
            registry.register(id, agent(id, &["X"], "y"));
        }
        let ids: Vec<String> = registry
            .all()
            .into_iter()
            .map(|a| a.agent_id.to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(
            registry.agent_ids(),
            vec![AgentId::from("a"), AgentId::from("b"), AgentId::from("c")]
        );
    }
}
