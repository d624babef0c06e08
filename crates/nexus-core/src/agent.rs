use crate::schema::SchemaConfig;
use crate::skill::SkillPath;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Identifier of an agent. Doubles as the broker topic the agent listens on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    /// Wrap an identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice (also the agent's topic name).
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for AgentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A point in the skill taxonomy an agent declares it can work at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capability {
    pub skill_path: SkillPath,
    /// Free-text tier label, e.g. `"expert"`.
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Capability {
    /// A capability at `skill_path` with an empty level and no metadata.
    pub fn new(skill_path: impl Into<SkillPath>) -> Self {
        Self {
            skill_path: skill_path.into(),
            level: String::new(),
            metadata: HashMap::new(),
        }
    }

    /// Set the tier label.
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }
}

/// One invocable operation an agent exposes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub name: String,
    /// Per-action override of the agent's base URL.
    #[serde(rename = "baseURL", default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub action_type: Option<String>,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub input_schema: SchemaConfig,
    #[serde(default)]
    pub output_schema: SchemaConfig,
}

impl Action {
    /// An action with the given name, a `POST` method and no schema constraints.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            method: "POST".to_string(),
            ..Self::default()
        }
    }

    /// Set the HTTP path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set the HTTP method.
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    /// Set the input contract.
    pub fn with_input_schema(mut self, schema: SchemaConfig) -> Self {
        self.input_schema = schema;
        self
    }

    /// Set the output contract.
    pub fn with_output_schema(mut self, schema: SchemaConfig) -> Self {
        self.output_schema = schema;
        self
    }
}

/// Registry entry: everything an agent declared at registration time.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AgentCapability {
    #[serde(rename = "AgentID")]
    pub agent_id: AgentId,
    #[serde(default)]
    pub capabilities: Vec<Capability>,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default)]
    pub resources: HashMap<String, i64>,
}

impl AgentCapability {
    /// An entry for `agent_id` with nothing declared yet.
    pub fn new(agent_id: impl Into<AgentId>) -> Self {
        Self {
            agent_id: agent_id.into(),
            ..Self::default()
        }
    }

    /// Append a capability.
    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.push(capability);
        self
    }

    /// Append an action.
    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    /// Declare a resource quantity.
    pub fn with_resource(mut self, name: impl Into<String>, quantity: i64) -> Self {
        self.resources.insert(name.into(), quantity);
        self
    }

    /// Look up an action by name, case-insensitively.
    pub fn action(&self, name: &str) -> Option<&Action> {
        self.actions
            .iter()
            .find(|a| crate::skill::segment_eq(&a.name, name))
    }
}

/// External agent declaration as supplied by the agent-definition store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDefinition {
    pub id: String,
    #[serde(rename = "type", default)]
    pub agent_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "baseURL", default)]
    pub base_url: String,
    #[serde(default)]
    pub capabilities: Vec<Capability>,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub resources: HashMap<String, i64>,
}

impl AgentDefinition {
    /// Typed identifier of this agent.
    pub fn agent_id(&self) -> AgentId {
        AgentId::new(self.id.clone())
    }

    /// The registry entry this definition registers as.
    pub fn to_capability(&self) -> AgentCapability {
        AgentCapability {
            agent_id: self.agent_id(),
            capabilities: self.capabilities.clone(),
            actions: self.actions.clone(),
            resources: self.resources.clone(),
        }
    }

    /// Base URL for `action`, preferring the action's own override.
    pub fn base_url_for<'a>(&'a self, action: &'a Action) -> &'a str {
        action
            .base_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .unwrap_or(&self.base_url)
    }
}

/// The file shape agent definitions are loaded from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub agents: Vec<AgentDefinition>,
}
