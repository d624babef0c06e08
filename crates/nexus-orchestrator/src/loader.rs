use nexus_core::{AgentConfig, AgentDefinition, NexusError, NexusResult, SchemaConfig};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

/// Read and validate agent definitions from a JSON file shaped
/// `{"agents": [...]}`.
pub fn load_agent_definitions(path: impl AsRef<Path>) -> NexusResult<Vec<AgentDefinition>> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|e| {
        NexusError::Config(format!("cannot read agent definitions {}: {e}", path.display()))
    })?;
    let agents = parse_agent_definitions(&raw)?;
    info!(path = %path.display(), agents = agents.len(), "Loaded agent definitions");
    Ok(agents)
}

/// Parse and validate agent definitions from a JSON string.
pub fn parse_agent_definitions(raw: &str) -> NexusResult<Vec<AgentDefinition>> {
    let config: AgentConfig = serde_json::from_str(raw)?;
    let mut seen = HashSet::new();
    for definition in &config.agents {
        validate_definition(definition)?;
        if !seen.insert(definition.id.as_str()) {
            return Err(NexusError::Config(format!(
                "duplicate agent id '{}'",
                definition.id
            )));
        }
    }
    Ok(config.agents)
}

/// Check one definition for the fields dispatch relies on and for
/// unresolvable `$ref`s in its schemas.
pub fn validate_definition(definition: &AgentDefinition) -> NexusResult<()> {
    if definition.id.trim().is_empty() {
        return Err(NexusError::Config("agent definition without id".into()));
    }
    let id = &definition.id;

    for action in &definition.actions {
        if action.name.trim().is_empty() {
            return Err(NexusError::Config(format!("agent '{id}' has an unnamed action")));
        }
        let name = &action.name;
        if definition.base_url_for(action).trim().is_empty() {
            return Err(NexusError::Config(format!(
                "agent '{id}' action '{name}' has no base URL"
            )));
        }
        if action.path.trim().is_empty() {
            return Err(NexusError::Config(format!(
                "agent '{id}' action '{name}' has no path"
            )));
        }
        if action.method.trim().is_empty() {
            return Err(NexusError::Config(format!(
                "agent '{id}' action '{name}' has no method"
            )));
        }
        check_schema(id, name, "input", &action.input_schema)?;
        check_schema(id, name, "output", &action.output_schema)?;
    }
    Ok(())
}

fn check_schema(agent: &str, action: &str, side: &str, schema: &SchemaConfig) -> NexusResult<()> {
    nexus_schema::check_refs(schema).map_err(|e| {
        NexusError::UnresolvedSchemaRef(format!("agent '{agent}' action '{action}' {side} schema: {e}"))
    })
}
