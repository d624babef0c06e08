#![allow(clippy::unwrap_used, clippy::expect_used)]

use nexus_core::*;

// ---------------------------------------------------------------------------
// 1. Task serialization roundtrip keeps the wire contract
// ---------------------------------------------------------------------------

#[test]
fn task_serialization_roundtrip() {
    let mut req = TaskRequirement::new(
        SkillPath::new(["Development", "Backend", "Python", "CodeGeneration"]),
        "generateCode",
    );
    req.parameters
        .insert("framework".to_string(), serde_json::json!("fastapi"));
    let task = Task::new("Generate CRUD endpoints", req)
        .with_description("Users table, FastAPI")
        .with_json_payload(&serde_json::json!({"prompt": "crud"}));

    let json = serde_json::to_string(&task).unwrap();
    let back: Task = serde_json::from_str(&json).unwrap();

    assert_eq!(back, task);
    assert_eq!(
        back.requirements.parameters.get("framework"),
        Some(&serde_json::json!("fastapi"))
    );
    let raw: serde_json::Value = serde_json::from_str(&json).unwrap();
    for key in [
        "id",
        "type",
        "title",
        "description",
        "requirements",
        "payload",
        "status",
        "retryCount",
        "createdAt",
        "updatedAt",
    ] {
        assert!(raw.get(key).is_some(), "missing wire field {key}");
    }
}

// ---------------------------------------------------------------------------
// 2. Agent definitions load from the agent-store file shape
// ---------------------------------------------------------------------------

#[test]
fn agent_config_file_shape() {
    let raw = r##"{
        "agents": [
            {
                "id": "py-agent",
                "type": "external",
                "description": "Python agent",
                "baseURL": "http://localhost:9200",
                "capabilities": [
                    {"skillPath": ["Development", "Backend", "Python"], "level": "domain", "metadata": {}}
                ],
                "actions": [
                    {
                        "name": "generateCode",
                        "path": "/v1/generate",
                        "method": "POST",
                        "inputSchema": {
                            "type": "object",
                            "required": ["spec"],
                            "properties": {"spec": {"$ref": "#/$defs/Spec"}},
                            "$defs": {"Spec": {"type": "object", "properties": {"lang": {"type": "string"}}}}
                        },
                        "outputSchema": {"type": "object"}
                    }
                ]
            }
        ]
    }"##;
    let config: AgentConfig = serde_json::from_str(raw).unwrap();
    assert_eq!(config.agents.len(), 1);
    let cap = config.agents[0].to_capability();
    assert_eq!(cap.agent_id.as_str(), "py-agent");
    assert_eq!(cap.capabilities[0].level, "domain");
    let action = cap.action("generateCode").unwrap();
    assert!(action.input_schema.defs.contains_key("Spec"));
}

// ---------------------------------------------------------------------------
// 3. Error display carries the routing requirement
// ---------------------------------------------------------------------------

#[test]
fn error_display_and_from_impls() {
    let err = NexusError::NoCapableAgent {
        skill_path: "Development.Backend".into(),
        action: "deployPreview".into(),
    };
    assert_eq!(
        err.to_string(),
        "No capable agent for skill path [Development.Backend] and action 'deployPreview'"
    );

    let closed = NexusError::BrokerClosed;
    assert_eq!(closed.to_string(), "Broker is closed");

    let json_err: NexusError = serde_json::from_str::<Task>("not json").unwrap_err().into();
    assert!(matches!(json_err, NexusError::Json(_)));

    let io_err: NexusError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
    assert!(io_err.to_string().starts_with("IO error"));
}
