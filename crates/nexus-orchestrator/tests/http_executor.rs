#![allow(clippy::unwrap_used, clippy::expect_used)]

use nexus_core::{AgentDefinition, NexusError, Task, TaskRequirement};
use nexus_orchestrator::*;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn definition(base_url: &str) -> AgentDefinition {
    serde_json::from_value(json!({
        "id": "py-agent",
        "type": "external",
        "baseURL": base_url,
        "capabilities": [{"skillPath": ["Development", "Backend", "Python"]}],
        "actions": [{
            "name": "generateCode",
            "path": "/v1/generate",
            "method": "post",
            "inputSchema": {
                "type": "object",
                "required": ["prompt"],
                "properties": {"prompt": {"type": "string"}}
            },
            "outputSchema": {
                "type": "object",
                "required": ["code"],
                "properties": {"code": {"type": "string"}}
            }
        }]
    }))
    .unwrap()
}

fn fast_policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        backoff_base_ms: 1,
        backoff_max_ms: 5,
    }
}

fn executor(base_url: &str) -> HttpExecutor {
    HttpExecutor::new(definition(base_url), &HttpExecutorConfig::default(), fast_policy(2)).unwrap()
}

fn task(payload: serde_json::Value) -> Task {
    Task::new(
        "Generate CRUD",
        TaskRequirement::new(["Development", "Backend", "Python"].as_slice(), "generateCode"),
    )
    .with_json_payload(&payload)
}

// ---------------------------------------------------------------------------
// 1. A valid payload is posted as JSON and the body comes back as output
// ---------------------------------------------------------------------------

#[tokio::test]
async fn posts_payload_and_returns_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/generate"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({"prompt": "users table"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": "def crud(): ..."})))
        .expect(1)
        .mount(&server)
        .await;

    let result = executor(&server.uri())
        .execute(&task(json!({"prompt": "users table"})))
        .await
        .unwrap();
    assert!(result.success);
    let output: serde_json::Value = serde_json::from_slice(&result.output).unwrap();
    assert_eq!(output["code"], "def crud(): ...");
}

// ---------------------------------------------------------------------------
// 2. Invalid payloads never reach the agent
// ---------------------------------------------------------------------------

#[tokio::test]
async fn invalid_payload_is_rejected_before_sending() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = executor(&server.uri())
        .execute(&task(json!({"prompt": 42})))
        .await
        .unwrap_err();
    assert!(matches!(err, NexusError::SchemaValidation(_)));
    assert!(err.to_string().contains("prompt"));
}

// ---------------------------------------------------------------------------
// 3. Error statuses, empty and non-JSON bodies are unsuccessful results
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unsuccessful_responses() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(422).set_body_string("bad spec"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let exec = executor(&server.uri());
    let t = task(json!({"prompt": "p"}));

    let first = exec.execute(&t).await.unwrap();
    assert!(!first.success);
    let msg = first.error.unwrap();
    assert!(msg.contains("422"));
    assert!(msg.contains("bad spec"));

    let second = exec.execute(&t).await.unwrap();
    assert!(!second.success);
    assert!(second.error.unwrap().contains("empty"));

    let third = exec.execute(&t).await.unwrap();
    assert!(!third.success);
    assert!(third.error.unwrap().contains("not JSON"));
}

// ---------------------------------------------------------------------------
// 4. Output-schema mismatch is logged, not fatal
// ---------------------------------------------------------------------------

#[tokio::test]
async fn output_schema_mismatch_still_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"unexpected": true})))
        .mount(&server)
        .await;

    let result = executor(&server.uri())
        .execute(&task(json!({"prompt": "p"})))
        .await
        .unwrap();
    assert!(result.success);
}

// ---------------------------------------------------------------------------
// 5. Missing payloads are generated and validated
// ---------------------------------------------------------------------------

#[tokio::test]
async fn payload_generated_from_parameters() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_json(json!({"prompt": "from params"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": "x"})))
        .expect(1)
        .mount(&server)
        .await;

    let exec = executor(&server.uri()).with_generator(Arc::new(ParametersPayloadGenerator));
    let mut t = Task::new(
        "t",
        TaskRequirement::new(["Development", "Backend", "Python"].as_slice(), "generateCode"),
    );
    t.requirements
        .parameters
        .insert("prompt".into(), json!("from params"));

    assert!(exec.execute(&t).await.unwrap().success);
}

#[tokio::test]
async fn missing_payload_without_generator_fails_validation() {
    let exec = executor("http://127.0.0.1:9");
    let t = Task::new(
        "t",
        TaskRequirement::new(["Development", "Backend", "Python"].as_slice(), "generateCode"),
    );
    assert!(matches!(
        exec.execute(&t).await.unwrap_err(),
        NexusError::SchemaValidation(_)
    ));
}

// ---------------------------------------------------------------------------
// 6. Transport errors are retried, then surfaced
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unreachable_agent_is_http_error() {
    // Grab a free port, then release it so nothing is listening.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let exec = executor(&format!("127.0.0.1:{port}"));
    let err = exec
        .execute(&task(json!({"prompt": "p"})))
        .await
        .unwrap_err();
    assert!(matches!(err, NexusError::Http(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn unknown_action_is_agent_error() {
    let exec = executor("http://127.0.0.1:9");
    let t = Task::new(
        "t",
        TaskRequirement::new(["Development"].as_slice(), "deployPreview"),
    );
    assert!(matches!(
        exec.execute(&t).await.unwrap_err(),
        NexusError::Agent(_)
    ));
}
