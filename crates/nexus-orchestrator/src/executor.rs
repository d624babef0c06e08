use crate::payload::{generate_validated_payload, PayloadGenerator};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use nexus_core::{segment_eq, Action, AgentDefinition, NexusError, NexusResult, Task, TaskResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Runs a dispatched task to completion.
///
/// `Err` means the task could not be attempted at all (no such action,
/// payload rejected, transport down). A remote failure is an `Ok` result
/// with `success == false`.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, task: &Task) -> NexusResult<TaskResult>;
}

/// Settings for [`HttpExecutor`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpExecutorConfig {
    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for HttpExecutorConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Calls an external agent's HTTP actions.
pub struct HttpExecutor {
    definition: AgentDefinition,
    client: reqwest::Client,
    policy: RetryPolicy,
    generator: Option<Arc<dyn PayloadGenerator>>,
}

impl HttpExecutor {
    pub fn new(
        definition: AgentDefinition,
        config: &HttpExecutorConfig,
        policy: RetryPolicy,
    ) -> NexusResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(concat!("nexus/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| NexusError::Http(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            definition,
            client,
            policy,
            generator: None,
        })
    }

    /// Generate payloads for tasks that arrive without one.
    pub fn with_generator(mut self, generator: Arc<dyn PayloadGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn definition(&self) -> &AgentDefinition {
        &self.definition
    }

    /// Full URL for `action`.
    pub fn endpoint(&self, action: &Action) -> String {
        let base = self.definition.base_url_for(action).trim_end_matches('/');
        let base = if base.contains("://") {
            base.to_string()
        } else {
            format!("http://{base}")
        };
        let path = action.path.trim_start_matches('/');
        if path.is_empty() {
            base
        } else {
            format!("{base}/{path}")
        }
    }

    fn find_action(&self, name: &str) -> NexusResult<&Action> {
        self.definition
            .actions
            .iter()
            .find(|a| segment_eq(&a.name, name))
            .ok_or_else(|| {
                NexusError::Agent(format!(
                    "agent '{}' has no action '{name}'",
                    self.definition.id
                ))
            })
    }

    async fn resolve_payload(&self, task: &Task, action: &Action) -> NexusResult<Vec<u8>> {
        if !task.payload.is_empty() {
            nexus_schema::validate_bytes(&action.input_schema, &task.payload)?;
            return Ok(task.payload.clone());
        }
        match &self.generator {
            Some(generator) => {
                generate_validated_payload(generator.as_ref(), task, action, &self.policy).await
            }
            None => {
                let empty = b"{}".to_vec();
                nexus_schema::validate_bytes(&action.input_schema, &empty)?;
                Ok(empty)
            }
        }
    }

    async fn send(
        &self,
        method: reqwest::Method,
        url: &str,
        body: Vec<u8>,
    ) -> NexusResult<reqwest::Response> {
        let attempts = self.policy.attempts();
        let mut last_err = None;
        for attempt in 0..attempts {
            let request = self
                .client
                .request(method.clone(), url)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body.clone());
            match request.send().await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    if attempt + 1 < attempts {
                        let delay = self.policy.backoff_ms(attempt);
                        info!(url, attempt, delay_ms = delay, error = %e, "Request failed, backing off");
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                    }
                    last_err = Some(e);
                }
            }
        }
        Err(NexusError::Http(match last_err {
            Some(e) => format!("request to {url} failed: {e}"),
            None => format!("request to {url} was never attempted"),
        }))
    }
}

#[async_trait]
impl Executor for HttpExecutor {
    async fn execute(&self, task: &Task) -> NexusResult<TaskResult> {
        let action = self.find_action(&task.requirements.action)?;
        let payload = self.resolve_payload(task, action).await?;

        let method_name = if action.method.is_empty() {
            "POST".to_string()
        } else {
            action.method.to_uppercase()
        };
        let method = reqwest::Method::from_bytes(method_name.as_bytes()).map_err(|e| {
            NexusError::Config(format!("action '{}' has invalid method: {e}", action.name))
        })?;
        let url = self.endpoint(action);
        debug!(task_id = %task.id, %url, method = %method, bytes = payload.len(), "Dispatching task");

        let response = self.send(method, &url, payload).await?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| NexusError::Http(format!("reading response from {url}: {e}")))?;

        if !status.is_success() {
            let text = String::from_utf8_lossy(&body);
            warn!(task_id = %task.id, %url, status = status.as_u16(), "Agent returned error status");
            return Ok(TaskResult::failure(
                &task.id,
                format!("agent returned {status}: {text}"),
            ));
        }
        if body.is_empty() {
            return Ok(TaskResult::failure(&task.id, "agent returned an empty body"));
        }
        let value: serde_json::Value = match serde_json::from_slice(&body) {
            Ok(value) => value,
            Err(e) => {
                return Ok(TaskResult::failure(
                    &task.id,
                    format!("agent response is not JSON: {e}"),
                ))
            }
        };

        if !action.output_schema.is_unconstrained() {
            if let Err(e) = nexus_schema::validate(&action.output_schema, &value) {
                warn!(task_id = %task.id, action = %action.name, error = %e, "Response does not match output schema");
            }
        }

        info!(task_id = %task.id, action = %action.name, "Task executed");
        Ok(TaskResult::success(&task.id, body.to_vec()))
    }
}
