use crate::retry::RetryPolicy;
use async_trait::async_trait;
use nexus_core::{Action, NexusError, NexusResult, Task};
use tracing::{info, warn};

/// Produces a request body for an action from a task.
///
/// `feedback` carries the previous attempt's failure, typically a
/// field-path-qualified validation error, so the generator can correct it.
#[async_trait]
pub trait PayloadGenerator: Send + Sync {
    async fn generate(
        &self,
        task: &Task,
        action: &Action,
        feedback: Option<&NexusError>,
    ) -> NexusResult<Vec<u8>>;
}

/// Builds the payload from the requirement's `parameters` map.
#[derive(Debug, Default, Clone, Copy)]
pub struct ParametersPayloadGenerator;

#[async_trait]
impl PayloadGenerator for ParametersPayloadGenerator {
    async fn generate(
        &self,
        task: &Task,
        _action: &Action,
        _feedback: Option<&NexusError>,
    ) -> NexusResult<Vec<u8>> {
        Ok(serde_json::to_vec(&task.requirements.parameters)?)
    }
}

/// Generate a payload that passes `action`'s input schema.
///
/// Makes up to [`RetryPolicy::attempts`] tries, backing off between them
/// and feeding each failure into the next one. Schema defects such as an
/// unresolved `$ref` abort at once.
pub async fn generate_validated_payload(
    generator: &dyn PayloadGenerator,
    task: &Task,
    action: &Action,
    policy: &RetryPolicy,
) -> NexusResult<Vec<u8>> {
    let attempts = policy.attempts();
    let mut feedback: Option<NexusError> = None;

    for attempt in 0..attempts {
        if attempt > 0 {
            let delay = policy.delay(attempt - 1);
            info!(
                task_id = %task.id,
                attempt = attempt + 1,
                attempts,
                delay_ms = delay.as_millis() as u64,
                "Retrying payload generation"
            );
            tokio::time::sleep(delay).await;
        }

        let outcome = match generator.generate(task, action, feedback.as_ref()).await {
            Ok(bytes) => nexus_schema::validate_bytes(&action.input_schema, &bytes)
                .map(|_| bytes)
                .map_err(NexusError::from),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(bytes) => return Ok(bytes),
            Err(e) if e.is_config_error() => {
                warn!(task_id = %task.id, action = %action.name, error = %e, "Schema defect, not retrying");
                return Err(e);
            }
            Err(e) => {
                warn!(task_id = %task.id, attempt = attempt + 1, error = %e, "Payload rejected");
                feedback = Some(e);
            }
        }
    }

    Err(feedback.unwrap_or_else(|| {
        NexusError::Agent(format!("no payload generated for task {}", task.id))
    }))
}
