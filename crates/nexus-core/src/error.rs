use thiserror::Error;

/// A convenience `Result` alias using [`NexusError`].
pub type NexusResult<T> = Result<T, NexusError>;

/// Top-level error type for the Nexus framework.
///
/// Every failure the routing pipeline can produce is returned as a value of
/// this enum so the caller can choose between retrying, escalating or
/// dropping the task.
#[derive(Error, Debug)]
pub enum NexusError {
    /// The matcher produced no candidate above the minimum score.
    #[error("No capable agent for skill path [{skill_path}] and action '{action}'")]
    NoCapableAgent {
        /// Dot-joined skill path that was requested.
        skill_path: String,
        /// Action name that was requested.
        action: String,
    },

    /// The broker refused a publish.
    #[error("Publish to topic '{topic}' failed: {reason}")]
    PublishFailed {
        /// Topic the task was addressed to.
        topic: String,
        /// Broker-supplied reason.
        reason: String,
    },

    /// A payload does not conform to its schema. The message is field-path qualified.
    #[error("Schema validation failed: {0}")]
    SchemaValidation(String),

    /// A `$ref` in an agent-authored schema points at a missing definition.
    #[error("Unresolved schema reference: {0}")]
    UnresolvedSchemaRef(String),

    /// The broker has been shut down.
    #[error("Broker is closed")]
    BrokerClosed,

    /// The (topic, subscription) pair is not registered with the broker.
    #[error("Subscription {id} not found on topic '{topic}'")]
    SubscriptionNotFound {
        /// Topic that was searched.
        topic: String,
        /// Subscription identifier that was searched for.
        id: u64,
    },

    /// Invalid configuration or agent definition.
    #[error("Config error: {0}")]
    Config(String),

    /// An error raised while an agent executes a task.
    #[error("Agent error: {0}")]
    Agent(String),

    /// An error from an outbound HTTP call to an agent.
    #[error("HTTP error: {0}")]
    Http(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl NexusError {
    /// Whether retrying the same operation later can reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            NexusError::PublishFailed { .. }
                | NexusError::SchemaValidation(_)
                | NexusError::Http(_)
                | NexusError::NoCapableAgent { .. }
        )
    }

    /// Whether the error stems from operator-authored configuration and
    /// should be surfaced instead of retried.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            NexusError::UnresolvedSchemaRef(_) | NexusError::Config(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_capable_agent_mentions_requirement() {
        let err = NexusError::NoCapableAgent {
            skill_path: "Development.Backend.Python".into(),
            action: "deployPreview".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Development.Backend.Python"));
        assert!(msg.contains("deployPreview"));
    }

    #[test]
    fn test_classification() {
        assert!(NexusError::SchemaValidation("x".into()).is_retryable());
        assert!(!NexusError::SchemaValidation("x".into()).is_config_error());
        assert!(NexusError::UnresolvedSchemaRef("#/$defs/A".into()).is_config_error());
        assert!(!NexusError::UnresolvedSchemaRef("#/$defs/A".into()).is_retryable());
        assert!(!NexusError::BrokerClosed.is_retryable());
    }
}
