//! Routing and execution layer for Nexus.
//!
//! Wires the capability matcher to the broker and runs the agent side of the
//! pipeline: one [`AgentWorker`] per agent consumes its topic and calls the
//! agent through an [`Executor`].
//!
//! # Main types
//!
//! - [`TaskRouter`]: Match, stamp and publish a task.
//! - [`AgentWorker`] / [`WorkerHandle`]: Agent lifecycle with cancellation and join.
//! - [`HttpExecutor`]: Calls an external agent's HTTP action.
//! - [`PayloadGenerator`]: Produces request bodies, corrected via validation feedback.
//! - [`InMemoryMetrics`]: Routing and execution counters per requirement.

/// Execution collaborator boundary and the HTTP implementation.
pub mod executor;
/// Agent-definition file loading and validation.
pub mod loader;
/// Metrics sink.
pub mod metrics;
/// Payload generation with validation-driven retries.
pub mod payload;
/// Exponential backoff policy.
pub mod retry;
/// The task router.
pub mod router;
/// Agent worker lifecycle.
pub mod worker;

pub use executor::{Executor, HttpExecutor, HttpExecutorConfig};
pub use loader::{load_agent_definitions, parse_agent_definitions, validate_definition};
pub use metrics::{
    InMemoryMetrics, MetricsCollector, MetricsData, MetricsKey, REASON_BROKER_CLOSED,
    REASON_NO_MATCHING_AGENTS, REASON_PUBLISH_FAILED,
};
pub use payload::{generate_validated_payload, ParametersPayloadGenerator, PayloadGenerator};
pub use retry::RetryPolicy;
pub use router::TaskRouter;
pub use worker::{AgentWorker, WorkerConfig, WorkerHandle};
