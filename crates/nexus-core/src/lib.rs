//! Core types and error definitions for the Nexus task routing framework.
//!
//! This crate holds the data model shared by every other Nexus crate: the
//! skill taxonomy, agent declarations, tasks, schema descriptions and the
//! unified error enum.
//!
//! # Main types
//!
//! - [`NexusError`]: Unified error enum for the routing pipeline.
//! - [`NexusResult`]: Convenience alias for `Result<T, NexusError>`.
//! - [`SkillPath`]: Hierarchical, case-insensitive taxonomy path.
//! - [`AgentCapability`]: What one agent can do; the registry's unit of storage.
//! - [`Task`] / [`TaskRequirement`]: A unit of work and what it needs.
//! - [`SchemaConfig`] / [`Property`]: Action input/output contracts.

/// Agent identifiers, capabilities, actions and definitions.
pub mod agent;
/// Error types.
pub mod error;
/// Schema description tree.
pub mod schema;
/// Skill taxonomy paths.
pub mod skill;
/// Tasks, requirements and results.
pub mod task;

pub use agent::{Action, AgentCapability, AgentConfig, AgentDefinition, AgentId, Capability};
pub use error::{NexusError, NexusResult};
pub use schema::{AdditionalProperties, Property, SchemaConfig, SchemaType};
pub use skill::{segment_eq, SkillPath};
pub use task::{Task, TaskRequirement, TaskResult, TaskStatus};
