//! Capability registry and weighted capability matcher.
//!
//! The [`CapabilityRegistry`] stores every agent's declared skill paths and
//! actions behind a reader/writer lock. The [`CapabilityMatcher`] scores each
//! registered agent against a task requirement and returns a ranked,
//! thresholded candidate list.

/// Weighted scoring of agents against requirements.
pub mod matcher;
/// Concurrent AgentID → capability store.
pub mod registry;

pub use matcher::{action_score, path_score, CapabilityMatcher, MatchResult, MatcherConfig};
pub use registry::CapabilityRegistry;
