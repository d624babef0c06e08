//! Recursive JSON payload validation against action schemas.
//!
//! Agents describe their action inputs and outputs with a JSON-Schema
//! subset ([`nexus_core::SchemaConfig`]). This crate checks concrete JSON
//! documents against those descriptions, resolving `$ref`s through the
//! schema's `$defs`, and reports the first violation with a dotted field
//! path so it can be fed back to the payload producer.

/// Validation error type.
pub mod error;
/// Named string formats.
pub mod format;
/// The recursive validator.
pub mod validator;

pub use error::{ValidationError, ROOT};
pub use validator::{check_refs, validate, validate_bytes, SchemaValidator, MAX_REF_DEPTH};
