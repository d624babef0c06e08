use nexus_core::{NexusError, SchemaType};
use thiserror::Error;

/// Path label used for the document root.
pub const ROOT: &str = "(root)";

/// A field-path-qualified validation failure.
///
/// Every variant names the offending location (`spec.lang`, `tags[2]`, or
/// [`ROOT`]) so callers can feed the error back to whoever produced the
/// payload.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("payload is not valid JSON: {reason}")]
    InvalidJson { reason: String },

    #[error("missing required field '{path}'")]
    MissingField { path: String },

    #[error("field '{path}' must be of type {expected}")]
    TypeMismatch { path: String, expected: SchemaType },

    #[error("field '{path}' must be one of {allowed:?}")]
    NotInEnum { path: String, allowed: Vec<String> },

    #[error("field '{path}' must be exactly '{expected}'")]
    ConstMismatch { path: String, expected: String },

    #[error("field '{path}' does not match required pattern '{pattern}'")]
    PatternMismatch { path: String, pattern: String },

    #[error("invalid pattern '{pattern}' in schema for field '{path}': {reason}")]
    InvalidPattern {
        path: String,
        pattern: String,
        reason: String,
    },

    #[error("field '{path}' must be a valid {format}")]
    InvalidFormat { path: String, format: String },

    #[error("field '{path}' must be greater than or equal to {minimum}")]
    BelowMinimum { path: String, minimum: f64 },

    #[error("field '{path}' must be less than or equal to {maximum}")]
    AboveMaximum { path: String, maximum: f64 },

    #[error("array '{path}' must have at least {min} items")]
    TooFewItems { path: String, min: usize },

    #[error("array '{path}' must have at most {max} items")]
    TooManyItems { path: String, max: usize },

    #[error("field '{path}' is not allowed here")]
    AdditionalPropertyNotAllowed { path: String },

    #[error("field '{path}' failed to match any schema: {details}")]
    NoAlternativeMatched { path: String, details: String },

    #[error("field '{path}' did not match any schema when exactly one was required: {details}")]
    OneOfNoneMatched { path: String, details: String },

    #[error("field '{path}' matched {count} schemas when exactly one was required")]
    OneOfMultipleMatched { path: String, count: usize },

    #[error("undefined $ref '{reference}' at '{path}'")]
    UnresolvedRef { path: String, reference: String },

    #[error("$ref chain too deep at '{path}' (last followed '{reference}')")]
    RefDepthExceeded { path: String, reference: String },
}

impl ValidationError {
    /// Location the error refers to.
    pub fn path(&self) -> &str {
        match self {
            ValidationError::InvalidJson { .. } => ROOT,
            ValidationError::MissingField { path }
            | ValidationError::TypeMismatch { path, .. }
            | ValidationError::NotInEnum { path, .. }
            | ValidationError::ConstMismatch { path, .. }
            | ValidationError::PatternMismatch { path, .. }
            | ValidationError::InvalidPattern { path, .. }
            | ValidationError::InvalidFormat { path, .. }
            | ValidationError::BelowMinimum { path, .. }
            | ValidationError::AboveMaximum { path, .. }
            | ValidationError::TooFewItems { path, .. }
            | ValidationError::TooManyItems { path, .. }
            | ValidationError::AdditionalPropertyNotAllowed { path }
            | ValidationError::NoAlternativeMatched { path, .. }
            | ValidationError::OneOfNoneMatched { path, .. }
            | ValidationError::OneOfMultipleMatched { path, .. }
            | ValidationError::UnresolvedRef { path, .. }
            | ValidationError::RefDepthExceeded { path, .. } => path,
        }
    }

    /// True when the schema itself is broken, as opposed to the data.
    /// These are never fixed by regenerating the payload.
    pub fn is_schema_defect(&self) -> bool {
        matches!(
            self,
            ValidationError::UnresolvedRef { .. }
                | ValidationError::RefDepthExceeded { .. }
                | ValidationError::InvalidPattern { .. }
        )
    }
}

impl From<ValidationError> for NexusError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::UnresolvedRef { .. } | ValidationError::RefDepthExceeded { .. } => {
                NexusError::UnresolvedSchemaRef(err.to_string())
            }
            ValidationError::InvalidPattern { .. } => NexusError::Config(err.to_string()),
            other => NexusError::SchemaValidation(other.to_string()),
        }
    }
}
