//! Error taxonomy for playbook resolution
//!
//! Every failure raised while normalizing, compiling, evaluating or
//! reconstructing include directives maps to one of these variants.
//! Errors are returned at the point of detection and never retried here.

use thiserror::Error;

/// Errors raised by the playbook core
#[derive(Debug, Error)]
pub enum PlaybookError {
    /// Malformed or conflicting directive syntax
    #[error("directive error: {0}")]
    Directive(String),

    /// A value does not match the kind declared for its attribute
    #[error("attribute '{field}' expects {expected}, got {found}")]
    SchemaViolation {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    /// Loaded content does not have the expected shape
    #[error("structure error: {0}")]
    Structure(String),

    /// The data loader could not produce content for a path
    #[error("failed to load '{path}': {message}")]
    Load { path: String, message: String },

    /// A conditional expression could not be evaluated
    #[error("error while evaluating conditional '{expression}': {message}")]
    ConditionalEvaluation { expression: String, message: String },

    /// A transfer record is missing required data or is malformed
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// A compiled entity could not be encoded as a transfer record
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl PlaybookError {
    pub fn directive(message: impl Into<String>) -> Self {
        Self::Directive(message.into())
    }

    pub fn structure(message: impl Into<String>) -> Self {
        Self::Structure(message.into())
    }

    pub fn deserialization(message: impl Into<String>) -> Self {
        Self::Deserialization(message.into())
    }
}

/// Result alias used throughout the playbook core
pub type Result<T> = std::result::Result<T, PlaybookError>;

/// Short name of a YAML value's kind, used in error messages
pub fn value_kind(value: &serde_yaml::Value) -> &'static str {
    match value {
        serde_yaml::Value::Null => "null",
        serde_yaml::Value::Bool(_) => "bool",
        serde_yaml::Value::Number(_) => "number",
        serde_yaml::Value::String(_) => "string",
        serde_yaml::Value::Sequence(_) => "list",
        serde_yaml::Value::Mapping(_) => "dict",
        serde_yaml::Value::Tagged(_) => "tagged value",
    }
}
