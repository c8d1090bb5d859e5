//! Error types for domain parsing and input validation.

use thiserror::Error;

/// A string did not name any variant of a closed domain enum.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field}: {value:?}")]
pub struct ParseEnumError {
    /// Which enum was being parsed (`status`, `priority`, `role`).
    pub field: &'static str,
    /// The rejected input.
    pub value: String,
}

/// A create or update input failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    /// Build a validation error from any message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
