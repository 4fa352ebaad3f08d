//! Core error types for Cartwise.

use thiserror::Error;

/// Core error type for Cartwise operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Input failed a model invariant (empty name, negative price, ...).
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Stored data could not be interpreted.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    /// Shorthand for a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
