//! Store error types.

use cartwise_core::CoreError;
use thiserror::Error;

/// Errors that can occur in the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The primary storage engine is not open or refused the operation.
    #[error("Storage engine unavailable: {0}")]
    Unavailable(String),

    /// SQLite error.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Model validation or data error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The database schema is newer than this build understands.
    #[error("Unsupported schema version {found} (newest supported is {supported})")]
    UnsupportedSchema {
        /// Version found on disk.
        found: u32,
        /// Newest version this build can open.
        supported: u32,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A queued operation carried a payload that cannot be replayed.
    #[error("Invalid queued payload: {0}")]
    InvalidPayload(String),

    /// A blocking storage task or a live query read panicked or was
    /// cancelled.
    #[error("Storage task failed: {0}")]
    Task(String),
}

impl StoreError {
    /// Returns true if this is a transient error that might succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Unavailable(_)
                | StoreError::Sqlite(_)
                | StoreError::Io(_)
                | StoreError::Task(_)
        )
    }

    /// Returns true if the error is a model validation failure.
    pub fn is_validation(&self) -> bool {
        matches!(self, StoreError::Core(CoreError::Validation(_)))
    }
}
