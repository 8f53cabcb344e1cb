//! Error types for the persistence layer

use thiserror::Error;

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in the persistence layer
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database driver errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Write rejected because it clashes with existing data
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Failure injected by the in-memory store
    #[error("Injected failure: {0}")]
    Injected(String),
}

impl StoreError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}
