//! Error types for cloudbox.

use thiserror::Error;

/// Common error type for cloudbox.
#[derive(Error, Debug)]
pub enum CloudboxError {
    /// Database error.
    ///
    /// Wraps errors from the SQLite backend. Errors from sqlx are
    /// converted automatically.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error while reading or writing stored content or metadata.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Metadata index could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Authentication error.
    #[error("authentication error: {0}")]
    Auth(String),

    /// Validation error for a malformed create/update payload.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Resource already exists.
    #[error("conflict: {0}")]
    Conflict(String),

    /// File size or total storage limit breached.
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for CloudboxError {
    fn from(e: sqlx::Error) -> Self {
        CloudboxError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for CloudboxError {
    fn from(e: serde_json::Error) -> Self {
        CloudboxError::Serialization(e.to_string())
    }
}

/// Result type alias for cloudbox operations.
pub type Result<T> = std::result::Result<T, CloudboxError>;
