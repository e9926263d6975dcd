//! Error types for pagemeta.

use thiserror::Error;

/// Result type alias using pagemeta's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for pagemeta operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A criteria or order-by clause could not be compiled.
    #[error("Malformed query: {reason} in clause `{clause}`")]
    MalformedQuery { clause: String, reason: String },

    /// Structurally valid request carrying out-of-range values.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Capability that is deliberately not implemented.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Durable store failure not originating in sqlx.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Build a malformed-query error naming the offending clause.
    pub fn malformed(clause: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::MalformedQuery {
            clause: clause.into(),
            reason: reason.into(),
        }
    }

    /// True for errors raised by the durable store boundary.
    pub fn is_storage_failure(&self) -> bool {
        matches!(self, Error::Storage(_) | Error::Database(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
