//! Common error types for GCM services

use thiserror::Error;

/// Common result type for GCM operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across GCM services
#[derive(Error, Debug)]
pub enum Error {
    /// Required field empty or value out of range
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// AI operation requested without enough credits
    #[error("Insufficient credits: {required} required, {available} available")]
    InsufficientCredits { required: u32, available: i64 },

    /// Caller is not allowed to perform the operation
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Phase transition rejected by the workflow rules
    #[error("Invalid phase transition: {0}")]
    InvalidTransition(String),

    /// Operation not available in the project's current phase
    #[error("Operation not allowed in current phase: {0}")]
    InvalidPhase(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Conflicting request (busy, or would discard existing data)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Database unreachable or pool exhausted
    #[error("Connection error: {0}")]
    Connection(String),

    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for a validation failure on a named field
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Error::Connection(err.to_string())
            }
            sqlx::Error::RowNotFound => Error::NotFound("row not found".to_string()),
            other => Error::Database(other),
        }
    }
}
