//! Error types for the Ratewarden service.

use thiserror::Error;

/// Main error type for Ratewarden operations.
#[derive(Error, Debug)]
pub enum RatewardenError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// State store errors surfaced outside the decision path
    #[error("State store error: {0}")]
    Store(#[from] StoreError),

    /// HTTP server errors
    #[error("Server error: {0}")]
    Server(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for RatewardenError {
    fn from(err: config::ConfigError) -> Self {
        RatewardenError::Config(err.to_string())
    }
}

/// Errors reported by a state store backend.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No record is stored under the key. Not a failure for the decision engine.
    #[error("rate limit state not found for key {0}")]
    NotFound(String),

    /// The Redis backend could not complete the operation
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// A stored record could not be encoded or decoded
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// Any other backend failure
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Whether this error only reports an absent record.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Result type alias for Ratewarden operations.
pub type Result<T> = std::result::Result<T, RatewardenError>;
