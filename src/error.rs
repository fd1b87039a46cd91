//! Error types for the Floodgate crate.

use std::time::Duration;
use thiserror::Error;

/// Main error type for Floodgate operations.
#[derive(Error, Debug)]
pub enum FloodgateError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The caller passed an identifier the limiter cannot key on
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Counter store errors (connection, protocol, script execution)
    #[error("Counter store error: {0}")]
    Store(#[from] redis::RedisError),

    /// A counter store operation exceeded its bounded timeout
    #[error("Counter store operation timed out after {0:?}")]
    StoreTimeout(Duration),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FloodgateError {
    /// Whether this error originated in the counter store rather than the
    /// caller's input or configuration. The registry's failure policy only
    /// applies to these.
    pub fn is_store_error(&self) -> bool {
        matches!(
            self,
            FloodgateError::Store(_) | FloodgateError::StoreTimeout(_)
        )
    }
}

/// Result type alias for Floodgate operations.
pub type Result<T> = std::result::Result<T, FloodgateError>;
