//! Error types for the kubedispatch-core library.

use thiserror::Error;

/// Result type alias for kubedispatch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised outside a dispatched operation: configuration and setup.
///
/// Errors inside an operation are reported as `ErrorInfo` in its result.
#[derive(Error, Debug)]
pub enum Error {
    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}
