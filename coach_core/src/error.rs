//! Error types for the coach_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for coach_core operations
///
/// Recoverable conditions (adjustment limits, duplicate in-flight
/// generations, unrecognized prescription shapes) are modelled as typed
/// result values in their own modules and never surface here.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Prescription normalization error
    #[error("Normalization error: {0}")]
    Normalization(String),

    /// External generation call failed
    #[error("Generation error: {0}")]
    Generation(String),

    /// Client-side timeout on an external call
    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
