//! Error types for the uscalc_core library.

use crate::types::ValidationFailure;
use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for uscalc_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error (its own message already says "CSV error")
    #[error("{0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required input was missing or out of range
    #[error("{0}")]
    Validation(#[from] ValidationFailure),

    /// The network (origin) could not be reached for an asset
    #[error("Network error: {0}")]
    Network(String),

    /// Offline cache storage or lifecycle error
    #[error("Cache error: {0}")]
    Cache(String),

    /// Clipboard write failed
    #[error("Clipboard error: {0}")]
    Clipboard(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
