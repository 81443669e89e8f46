//! Error types for Engagement Metrics
//!
//! Only the input boundary can fail (decoding host signals, configuration, or
//! content dictionaries). The tracking core itself never returns an error.

use thiserror::Error;

/// Errors that can occur while decoding or validating host input
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid signal: {0}")]
    InvalidSignal(#[from] crate::signal::SignalValidationError),

    #[error("Invalid content: {0}")]
    InvalidContent(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}
