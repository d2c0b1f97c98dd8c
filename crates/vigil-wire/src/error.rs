//! Error types for the wire layer.

use thiserror::Error;

/// Result type alias for wire operations.
pub type Result<T> = std::result::Result<T, WireError>;

/// Errors that can occur while encoding or delivering payloads.
///
/// None of these ever reach instrumented test code; callers log them and
/// drop the affected event or batch.
#[derive(Debug, Error)]
pub enum WireError {
    /// Binary serialization of an event or envelope failed.
    #[error("Encoding error: {0}")]
    Encode(String),

    /// HTTP/network error while talking to the intake.
    #[error("Network error: {0}")]
    Network(String),

    /// The intake rejected the payload with an HTTP error status.
    #[error("Intake rejected payload (status {status}): {body}")]
    Rejected { status: u16, body: String },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error (compression, buffering).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for WireError {
    fn from(e: reqwest::Error) -> Self {
        WireError::Network(e.to_string())
    }
}
