use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SaathiError>;

/// Crate-wide error type.
#[derive(Error, Debug)]
pub enum SaathiError {
    /// Blank input is rejected before anything reaches the transcript.
    #[error("Input is empty")]
    EmptyInput,

    #[error("Intent table error: {0}")]
    IntentTable(#[from] IntentTableError),

    #[error(transparent)]
    Inference(#[from] InferenceError),
}

/// Failures of the remote generative-language call.
#[derive(Error, Debug)]
pub enum InferenceError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("API request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("API request failed with status {status}: {body}")]
    Status { status: u16, body: String },
}

/// Reasons the platform could not produce coordinates.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeoError {
    #[error("Geolocation is not supported on this platform")]
    Unsupported,

    #[error("Location permission denied: {0}")]
    PermissionDenied(String),

    #[error("Position unavailable: {0}")]
    Unavailable(String),

    #[error("Location request timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

#[derive(Error, Debug)]
pub enum IntentTableError {
    #[error("Failed to parse intent table: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Failed to read intent table {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid pattern '{pattern}' for {intent} ({script}): {source}")]
    Pattern {
        intent: String,
        script: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}
