use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Id under which the combined (all endpoints) summary is reported.
pub const ALL_ENDPOINTS_ID: &str = "all";

/// Error types for abperf operations
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbPerfError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to read config {0}: {1}")]
    ConfigFile(String, String),

    #[error("Invalid duration {0:?}: expected e.g. 500ms, 30s, 2m, 1m30s")]
    InvalidDuration(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    #[error("Failed to write report to {0}: {1}")]
    ReportWrite(String, String),

    #[error("Metric recorder still shared by {0} other handle(s)")]
    RecorderInUse(usize),
}

/// One candidate endpoint under test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Stable identity used to tag samples (`endpoint1`, `endpoint2`).
    pub id: String,
    /// Human-readable label used in the verdict and report (`Test`, `Baseline`).
    pub name: String,
    pub url: String,
}

/// HTTP Basic-auth credentials sent with every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Result type for abperf operations
pub type Result<T> = std::result::Result<T, AbPerfError>;
