//! Error type shared by pipelines and transports.

use std::time::Duration;

/// The error type task pipelines and LLM transports return.
///
/// Stage-level context (gather vs. prompt vs. apply, attempt transcripts)
/// is added by the runner and batch executor on top of this type.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// Provider-specific errors
    #[error("provider error: {0}")]
    Provider(String),

    /// Network-related errors
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization/deserialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A single attempt exceeded its time budget
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl TaskError {
    /// Create a provider error
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a generic error
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

impl From<String> for TaskError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

impl From<&str> for TaskError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}
