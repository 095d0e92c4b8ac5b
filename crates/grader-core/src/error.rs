//! Error types for the grading pipeline.

use std::time::Duration;

/// Grading errors.
#[derive(Debug, thiserror::Error)]
pub enum GraderError {
    /// Rubric weights failed validation.
    #[error("invalid rubric: {message}")]
    Validation { message: String },

    /// The scoring backend failed to produce an outcome.
    #[error("scoring backend '{backend}' unavailable: {message}")]
    BackendUnavailable { backend: String, message: String },

    /// The semantic layer did not finish in time.
    #[error("semantic analysis timed out after {after:?}")]
    Timeout { after: Duration },

    /// A cache tier could not be read or written.
    #[error("cache error: {message}")]
    Cache { message: String },

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl GraderError {
    /// Whether the orchestration layer should retry the call.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::BackendUnavailable { .. } | Self::Timeout { .. }
        )
    }

    /// `BackendUnavailable` for a [`ScoringBackend`](crate::ScoringBackend)
    /// implementation named `backend`.
    pub fn backend(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            backend: backend.into(),
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for GraderError {
    fn from(err: reqwest::Error) -> Self {
        Self::Cache {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for GraderError {
    fn from(err: serde_json::Error) -> Self {
        Self::Cache {
            message: format!("malformed cache payload: {}", err),
        }
    }
}

/// Result type for grading operations.
pub type GraderResult<T> = Result<T, GraderError>;
