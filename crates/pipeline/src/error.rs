//! Pipeline Error Types

use feature_profiler::ProfileError;
use fraud_service::{PollError, ServiceError};
use rule_generator::RuleError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a pipeline stage
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Missing argument, malformed artifact or unusable input
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Profiling failed: {0}")]
    Profile(#[from] ProfileError),

    #[error("Rule generation failed: {0}")]
    Rule(#[from] RuleError),

    #[error("Service call failed: {0}")]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Poll(#[from] PollError),

    /// A resource settled in a status the stage cannot continue from
    #[error("{what} ended in status {status}")]
    UnexpectedStatus { what: String, status: String },

    #[error("Training metrics missing for model {model_id} version {version}")]
    MissingMetrics { model_id: String, version: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl PipelineError {
    /// Whether rerunning the stage may succeed without changes
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Service(e) => e.is_retryable(),
            PipelineError::Poll(PollError::Service(e)) => e.is_retryable(),
            PipelineError::Poll(PollError::DeadlineExceeded { .. }) => true,
            _ => false,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }
}
