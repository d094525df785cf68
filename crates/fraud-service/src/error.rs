//! Service Error Types

use thiserror::Error;

/// Errors returned by the managed services
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    /// Request rejected locally before it was sent
    #[error("Invalid request: {0}")]
    Validation(String),

    /// The named resource does not exist
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The resource already exists
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    /// Throttling, server-side failure or lost connection; safe to retry
    #[error("Transient failure in {operation}: {message}")]
    Transient { operation: String, message: String },

    /// The service refused the request; retrying will not help
    #[error("{operation} failed ({code}): {message}")]
    Terminal {
        operation: String,
        code: String,
        message: String,
    },

    /// The response could not be decoded
    #[error("Unexpected response from {operation}: {message}")]
    Decode { operation: String, message: String },
}

impl ServiceError {
    /// Whether the same request may succeed if sent again
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Transient { .. })
    }

    /// Service-provided message text
    pub fn message(&self) -> &str {
        match self {
            ServiceError::Validation(m)
            | ServiceError::NotFound(m)
            | ServiceError::AlreadyExists(m) => m,
            ServiceError::Transient { message, .. }
            | ServiceError::Terminal { message, .. }
            | ServiceError::Decode { message, .. } => message,
        }
    }

    pub(crate) fn transient(operation: &str, message: impl Into<String>) -> Self {
        ServiceError::Transient {
            operation: operation.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn decode(operation: &str, message: impl Into<String>) -> Self {
        ServiceError::Decode {
            operation: operation.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_is_retryable() {
        assert!(ServiceError::transient("GetModelVersion", "throttled").is_retryable());
        assert!(!ServiceError::NotFound("x".into()).is_retryable());
        assert!(!ServiceError::Terminal {
            operation: "CreateRule".into(),
            code: "ValidationException".into(),
            message: "bad".into(),
        }
        .is_retryable());
    }

    #[test]
    fn test_message_accessor() {
        let err = ServiceError::AlreadyExists("Failed to save rule since it already exists.".into());
        assert_eq!(err.message(), "Failed to save rule since it already exists.");
    }
}
