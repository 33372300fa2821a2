//! Domain-specific error types for the token lifecycle.
//!
//! This module provides the error taxonomy for security token operations.
//! Error messages are deliberately terse; callers map them to user-facing
//! responses in the presentation layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Errors surfaced by the token lifecycle operations
///
/// `InvalidOrExpiredToken` is a single uniform failure: a wrong token, an
/// expired token, an already-consumed token, and an unknown account are
/// indistinguishable to callers.
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Account not found")]
    NotFound,

    #[error("Precondition failed: {reason}")]
    PreconditionFailed { reason: String },

    #[error("Invalid or expired token")]
    InvalidOrExpiredToken,

    #[error("Token delivery failed")]
    DeliveryFailed,

    #[error("Persistence failed: {message}")]
    PersistenceFailed { message: String },
}

/// Unified error response structure for API responses
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub error: String,
    /// Human-readable error message
    pub message: String,
    /// Additional error details if available
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, serde_json::Value>>,
    /// Timestamp when the error occurred
    pub timestamp: DateTime<Utc>,
}

impl ErrorResponse {
    /// Create a new error response
    pub fn new(error: impl ToString, message: impl ToString) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
            details: None,
            timestamp: Utc::now(),
        }
    }

    /// Add a single detail to the error response
    pub fn with_detail(mut self, key: impl ToString, value: serde_json::Value) -> Self {
        let mut details = self.details.unwrap_or_default();
        details.insert(key.to_string(), value);
        self.details = Some(details);
        self
    }
}

/// Convert LifecycleError to ErrorResponse
impl From<LifecycleError> for ErrorResponse {
    fn from(err: LifecycleError) -> Self {
        let error_code = match &err {
            LifecycleError::NotFound => "NOT_FOUND",
            LifecycleError::PreconditionFailed { .. } => "PRECONDITION_FAILED",
            LifecycleError::InvalidOrExpiredToken => "INVALID_OR_EXPIRED_TOKEN",
            LifecycleError::DeliveryFailed => "DELIVERY_FAILED",
            LifecycleError::PersistenceFailed { .. } => "PERSISTENCE_FAILED",
        };

        ErrorResponse::new(error_code, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_error_conversion() {
        let error = LifecycleError::InvalidOrExpiredToken;
        let response: ErrorResponse = error.into();
        assert_eq!(response.error, "INVALID_OR_EXPIRED_TOKEN");
        assert_eq!(response.message, "Invalid or expired token");
    }

    #[test]
    fn test_precondition_failure_carries_reason() {
        let error = LifecycleError::PreconditionFailed {
            reason: "account is already active".to_string(),
        };
        let response: ErrorResponse = error.into();
        assert_eq!(response.error, "PRECONDITION_FAILED");
        assert!(response.message.contains("already active"));
    }

    #[test]
    fn test_error_response_with_detail() {
        let response = ErrorResponse::new("TEST_ERROR", "Test error message")
            .with_detail("attempts", serde_json::json!(3));

        assert_eq!(response.error, "TEST_ERROR");
        assert_eq!(response.details.unwrap()["attempts"], 3);
    }
}
