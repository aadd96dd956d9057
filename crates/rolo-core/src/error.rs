//! Error types for rolodex.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// Result type alias using rolodex's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for rolodex operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Caller-supplied input was rejected (empty transcript, empty question,
    /// out-of-range birthday). Never retried.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The completion backend failed or returned output of the wrong shape.
    #[error("Extraction failed during {operation}: {reason}")]
    ExtractionFailed {
        operation: &'static str,
        reason: String,
    },

    /// A contact or review store operation failed.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// The pending review exists but is past its expiry.
    #[error("Review {id} expired at {expired_at}")]
    ReviewExpired {
        id: Uuid,
        expired_at: DateTime<Utc>,
    },

    /// Pending review not found for this owner
    #[error("Review not found: {0}")]
    ReviewNotFound(Uuid),

    /// Contact not found for this owner
    #[error("Contact not found: {0}")]
    ContactNotFound(Uuid),

    /// A natural-language question could not be translated into a query.
    #[error("Could not understand the question, please try rephrasing: {0}")]
    QueryNotUnderstood(String),

    /// An external call exceeded its time bound.
    #[error("Timed out after {after_ms}ms during {operation}")]
    Timeout {
        operation: &'static str,
        after_ms: u64,
    },

    /// Inference/generation failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Build an `ExtractionFailed` for the given adapter operation.
    pub fn extraction(operation: &'static str, reason: impl Into<String>) -> Self {
        Error::ExtractionFailed {
            operation,
            reason: reason.into(),
        }
    }

    /// True for failures of the completion backend (call error, bad output, timeout).
    pub fn is_backend_failure(&self) -> bool {
        matches!(
            self,
            Error::ExtractionFailed { .. }
                | Error::Inference(_)
                | Error::Request(_)
                | Error::Timeout { .. }
        )
    }
}

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        Error::StoreUnavailable(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_validation() {
        let err = Error::Validation("transcript is empty".to_string());
        assert_eq!(err.to_string(), "Validation error: transcript is empty");
    }

    #[test]
    fn test_error_display_extraction_names_operation() {
        let err = Error::extraction("extract_person", "not JSON");
        assert_eq!(
            err.to_string(),
            "Extraction failed during extract_person: not JSON"
        );
    }

    #[test]
    fn test_error_display_review_expired() {
        let id = Uuid::nil();
        let expired_at = DateTime::parse_from_rfc3339("2026-01-08T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let err = Error::ReviewExpired { id, expired_at };
        assert!(err.to_string().contains(&id.to_string()));
        assert!(err.to_string().contains("expired"));
    }

    #[test]
    fn test_error_display_timeout() {
        let err = Error::Timeout {
            operation: "tidy_transcript",
            after_ms: 1500,
        };
        assert_eq!(err.to_string(), "Timed out after 1500ms during tidy_transcript");
    }

    #[test]
    fn test_query_not_understood_asks_to_rephrase() {
        let err = Error::QueryNotUnderstood("backend returned prose".to_string());
        assert!(err.to_string().contains("rephrasing"));
    }

    #[test]
    fn test_from_sqlx_error_is_store_unavailable() {
        let err: Error = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, Error::StoreUnavailable(_)));
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_backend_failure_classification() {
        assert!(Error::extraction("tidy_transcript", "boom").is_backend_failure());
        assert!(Error::Timeout {
            operation: "x",
            after_ms: 1
        }
        .is_backend_failure());
        assert!(!Error::StoreUnavailable("down".into()).is_backend_failure());
        assert!(!Error::Validation("empty".into()).is_backend_failure());
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
