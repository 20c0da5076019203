//! Error types for caseflow.

use thiserror::Error;

/// Result type alias using caseflow's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for caseflow operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Case not found
    #[error("Case not found: {0}")]
    CaseNotFound(uuid::Uuid),

    /// Insight not found
    #[error("Insight not found: {0}")]
    InsightNotFound(uuid::Uuid),

    /// Job queue error
    #[error("Job error: {0}")]
    Job(String),

    /// External accounting sync failed
    #[error("Sync error: {0}")]
    Sync(String),

    /// Realtime transport error
    #[error("Realtime error: {0}")]
    Realtime(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Authentication/authorization failed
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Forbidden (authenticated but not authorized)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
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
    use uuid::Uuid;

    #[test]
    fn test_error_display_not_found() {
        let err = Error::NotFound("test resource".to_string());
        assert_eq!(err.to_string(), "Not found: test resource");
    }

    #[test]
    fn test_error_display_case_not_found() {
        let id = Uuid::nil();
        let err = Error::CaseNotFound(id);
        assert_eq!(err.to_string(), format!("Case not found: {}", id));
    }

    #[test]
    fn test_error_display_insight_not_found() {
        let id = Uuid::new_v4();
        let err = Error::InsightNotFound(id);
        assert!(err.to_string().contains(&id.to_string()));
    }

    #[test]
    fn test_error_display_job() {
        let err = Error::Job("queue full".to_string());
        assert_eq!(err.to_string(), "Job error: queue full");
    }

    #[test]
    fn test_error_display_sync() {
        let err = Error::Sync("QuickBooks rejected the purchase".to_string());
        assert_eq!(
            err.to_string(),
            "Sync error: QuickBooks rejected the purchase"
        );
    }

    #[test]
    fn test_error_display_realtime() {
        let err = Error::Realtime("socket closed".to_string());
        assert_eq!(err.to_string(), "Realtime error: socket closed");
    }

    #[test]
    fn test_error_display_invalid_input() {
        let err = Error::InvalidInput("missing org header".to_string());
        assert_eq!(err.to_string(), "Invalid input: missing org header");
    }

    #[test]
    fn test_error_display_unauthorized() {
        let err = Error::Unauthorized("invalid token".to_string());
        assert_eq!(err.to_string(), "Unauthorized: invalid token");
    }

    #[test]
    fn test_error_display_forbidden() {
        let err = Error::Forbidden("wrong organization".to_string());
        assert_eq!(err.to_string(), "Forbidden: wrong organization");
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number");
        assert!(json_err.is_err());

        let err: Error = json_err.unwrap_err().into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        match err {
            Error::Io(_) => {}
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
