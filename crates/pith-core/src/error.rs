//! Error types for the pith service.

use thiserror::Error;

/// Result type alias using pith's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for pith operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Book not found (or deleted mid-processing)
    #[error("Book not found: {0}")]
    BookNotFound(uuid::Uuid),

    /// Network or endpoint failure from the LLM
    #[error("Transport error: {0}")]
    Transport(String),

    /// Model output could not be coerced to the declared schema.
    /// Carries the raw reply for diagnostics.
    #[error("Schema validation error: {reason}")]
    SchemaValidation { reason: String, raw: String },

    /// A required precondition yielded no data (no chunks, no kept claims)
    #[error("{0}")]
    Empty(String),

    /// Operation attempted from an invalid state
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Authentication failed
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error is fatal for a whole pipeline run (as opposed to
    /// a per-item failure that `parallel_map` records and skips).
    pub fn is_stage_fatal(&self) -> bool {
        !matches!(self, Error::Transport(_) | Error::SchemaValidation { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_error_display_not_found() {
        let err = Error::NotFound("final output".to_string());
        assert_eq!(err.to_string(), "Not found: final output");
    }

    #[test]
    fn test_error_display_book_not_found() {
        let id = Uuid::nil();
        let err = Error::BookNotFound(id);
        assert_eq!(err.to_string(), format!("Book not found: {}", id));
    }

    #[test]
    fn test_error_display_transport() {
        let err = Error::Transport("connection refused".to_string());
        assert_eq!(err.to_string(), "Transport error: connection refused");
    }

    #[test]
    fn test_error_display_schema_validation() {
        let err = Error::SchemaValidation {
            reason: "missing field `claims`".to_string(),
            raw: "{}".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Schema validation error: missing field `claims`"
        );
    }

    #[test]
    fn test_error_display_empty() {
        let err = Error::Empty("No valuable claims found in this book".to_string());
        assert_eq!(err.to_string(), "No valuable claims found in this book");
    }

    #[test]
    fn test_error_display_precondition() {
        let err = Error::Precondition("already being processed".to_string());
        assert_eq!(err.to_string(), "Precondition failed: already being processed");
    }

    #[test]
    fn test_error_display_unauthorized() {
        let err = Error::Unauthorized("invalid token".to_string());
        assert_eq!(err.to_string(), "Unauthorized: invalid token");
    }

    #[test]
    fn test_stage_fatal_classification() {
        assert!(!Error::Transport("x".into()).is_stage_fatal());
        assert!(!Error::SchemaValidation {
            reason: "x".into(),
            raw: String::new()
        }
        .is_stage_fatal());
        assert!(Error::Empty("x".into()).is_stage_fatal());
        assert!(Error::BookNotFound(Uuid::nil()).is_stage_fatal());
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
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
