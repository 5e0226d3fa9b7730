use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying engine.
///
/// The room session treats any storage failure as fatal to the triggering
/// operation; the message is surfaced to participants, the source is kept
/// for logs.
#[derive(Debug, Error)]
#[error("storage backend failure: {message}")]
pub struct StorageError {
    /// Human readable description of the failed write.
    pub message: String,
    /// Underlying backend error, when one exists.
    #[source]
    pub source: Option<Box<dyn Error + Send + Sync>>,
}

impl StorageError {
    /// Build an error without an underlying cause.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Build an error wrapping a backend failure.
    pub fn with_source(
        message: impl Into<String>,
        source: impl Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}
