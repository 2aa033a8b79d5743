//! Error types for docsink

use thiserror::Error;

/// Result type alias for docsink operations
pub type Result<T> = std::result::Result<T, DocsinkError>;

/// Main error type for docsink
///
/// Every failure mode of a run maps onto exactly one of these variants, and
/// all of them abort the run: nothing is retried and nothing is swallowed.
#[derive(Error, Debug)]
pub enum DocsinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Document store error: {0}")]
    Document(String),

    #[error("Run cancelled before record {0}")]
    Cancelled(String),
}

impl From<serde_json::Error> for DocsinkError {
    fn from(err: serde_json::Error) -> Self {
        DocsinkError::Decode(err.to_string())
    }
}
