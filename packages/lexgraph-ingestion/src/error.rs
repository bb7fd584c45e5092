use thiserror::Error;

use lexgraph_ai::AiError;
use lexgraph_storage::StorageError;

pub type Result<T> = std::result::Result<T, IngestionError>;

#[derive(Debug, Error)]
pub enum IngestionError {
    /// The source has no such document. Terminal for the document.
    #[error("document not found: {0}")]
    DocumentNotFound(String),

    /// Upstream retrieval failure believed to be recoverable.
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error(transparent)]
    Embedding(#[from] AiError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Missing connection parameters or API keys: aborts the batch before
    /// any document is attempted.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Retry classification used by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Retry with backoff at the owning layer, then promote.
    Transient,
    /// Fail the document, roll back, continue the batch.
    Permanent,
    /// Abort the whole batch with exit code 1.
    Fatal,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Transient => "transient",
            ErrorCategory::Permanent => "permanent",
            ErrorCategory::Fatal => "fatal",
        }
    }
}

impl IngestionError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            IngestionError::SourceUnavailable(_) => ErrorCategory::Transient,
            IngestionError::Embedding(e) if e.is_transient() => ErrorCategory::Transient,
            IngestionError::Storage(e) if e.is_transient() => ErrorCategory::Transient,
            IngestionError::Config(_) => ErrorCategory::Fatal,
            _ => ErrorCategory::Permanent,
        }
    }

    pub fn parse<E: std::fmt::Display>(e: E) -> Self {
        Self::Parse(e.to_string())
    }
}

impl From<lexgraph_core::CoreError> for IngestionError {
    fn from(e: lexgraph_core::CoreError) -> Self {
        IngestionError::Parse(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_mapping() {
        assert_eq!(
            IngestionError::SourceUnavailable("503".to_string()).category(),
            ErrorCategory::Transient
        );
        assert_eq!(
            IngestionError::DocumentNotFound("x".to_string()).category(),
            ErrorCategory::Permanent
        );
        assert_eq!(
            IngestionError::Config("missing uri".to_string()).category(),
            ErrorCategory::Fatal
        );
        assert_eq!(
            IngestionError::Storage(StorageError::Constraint("dup".to_string())).category(),
            ErrorCategory::Permanent
        );
        assert_eq!(
            IngestionError::Storage(StorageError::Unavailable("down".to_string())).category(),
            ErrorCategory::Transient
        );
    }
}
