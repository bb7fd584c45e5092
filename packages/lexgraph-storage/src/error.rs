use thiserror::Error;

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    /// Transient store failure; the caller may retry with backoff.
    #[error("graph store unavailable: {0}")]
    Unavailable(String),

    /// The store rejected the data (unique or type constraint). Terminal
    /// for the offending document.
    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

impl StorageError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Unavailable(_))
    }
}

impl From<neo4rs::Error> for StorageError {
    fn from(e: neo4rs::Error) -> Self {
        let message = e.to_string();
        if message.to_lowercase().contains("constraint") {
            StorageError::Constraint(message)
        } else {
            StorageError::Unavailable(message)
        }
    }
}
