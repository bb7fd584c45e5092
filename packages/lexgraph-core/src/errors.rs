use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid payload: {0}")]
    Payload(String),
}

impl CoreError {
    pub fn parse<E: std::fmt::Display>(e: E) -> Self {
        Self::Parse(e.to_string())
    }

    pub fn payload<E: std::fmt::Display>(e: E) -> Self {
        Self::Payload(e.to_string())
    }
}
