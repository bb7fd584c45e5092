use thiserror::Error;

pub type Result<T> = std::result::Result<T, AiError>;

#[derive(Debug, Error)]
pub enum AiError {
    /// Provider returned a rate-limit response (429 or quota exhausted).
    #[error("embedding provider rate limited: {0}")]
    RateLimited(String),

    /// Timed out waiting for local rate-limiter capacity.
    #[error("timed out waiting for rate limiter capacity ({0} slots)")]
    CapacityTimeout(usize),

    /// Provider returned a server-side failure.
    #[error("embedding provider error (status {status}): {message}")]
    Provider { status: u16, message: String },

    #[error("embedding request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Transient retries exhausted.
    #[error("embedding failed after {attempts} attempts: {message}")]
    Exhausted { attempts: u32, message: String },

    #[error("embedding cache error: {0}")]
    Cache(#[from] sqlx::Error),

    #[error("unexpected embedding dimension: expected {expected}, got {got}")]
    Dimension { expected: usize, got: usize },

    #[error("malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("missing API key for embedding provider")]
    MissingApiKey,
}

impl AiError {
    /// Transient failures are retried with exponential backoff before
    /// being promoted.
    pub fn is_transient(&self) -> bool {
        match self {
            AiError::RateLimited(_) | AiError::CapacityTimeout(_) => true,
            AiError::Provider { status, .. } => *status >= 500,
            AiError::Request(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}
