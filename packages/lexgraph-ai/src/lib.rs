//! Embedding subsystem: rate-limited, cached, retrying text-to-vector.
//!
//! The [`Embedder`] composes a provider backend (remote API or
//! deterministic simulation), the content-addressed SQLite cache and the
//! sliding-window rate limiter. All three shared pieces are internally
//! synchronized and safe to share across worker pools.

pub mod cache;
pub mod config;
pub mod error;
pub mod gemini;
pub mod provider;
pub mod rate_limiter;
pub mod simulated;

pub use cache::{fingerprint, SqliteEmbeddingCache};
pub use config::EmbeddingConfig;
pub use error::{AiError, Result};
pub use gemini::GeminiBackend;
pub use provider::{EmbedStats, Embedder, EmbeddingBackend};
pub use rate_limiter::SlidingWindowRateLimiter;
pub use simulated::SimulatedBackend;
