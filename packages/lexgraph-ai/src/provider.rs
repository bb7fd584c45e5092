//! The embedding provider: cache probe, rate-limit acquisition, chunked
//! backend calls with retry, cache write-back.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::cache::SqliteEmbeddingCache;
use crate::config::EmbeddingConfig;
use crate::error::{AiError, Result};
use crate::rate_limiter::SlidingWindowRateLimiter;

/// Text-to-vector backend. Implementations are the remote API and the
/// deterministic simulation.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Provider-specific chunk size for one call.
    fn max_batch_size(&self) -> usize;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Cache-hit bookkeeping for one `embed_batch` call.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbedStats {
    pub generated: usize,
    pub from_cache: usize,
}

impl EmbedStats {
    pub fn merge(&mut self, other: EmbedStats) {
        self.generated += other.generated;
        self.from_cache += other.from_cache;
    }
}

pub struct Embedder {
    backend: Arc<dyn EmbeddingBackend>,
    /// Disabled in `--clean` runs.
    cache: Option<Arc<SqliteEmbeddingCache>>,
    limiter: Arc<SlidingWindowRateLimiter>,
    config: EmbeddingConfig,
    max_retries: u32,
    acquire_timeout: Duration,
}

impl Embedder {
    pub fn new(
        backend: Arc<dyn EmbeddingBackend>,
        cache: Option<Arc<SqliteEmbeddingCache>>,
        limiter: Arc<SlidingWindowRateLimiter>,
        config: EmbeddingConfig,
    ) -> Self {
        Self {
            backend,
            cache,
            limiter,
            config,
            max_retries: 3,
            acquire_timeout: Duration::from_secs(300),
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let (mut vectors, _) = self.embed_batch(&[text.to_string()]).await?;
        Ok(vectors.pop().expect("one vector per input"))
    }

    /// Embed all texts, returning vectors in input order plus cache
    /// statistics.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<(Vec<Vec<f32>>, EmbedStats)> {
        if texts.is_empty() {
            return Ok((Vec::new(), EmbedStats::default()));
        }

        let mut vectors: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        let mut stats = EmbedStats::default();

        // Probe the cache; collect misses.
        let mut miss_indices: Vec<usize> = Vec::new();
        if let Some(cache) = &self.cache {
            for (i, text) in texts.iter().enumerate() {
                let fp = cache.fingerprint_for(text);
                match cache.get(&fp).await? {
                    Some(vector) => {
                        vectors[i] = Some(vector);
                        stats.from_cache += 1;
                    }
                    None => miss_indices.push(i),
                }
            }
        } else {
            miss_indices = (0..texts.len()).collect();
        }

        if miss_indices.is_empty() {
            debug!(total = texts.len(), "embedding batch fully served from cache");
            return Ok((vectors.into_iter().map(|v| v.expect("filled")).collect(), stats));
        }

        // One rate-limit slot per text to embed.
        if !self
            .limiter
            .acquire(miss_indices.len(), self.acquire_timeout)
            .await
        {
            return Err(AiError::CapacityTimeout(miss_indices.len()));
        }

        for chunk in miss_indices.chunks(self.backend.max_batch_size()) {
            let chunk_texts: Vec<String> = chunk.iter().map(|&i| texts[i].clone()).collect();
            let chunk_vectors = self.call_with_retry(&chunk_texts).await?;

            for (&i, vector) in chunk.iter().zip(chunk_vectors) {
                if vector.len() != self.config.dimensions {
                    return Err(AiError::Dimension {
                        expected: self.config.dimensions,
                        got: vector.len(),
                    });
                }
                if let Some(cache) = &self.cache {
                    let fp = cache.fingerprint_for(&texts[i]);
                    cache.put(&fp, &texts[i], &vector).await?;
                }
                vectors[i] = Some(vector);
                stats.generated += 1;
            }
        }

        Ok((vectors.into_iter().map(|v| v.expect("filled")).collect(), stats))
    }

    async fn call_with_retry(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut attempt = 0u32;
        loop {
            match self.backend.embed_batch(texts).await {
                Ok(vectors) => return Ok(vectors),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = Duration::from_secs(2u64.pow(attempt));
                    warn!(
                        backend = self.backend.name(),
                        attempt,
                        delay_secs = delay.as_secs(),
                        error = %e,
                        "transient embedding failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) if e.is_transient() => {
                    return Err(AiError::Exhausted {
                        attempts: attempt + 1,
                        message: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulated::SimulatedBackend;
    use parking_lot::Mutex;

    fn config() -> EmbeddingConfig {
        EmbeddingConfig {
            dimensions: 8,
            ..EmbeddingConfig::default()
        }
    }

    fn limiter() -> Arc<SlidingWindowRateLimiter> {
        Arc::new(SlidingWindowRateLimiter::new(1000, Duration::from_secs(60)))
    }

    #[tokio::test]
    async fn test_embed_batch_preserves_order() {
        let embedder = Embedder::new(
            Arc::new(SimulatedBackend::new(config())),
            None,
            limiter(),
            config(),
        );

        let texts: Vec<String> = (0..5).map(|i| format!("texto {i}")).collect();
        let (vectors, stats) = embedder.embed_batch(&texts).await.unwrap();
        assert_eq!(vectors.len(), 5);
        assert_eq!(stats.generated, 5);
        assert_eq!(stats.from_cache, 0);

        // Same inputs, same outputs, same order.
        let (again, _) = embedder.embed_batch(&texts).await.unwrap();
        assert_eq!(vectors, again);
    }

    #[tokio::test]
    async fn test_cache_serves_second_call() {
        let cache = Arc::new(
            SqliteEmbeddingCache::open_in_memory(config()).await.unwrap(),
        );
        let embedder = Embedder::new(
            Arc::new(SimulatedBackend::new(config())),
            Some(cache.clone()),
            limiter(),
            config(),
        );

        let texts = vec!["uno".to_string(), "dos".to_string()];
        let (first, stats) = embedder.embed_batch(&texts).await.unwrap();
        assert_eq!(stats.generated, 2);

        let (second, stats) = embedder.embed_batch(&texts).await.unwrap();
        assert_eq!(stats.from_cache, 2);
        assert_eq!(stats.generated, 0);
        assert_eq!(first, second);
        assert_eq!(cache.len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_capacity_timeout_surfaces() {
        let tight = Arc::new(SlidingWindowRateLimiter::new(1, Duration::from_secs(60)));
        tight.record(1);
        let embedder = Embedder::new(
            Arc::new(SimulatedBackend::new(config())),
            None,
            tight,
            config(),
        )
        .with_acquire_timeout(Duration::from_millis(50));

        let result = embedder.embed_batch(&["uno".to_string()]).await;
        assert!(matches!(result, Err(AiError::CapacityTimeout(1))));
    }

    /// Backend that fails transiently a fixed number of times.
    struct FlakyBackend {
        inner: SimulatedBackend,
        failures_left: Mutex<u32>,
    }

    #[async_trait]
    impl EmbeddingBackend for FlakyBackend {
        fn name(&self) -> &str {
            "flaky"
        }

        fn max_batch_size(&self) -> usize {
            64
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            {
                let mut left = self.failures_left.lock();
                if *left > 0 {
                    *left -= 1;
                    return Err(AiError::Provider {
                        status: 503,
                        message: "overloaded".to_string(),
                    });
                }
            }
            self.inner.embed_batch(texts).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_retried() {
        let embedder = Embedder::new(
            Arc::new(FlakyBackend {
                inner: SimulatedBackend::new(config()),
                failures_left: Mutex::new(2),
            }),
            None,
            limiter(),
            config(),
        );

        let (vectors, stats) = embedder.embed_batch(&["uno".to_string()]).await.unwrap();
        assert_eq!(vectors.len(), 1);
        assert_eq!(stats.generated, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_exhaust_into_terminal_error() {
        let embedder = Embedder::new(
            Arc::new(FlakyBackend {
                inner: SimulatedBackend::new(config()),
                failures_left: Mutex::new(10),
            }),
            None,
            limiter(),
            config(),
        )
        .with_max_retries(2);

        let result = embedder.embed_batch(&["uno".to_string()]).await;
        assert!(matches!(result, Err(AiError::Exhausted { attempts: 3, .. })));
    }
}
