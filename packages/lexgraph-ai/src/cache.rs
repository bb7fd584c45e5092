//! Content-addressed persistent embedding cache.
//!
//! Backed by a single-file SQLite database in WAL mode so all three worker
//! pools can read and write concurrently. The key is a hash over
//! `{provider, model, dims, task_type, text}`, so a model or dimension
//! change never serves stale vectors.

use sha2::{Digest, Sha256};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use tracing::{debug, info};

use crate::config::EmbeddingConfig;
use crate::error::Result;

/// Cache key over everything that influences the vector.
pub fn fingerprint(config: &EmbeddingConfig, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(config.provider.as_bytes());
    hasher.update(b"|");
    hasher.update(config.model.as_bytes());
    hasher.update(b"|");
    hasher.update(config.dimensions.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(config.task_type.as_bytes());
    hasher.update(b"|");
    hasher.update(text.as_bytes());
    hex(&hasher.finalize())
}

fn text_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex(&hasher.finalize())
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn vector_to_blob(vector: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(vector.len() * 4);
    for value in vector {
        blob.extend_from_slice(&value.to_le_bytes());
    }
    blob
}

fn blob_to_vector(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

pub struct SqliteEmbeddingCache {
    pool: SqlitePool,
    config: EmbeddingConfig,
}

impl SqliteEmbeddingCache {
    pub async fn open(path: impl AsRef<Path>, config: EmbeddingConfig) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;
        let cache = Self { pool, config };
        cache.migrate().await?;
        info!(path = %path.as_ref().display(), "embedding cache opened");
        Ok(cache)
    }

    /// In-memory cache for tests. A single connection keeps every caller
    /// on the same database.
    pub async fn open_in_memory(config: EmbeddingConfig) -> Result<Self> {
        let options = SqliteConnectOptions::new().filename(":memory:");
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        let cache = Self { pool, config };
        cache.migrate().await?;
        Ok(cache)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS embedding_cache (
                 fingerprint TEXT PRIMARY KEY,
                 provider TEXT NOT NULL,
                 model TEXT NOT NULL,
                 dims INTEGER NOT NULL,
                 task_type TEXT NOT NULL,
                 text_hash TEXT NOT NULL,
                 vector BLOB NOT NULL,
                 created_at TEXT NOT NULL
             )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub fn fingerprint_for(&self, text: &str) -> String {
        fingerprint(&self.config, text)
    }

    /// Look up a vector. A hit whose stored dimension differs from the
    /// configured dimension is treated as a miss.
    pub async fn get(&self, fingerprint: &str) -> Result<Option<Vec<f32>>> {
        let row = sqlx::query(
            "SELECT vector, dims FROM embedding_cache WHERE fingerprint = ?1",
        )
        .bind(fingerprint)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(|row| {
            let dims: i64 = row.get("dims");
            if dims as usize != self.config.dimensions {
                debug!(fingerprint, dims, "cache entry with stale dimension ignored");
                return None;
            }
            let blob: Vec<u8> = row.get("vector");
            Some(blob_to_vector(&blob))
        }))
    }

    /// Store a vector. Once this returns, a `get` from any task sees it.
    pub async fn put(&self, fingerprint: &str, text: &str, vector: &[f32]) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO embedding_cache
                 (fingerprint, provider, model, dims, task_type, text_hash, vector, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(fingerprint)
        .bind(&self.config.provider)
        .bind(&self.config.model)
        .bind(self.config.dimensions as i64)
        .bind(&self.config.task_type)
        .bind(text_hash(text))
        .bind(vector_to_blob(vector))
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn len(&self) -> Result<u64> {
        let row = sqlx::query("SELECT count(*) AS total FROM embedding_cache")
            .fetch_one(&self.pool)
            .await?;
        let total: i64 = row.get("total");
        Ok(total as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EmbeddingConfig {
        EmbeddingConfig {
            dimensions: 4,
            ..EmbeddingConfig::default()
        }
    }

    #[test]
    fn test_fingerprint_is_content_addressed() {
        let config = config();
        let a = fingerprint(&config, "texto uno");
        let b = fingerprint(&config, "texto uno");
        let c = fingerprint(&config, "texto dos");
        assert_eq!(a, b);
        assert_ne!(a, c);

        let other_model = EmbeddingConfig {
            model: "models/other".to_string(),
            ..config
        };
        assert_ne!(a, fingerprint(&other_model, "texto uno"));
    }

    #[test]
    fn test_blob_round_trip() {
        let vector = vec![0.25f32, -1.5, 3.0, 0.0];
        assert_eq!(blob_to_vector(&vector_to_blob(&vector)), vector);
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let cache = SqliteEmbeddingCache::open_in_memory(config()).await.unwrap();
        let fp = cache.fingerprint_for("hola");
        assert!(cache.get(&fp).await.unwrap().is_none());

        cache.put(&fp, "hola", &[1.0, 2.0, 3.0, 4.0]).await.unwrap();
        assert_eq!(cache.get(&fp).await.unwrap(), Some(vec![1.0, 2.0, 3.0, 4.0]));
        assert_eq!(cache.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_a_miss() {
        let cache = SqliteEmbeddingCache::open_in_memory(config()).await.unwrap();
        let fp = cache.fingerprint_for("hola");
        // Stored with a different dimension than configured.
        cache.put(&fp, "hola", &[1.0, 2.0]).await.unwrap();

        sqlx::query("UPDATE embedding_cache SET dims = 2")
            .execute(&cache.pool)
            .await
            .unwrap();
        assert!(cache.get(&fp).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let cache = SqliteEmbeddingCache::open_in_memory(config()).await.unwrap();
        let fp = cache.fingerprint_for("hola");
        cache.put(&fp, "hola", &[1.0, 1.0, 1.0, 1.0]).await.unwrap();
        cache.put(&fp, "hola", &[2.0, 2.0, 2.0, 2.0]).await.unwrap();
        assert_eq!(cache.get(&fp).await.unwrap(), Some(vec![2.0, 2.0, 2.0, 2.0]));
        assert_eq!(cache.len().await.unwrap(), 1);
    }
}
