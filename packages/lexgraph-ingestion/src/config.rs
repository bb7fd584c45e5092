//! Typed configuration assembled once at startup from environment
//! variables plus CLI flags. There is no dynamic reconfiguration.

use std::path::PathBuf;
use std::time::Duration;

use lexgraph_ai::EmbeddingConfig;

#[derive(Debug, Clone)]
pub struct Neo4jConfig {
    pub uri: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub cpu_workers: usize,
    pub network_workers: usize,
    pub disk_workers: usize,
    pub scatter_chunk_size: usize,
    pub linker_batch_size: u64,
    pub linker_workers: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            cpu_workers: 5,
            network_workers: 20,
            disk_workers: 2,
            scatter_chunk_size: 500,
            linker_batch_size: 5000,
            linker_workers: 6,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: usize,
    pub window: Duration,
    pub acquire_timeout: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 3000,
            window: Duration::from_secs(60),
            acquire_timeout: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IngestionConfig {
    pub neo4j: Neo4jConfig,
    pub embedding: EmbeddingConfig,
    pub gemini_api_key: Option<String>,
    pub cache_path: PathBuf,
    pub unresolved_log_path: PathBuf,
    pub archive_dir: Option<PathBuf>,
    pub auto_rollback: bool,
    pub rate_limit: RateLimitConfig,
    pub workers: WorkerConfig,
}

impl IngestionConfig {
    pub fn from_env() -> Self {
        let env = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());
        Self {
            neo4j: Neo4jConfig {
                uri: env("NEO4J_URI"),
                user: env("NEO4J_USER"),
                password: env("NEO4J_PASSWORD"),
            },
            embedding: EmbeddingConfig::default(),
            gemini_api_key: env("GEMINI_API_KEY"),
            cache_path: env("EMBEDDING_CACHE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/embeddings_cache.db")),
            unresolved_log_path: env("UNRESOLVED_LOG_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/unresolved_references.json")),
            archive_dir: env("DOCUMENT_ARCHIVE_DIR").map(PathBuf::from),
            auto_rollback: true,
            rate_limit: RateLimitConfig::default(),
            workers: WorkerConfig::default(),
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            neo4j: Neo4jConfig {
                uri: None,
                user: None,
                password: None,
            },
            embedding: EmbeddingConfig::default(),
            gemini_api_key: None,
            cache_path: PathBuf::from("data/embeddings_cache.db"),
            unresolved_log_path: PathBuf::from("data/unresolved_references.json"),
            archive_dir: None,
            auto_rollback: true,
            rate_limit: RateLimitConfig::default(),
            workers: WorkerConfig::default(),
        }
    }
}
