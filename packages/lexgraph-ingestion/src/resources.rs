//! Shared-singleton lifecycle: graph store, embedding cache, provider and
//! vector index are initialised explicitly at batch start and shared by
//! every worker. No lazy initialisation from worker tasks.

use std::sync::Arc;
use tracing::info;

use lexgraph_ai::{
    Embedder, EmbeddingConfig, GeminiBackend, SimulatedBackend, SlidingWindowRateLimiter,
    SqliteEmbeddingCache,
};
use lexgraph_storage::{
    GraphStore, MemoryGraphStore, Neo4jGraphStore, NormativaRepository, VectorIndexSpec,
};

use crate::config::IngestionConfig;
use crate::error::{IngestionError, Result};
use crate::processor::DataProcessor;
use crate::retriever::DocumentRetriever;

/// How article vectors are produced for this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingMode {
    Real,
    Simulated,
    Skipped,
}

impl EmbeddingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbeddingMode::Real => "real",
            EmbeddingMode::Simulated => "simulated",
            EmbeddingMode::Skipped => "skipped",
        }
    }
}

pub struct Resources {
    pub config: IngestionConfig,
    pub store: Arc<dyn GraphStore>,
    pub embedder: Arc<Embedder>,
    pub retriever: Arc<DocumentRetriever>,
    pub processor: Arc<DataProcessor>,
    pub repository: Arc<NormativaRepository>,
    pub embedding_mode: EmbeddingMode,
}

impl Resources {
    /// Initialise all shared resources for a run.
    ///
    /// `dry_run` swaps the graph store for an in-memory one, so nothing
    /// reaches the database. `use_cache = false` (`--clean`) disables the
    /// embedding cache.
    pub async fn initialize(
        mut config: IngestionConfig,
        embedding_mode: EmbeddingMode,
        use_cache: bool,
        dry_run: bool,
    ) -> Result<Arc<Self>> {
        // Simulated vectors must never share cache keys with real ones.
        if embedding_mode != EmbeddingMode::Real {
            config.embedding.provider = "simulated".to_string();
        }

        let store: Arc<dyn GraphStore> = if dry_run {
            info!("dry run: using in-memory graph store");
            Arc::new(MemoryGraphStore::new())
        } else {
            let uri = config
                .neo4j
                .uri
                .clone()
                .ok_or_else(|| IngestionError::Config("NEO4J_URI is not set".to_string()))?;
            let user = config
                .neo4j
                .user
                .clone()
                .ok_or_else(|| IngestionError::Config("NEO4J_USER is not set".to_string()))?;
            let password = config
                .neo4j
                .password
                .clone()
                .ok_or_else(|| IngestionError::Config("NEO4J_PASSWORD is not set".to_string()))?;
            Arc::new(Neo4jGraphStore::connect(&uri, &user, &password).await?)
        };

        store.ensure_constraints().await?;
        store
            .create_vector_index(&VectorIndexSpec {
                dimensions: config.embedding.dimensions,
                metric: config.embedding.similarity.clone(),
                ..VectorIndexSpec::default()
            })
            .await?;

        let cache = if use_cache {
            if let Some(parent) = config.cache_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let cache =
                SqliteEmbeddingCache::open(&config.cache_path, config.embedding.clone()).await?;
            info!(path = %config.cache_path.display(), "embedding cache enabled");
            Some(Arc::new(cache))
        } else {
            info!("embedding cache disabled (clean mode)");
            None
        };

        let embedder = Arc::new(build_embedder(&config, embedding_mode, cache)?);
        let retriever = Arc::new(DocumentRetriever::new(config.archive_dir.clone()));
        let repository = Arc::new(NormativaRepository::new(store.clone()));

        Ok(Arc::new(Self {
            config,
            store,
            embedder,
            retriever,
            processor: Arc::new(DataProcessor::new()),
            repository,
            embedding_mode,
        }))
    }

    /// Assemble resources from pre-built parts (test seam).
    pub fn with_parts(
        config: IngestionConfig,
        store: Arc<dyn GraphStore>,
        embedder: Arc<Embedder>,
        retriever: Arc<DocumentRetriever>,
        embedding_mode: EmbeddingMode,
    ) -> Arc<Self> {
        let repository = Arc::new(NormativaRepository::new(store.clone()));
        Arc::new(Self {
            config,
            store,
            embedder,
            retriever,
            processor: Arc::new(DataProcessor::new()),
            repository,
            embedding_mode,
        })
    }
}

fn build_embedder(
    config: &IngestionConfig,
    mode: EmbeddingMode,
    cache: Option<Arc<SqliteEmbeddingCache>>,
) -> Result<Embedder> {
    let limiter = Arc::new(SlidingWindowRateLimiter::new(
        config.rate_limit.max_requests,
        config.rate_limit.window,
    ));
    let embedding: EmbeddingConfig = config.embedding.clone();

    let backend: Arc<dyn lexgraph_ai::EmbeddingBackend> = match mode {
        EmbeddingMode::Real => {
            let api_key = config
                .gemini_api_key
                .clone()
                .ok_or_else(|| IngestionError::Config("GEMINI_API_KEY is not set".to_string()))?;
            Arc::new(GeminiBackend::new(api_key, embedding.clone())?)
        }
        EmbeddingMode::Simulated | EmbeddingMode::Skipped => {
            Arc::new(SimulatedBackend::new(embedding.clone()))
        }
    };

    Ok(Embedder::new(backend, cache, limiter, embedding)
        .with_acquire_timeout(config.rate_limit.acquire_timeout))
}
