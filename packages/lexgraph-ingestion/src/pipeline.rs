//! Single-document pipeline: retrieve → parse → embed → persist.
//!
//! Each step records wall-clock duration and a tracing span, and reports
//! into the document's [`IngestionContext`]. The first failing step is
//! recorded and re-raised; the caller decides commit or rollback.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, info_span, warn, Instrument};

use lexgraph_core::{ChangeEvent, Normativa};
use lexgraph_storage::SaveStats;

use crate::context::IngestionContext;
use crate::embed_step;
use crate::error::{ErrorCategory, IngestionError, Result};
use crate::resources::Resources;
use crate::result::IngestionResult;
use crate::retriever::RawDocument;

pub const STEP_RETRIEVER: &str = "data_retriever";
pub const STEP_PROCESSOR: &str = "data_processor";
pub const STEP_EMBEDDER: &str = "embedding_generator";
pub const STEP_GRAPH: &str = "graph_construction";

/// Output of a completed pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub document_id: String,
    pub stats: SaveStats,
}

pub struct DocumentPipeline {
    resources: Arc<Resources>,
}

impl DocumentPipeline {
    pub fn new(resources: Arc<Resources>) -> Self {
        Self { resources }
    }

    /// Run all four steps for one document, committing on success and
    /// rolling back on failure.
    pub async fn run(&self, law_id: &str) -> IngestionResult {
        let mut ctx = IngestionContext::new(
            law_id,
            self.resources.store.clone(),
            self.resources.config.auto_rollback,
        );

        match self.run_steps(law_id, &mut ctx).await {
            Ok(_) => ctx.commit(),
            Err(_) => ctx.finish_failed().await,
        }
        ctx.into_ingestion_result()
    }

    async fn run_steps(&self, law_id: &str, ctx: &mut IngestionContext) -> Result<PipelineOutcome> {
        let raw = self.retrieve(law_id, ctx).await?;
        let (mut normativa, _events) = self.process(raw, ctx).await?;
        self.embed(&mut normativa, ctx).await?;
        let stats = self.persist(&normativa, ctx).await?;
        Ok(PipelineOutcome {
            document_id: normativa.id,
            stats,
        })
    }

    /// Fetch the raw document. Transient source failures are retried once
    /// before the document is marked failed.
    pub async fn retrieve(&self, law_id: &str, ctx: &mut IngestionContext) -> Result<RawDocument> {
        let retriever = self.resources.retriever.clone();
        let id = law_id.to_string();
        self.timed(ctx, STEP_RETRIEVER, async move {
            match retriever.fetch(&id).await {
                Err(e) if e.category() == ErrorCategory::Transient => {
                    warn!(law_id = %id, "transient retrieval failure, retrying once: {e}");
                    retriever.fetch(&id).await
                }
                other => other,
            }
        })
        .await
    }

    /// Parse the raw content into a typed tree (CPU-bound, runs on the
    /// blocking pool) and detect per-article version changes.
    pub async fn process(
        &self,
        raw: RawDocument,
        ctx: &mut IngestionContext,
    ) -> Result<(Normativa, Vec<ChangeEvent>)> {
        let processor = self.resources.processor.clone();
        self.timed(ctx, STEP_PROCESSOR, async move {
            tokio::task::spawn_blocking(move || processor.process(&raw))
                .await
                .map_err(|e| IngestionError::Parse(format!("parser task failed: {e}")))?
        })
        .await
    }

    /// Populate article embeddings in place.
    pub async fn embed(&self, normativa: &mut Normativa, ctx: &mut IngestionContext) -> Result<()> {
        let stats = self
            .timed(
                ctx,
                STEP_EMBEDDER,
                embed_step::embed_articles(
                    &self.resources.embedder,
                    normativa,
                    self.resources.config.workers.scatter_chunk_size,
                    self.resources.embedding_mode,
                ),
            )
            .await?;
        ctx.add_embedding_counts(stats.generated as u64, stats.from_cache as u64);
        Ok(())
    }

    /// Persist the document tree as one batched merge pair.
    pub async fn persist(
        &self,
        normativa: &Normativa,
        ctx: &mut IngestionContext,
    ) -> Result<SaveStats> {
        let repository = self.resources.repository.clone();
        let stats = self
            .timed(ctx, STEP_GRAPH, async move {
                repository.save(normativa).await.map_err(IngestionError::from)
            })
            .await?;
        ctx.add_graph_counts(stats.nodes_created, stats.edges_created);
        Ok(stats)
    }

    async fn timed<T, F>(&self, ctx: &mut IngestionContext, step: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        ctx.mark_step_started(step);
        info!(step, law_id = %ctx.law_id(), "step started");
        let start = Instant::now();
        let span = info_span!("pipeline_step", step, law_id = %ctx.law_id());
        let result = fut.instrument(span).await;
        let duration = start.elapsed().as_secs_f64();

        match result {
            Ok(value) => {
                ctx.record_step(step, duration);
                info!(step, duration_seconds = duration, "step finished");
                Ok(value)
            }
            Err(e) => {
                ctx.mark_failed(step, &e, duration);
                Err(e)
            }
        }
    }
}
