//! Producer/consumer orchestration across three bounded worker pools.
//!
//! The CPU pool retrieves and parses, the network pool embeds, the disk
//! pool persists and settles each document's context. Queues are bounded
//! `mpsc` channels, so a full downstream queue blocks its producers
//! (back-pressure). A failing document rolls itself back and is recorded in
//! the batch result; the orchestrator never aborts on a single document.
//! After the pools drain, the bulk reference linker runs once over the
//! whole corpus.

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use lexgraph_core::Normativa;

use crate::bulk_linker::BulkReferenceLinker;
use crate::context::IngestionContext;
use crate::pipeline::DocumentPipeline;
use crate::resources::Resources;
use crate::result::{DocumentResult, IngestionBatchResult};

#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    pub cpu_workers: usize,
    pub network_workers: usize,
    pub disk_workers: usize,
    /// Capacity of each inter-pool queue.
    pub queue_capacity: usize,
    /// Skip the final bulk-linking stage (used by graph-only stress runs).
    pub skip_linking: bool,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            cpu_workers: 5,
            network_workers: 20,
            disk_workers: 2,
            queue_capacity: 16,
            skip_linking: false,
        }
    }
}

/// A document between the CPU and network pools.
struct ParsedDocument {
    ctx: IngestionContext,
    normativa: Normativa,
}

/// A document between the network and disk pools.
struct EmbeddedDocument {
    ctx: IngestionContext,
    normativa: Normativa,
}

pub struct IngestionOrchestrator {
    resources: Arc<Resources>,
    pipeline: Arc<DocumentPipeline>,
    options: OrchestratorOptions,
}

impl IngestionOrchestrator {
    pub fn new(resources: Arc<Resources>, options: OrchestratorOptions) -> Self {
        let pipeline = Arc::new(DocumentPipeline::new(resources.clone()));
        Self {
            resources,
            pipeline,
            options,
        }
    }

    /// Ingest all documents, then run the bulk reference linker.
    pub async fn run(
        &self,
        law_ids: Vec<String>,
        cancel: CancellationToken,
    ) -> IngestionBatchResult {
        let start = Instant::now();
        let run_id = uuid::Uuid::new_v4();
        let total = law_ids.len();
        info!(
            %run_id,
            total,
            cpu = self.options.cpu_workers,
            network = self.options.network_workers,
            disk = self.options.disk_workers,
            "batch ingestion started"
        );

        let capacity = self.options.queue_capacity.max(1);
        let (parse_tx, parse_rx) = mpsc::channel::<String>(capacity);
        let (embed_tx, embed_rx) = mpsc::channel::<ParsedDocument>(capacity);
        let (persist_tx, persist_rx) = mpsc::channel::<EmbeddedDocument>(capacity);
        let (result_tx, mut result_rx) = mpsc::unbounded_channel::<DocumentResult>();

        let parse_rx = Arc::new(Mutex::new(parse_rx));
        let embed_rx = Arc::new(Mutex::new(embed_rx));
        let persist_rx = Arc::new(Mutex::new(persist_rx));

        let mut handles = Vec::new();

        // CPU pool: retrieve + parse.
        for _ in 0..self.options.cpu_workers.max(1) {
            let parse_rx = parse_rx.clone();
            let embed_tx = embed_tx.clone();
            let result_tx = result_tx.clone();
            let pipeline = self.pipeline.clone();
            let resources = self.resources.clone();
            handles.push(tokio::spawn(async move {
                loop {
                    let law_id = { parse_rx.lock().await.recv().await };
                    let Some(law_id) = law_id else { break };

                    let mut ctx = IngestionContext::new(
                        &law_id,
                        resources.store.clone(),
                        resources.config.auto_rollback,
                    );

                    let parsed = async {
                        let raw = pipeline.retrieve(&law_id, &mut ctx).await?;
                        pipeline.process(raw, &mut ctx).await
                    }
                    .await;

                    match parsed {
                        Ok((normativa, change_events)) => {
                            tracing::debug!(
                                law_id = %normativa.id,
                                change_events = change_events.len(),
                                "document parsed"
                            );
                            let document = ParsedDocument { ctx, normativa };
                            if embed_tx.send(document).await.is_err() {
                                break;
                            }
                        }
                        Err(_) => {
                            ctx.finish_failed().await;
                            let _ = result_tx.send(ctx.into_document_result());
                        }
                    }
                }
            }));
        }
        drop(embed_tx);

        // Network pool: embed.
        for _ in 0..self.options.network_workers.max(1) {
            let embed_rx = embed_rx.clone();
            let persist_tx = persist_tx.clone();
            let result_tx = result_tx.clone();
            let pipeline = self.pipeline.clone();
            handles.push(tokio::spawn(async move {
                loop {
                    let document = { embed_rx.lock().await.recv().await };
                    let Some(ParsedDocument {
                        mut ctx,
                        mut normativa,
                    }) = document
                    else {
                        break;
                    };

                    match pipeline.embed(&mut normativa, &mut ctx).await {
                        Ok(()) => {
                            let document = EmbeddedDocument { ctx, normativa };
                            if persist_tx.send(document).await.is_err() {
                                break;
                            }
                        }
                        Err(_) => {
                            ctx.finish_failed().await;
                            let _ = result_tx.send(ctx.into_document_result());
                        }
                    }
                }
            }));
        }
        drop(persist_tx);

        // Disk pool: persist + settle the context.
        for _ in 0..self.options.disk_workers.max(1) {
            let persist_rx = persist_rx.clone();
            let result_tx = result_tx.clone();
            let pipeline = self.pipeline.clone();
            handles.push(tokio::spawn(async move {
                loop {
                    let document = { persist_rx.lock().await.recv().await };
                    let Some(EmbeddedDocument { mut ctx, normativa }) = document else {
                        break;
                    };

                    match pipeline.persist(&normativa, &mut ctx).await {
                        Ok(_) => ctx.commit(),
                        Err(_) => ctx.finish_failed().await,
                    }
                    let _ = result_tx.send(ctx.into_document_result());
                }
            }));
        }
        drop(result_tx);

        // Producer: feed document ids until done or cancelled.
        let feeder_cancel = cancel.clone();
        handles.push(tokio::spawn(async move {
            for law_id in law_ids {
                if feeder_cancel.is_cancelled() {
                    warn!("cancellation received, closing input");
                    break;
                }
                if parse_tx.send(law_id).await.is_err() {
                    break;
                }
            }
            // Dropping the sender closes the input channel and lets the
            // pools drain.
        }));

        let mut document_results = Vec::new();
        while let Some(result) = result_rx.recv().await {
            document_results.push(result);
        }
        for handle in handles {
            let _ = handle.await;
        }

        let successful = document_results.iter().filter(|r| r.success).count();
        let failed = document_results.len() - successful;
        let total_nodes: u64 = document_results.iter().map(|r| r.nodes_created).sum();

        // Final stage: link references across the whole corpus.
        let total_reference_links = if self.options.skip_linking || successful == 0 {
            0
        } else {
            let linker = BulkReferenceLinker::new(self.resources.store.clone())
                .with_batch_size(self.resources.config.workers.linker_batch_size)
                .with_workers(self.resources.config.workers.linker_workers)
                .with_unresolved_log(self.resources.config.unresolved_log_path.clone());
            match linker.link_all().await {
                Ok((links, _)) => links,
                Err(e) => {
                    warn!("bulk reference linking failed: {e}");
                    0
                }
            }
        };

        let duration_seconds = start.elapsed().as_secs_f64();
        info!(
            %run_id,
            total,
            successful,
            failed,
            total_nodes,
            total_reference_links,
            duration_seconds,
            "batch ingestion finished"
        );

        IngestionBatchResult {
            total,
            successful,
            failed,
            duration_seconds,
            total_nodes,
            total_reference_links,
            embedding_mode: self.resources.embedding_mode.as_str().to_string(),
            document_results,
        }
    }
}
