//! Ingestion service CLI.
//!
//! Single document:  lexgraph --law-id BOE-A-1978-31229 [--dry-run]
//! Batch:            lexgraph --batch laws.txt [--simulate] [--skip-embeddings]
//! Rollback:         lexgraph --rollback BOE-A-1978-31229

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use lexgraph_ingestion::{
    DocumentPipeline, EmbeddingMode, IngestionConfig, IngestionContext, IngestionOrchestrator,
    IngestionStatus, OrchestratorOptions, Resources,
};

#[derive(Debug, Parser)]
#[command(
    name = "lexgraph",
    about = "Legal document ingestion service (BOE / EUR-Lex to property graph)"
)]
struct Cli {
    /// Identifier of a single document to ingest (e.g. BOE-A-1978-31229).
    #[arg(long, value_name = "ID")]
    law_id: Option<String>,

    /// File with document ids, one per line, for concurrent ingestion.
    #[arg(long, value_name = "FILE")]
    batch: Option<PathBuf>,

    /// Rollback (delete) a previously ingested document.
    #[arg(long, value_name = "ID")]
    rollback: Option<String>,

    /// Parse only; nothing reaches the database.
    #[arg(long)]
    dry_run: bool,

    /// Disable log output.
    #[arg(long)]
    no_tracing: bool,

    /// Write the result as JSON to this file.
    #[arg(long, value_name = "FILE")]
    output_json: Option<PathBuf>,

    /// Parser workers in batch mode.
    #[arg(long, default_value_t = 5)]
    cpu_workers: usize,

    /// Embedding workers in batch mode.
    #[arg(long, default_value_t = 20)]
    network_workers: usize,

    /// Persistence workers in batch mode.
    #[arg(long, default_value_t = 2)]
    disk_workers: usize,

    /// Articles per scatter-gather embedding chunk.
    #[arg(long, default_value_t = 500)]
    scatter_chunk_size: usize,

    /// Store zero vectors instead of calling the embedding provider.
    #[arg(long)]
    skip_embeddings: bool,

    /// Use deterministic simulated embeddings (no API costs).
    #[arg(long)]
    simulate: bool,

    /// Disable the embedding cache.
    #[arg(long)]
    clean: bool,

    /// Capacity of the inter-pool queues.
    #[arg(long, default_value_t = 16)]
    semaphore: usize,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if !cli.no_tracing {
        let filter = EnvFilter::try_from_env("LEXGRAPH_LOG")
            .unwrap_or_else(|_| EnvFilter::new("info"));
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    if cli.law_id.is_none() && cli.batch.is_none() && cli.rollback.is_none() {
        eprintln!("error: one of --law-id, --batch or --rollback is required");
        return ExitCode::FAILURE;
    }

    let mut config = IngestionConfig::from_env();
    config.workers.scatter_chunk_size = cli.scatter_chunk_size;

    let embedding_mode = if cli.skip_embeddings {
        EmbeddingMode::Skipped
    } else if cli.simulate {
        EmbeddingMode::Simulated
    } else {
        EmbeddingMode::Real
    };

    let resources = match Resources::initialize(config, embedding_mode, !cli.clean, cli.dry_run)
        .await
    {
        Ok(resources) => resources,
        Err(e) => {
            error!("initialization failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Some(law_id) = &cli.rollback {
        return run_rollback(&resources, law_id, cli.output_json.as_deref()).await;
    }
    if let Some(batch_file) = &cli.batch {
        return run_batch(&cli, resources, batch_file).await;
    }
    let law_id = cli.law_id.as_deref().expect("validated above");
    run_single(resources, law_id, cli.output_json.as_deref()).await
}

async fn run_single(
    resources: std::sync::Arc<Resources>,
    law_id: &str,
    output_json: Option<&std::path::Path>,
) -> ExitCode {
    let pipeline = DocumentPipeline::new(resources);
    let result = pipeline.run(law_id).await;

    match result.status {
        IngestionStatus::Success => {
            info!(
                law_id,
                duration_seconds = result.duration_seconds,
                nodes = result.nodes_created,
                relationships = result.relationships_created,
                "ingestion successful"
            );
        }
        IngestionStatus::RolledBack => {
            warn!(
                law_id,
                failed_step = result.failed_step.as_deref().unwrap_or("unknown"),
                error = result.error_message.as_deref().unwrap_or(""),
                "ingestion failed and was rolled back"
            );
        }
        IngestionStatus::Failed => {
            error!(
                law_id,
                error = result.error_message.as_deref().unwrap_or(""),
                "ingestion failed"
            );
        }
    }

    if write_json(output_json, &result).is_err() {
        return ExitCode::FAILURE;
    }
    match result.status {
        IngestionStatus::Success => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    }
}

async fn run_batch(
    cli: &Cli,
    resources: std::sync::Arc<Resources>,
    batch_file: &std::path::Path,
) -> ExitCode {
    let law_ids: Vec<String> = match std::fs::read_to_string(batch_file) {
        Ok(content) => content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect(),
        Err(e) => {
            error!(file = %batch_file.display(), "could not read batch file: {e}");
            return ExitCode::FAILURE;
        }
    };
    info!(count = law_ids.len(), file = %batch_file.display(), "batch ids loaded");

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, draining in-flight documents");
            signal_cancel.cancel();
        }
    });

    let orchestrator = IngestionOrchestrator::new(
        resources,
        OrchestratorOptions {
            cpu_workers: cli.cpu_workers,
            network_workers: cli.network_workers,
            disk_workers: cli.disk_workers,
            queue_capacity: cli.semaphore,
            skip_linking: false,
        },
    );
    let result = orchestrator.run(law_ids, cancel).await;

    info!(
        successful = result.successful,
        total = result.total,
        nodes = result.total_nodes,
        reference_links = result.total_reference_links,
        duration_seconds = result.duration_seconds,
        "batch complete"
    );
    for document in result.document_results.iter().filter(|d| !d.success) {
        warn!(
            law_id = %document.law_id,
            failed_step = document.failed_step.as_deref().unwrap_or("unknown"),
            error = document.error_message.as_deref().unwrap_or(""),
            "document failed"
        );
    }

    if write_json(cli.output_json.as_deref(), &result).is_err() {
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

async fn run_rollback(
    resources: &std::sync::Arc<Resources>,
    law_id: &str,
    output_json: Option<&std::path::Path>,
) -> ExitCode {
    let mut ctx = IngestionContext::new(law_id, resources.store.clone(), false);
    let result = ctx.rollback().await;

    if result.success {
        info!(law_id, nodes_deleted = result.nodes_deleted, "rollback successful");
    } else {
        error!(
            law_id,
            error = result.error_message.as_deref().unwrap_or(""),
            "rollback failed"
        );
    }

    if write_json(output_json, &result).is_err() {
        return ExitCode::FAILURE;
    }
    if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn write_json<T: serde::Serialize>(
    path: Option<&std::path::Path>,
    value: &T,
) -> std::io::Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).map_err(|e| {
        error!(path = %path.display(), "could not write result file: {e}");
        e
    })?;
    info!(path = %path.display(), "result written");
    Ok(())
}
