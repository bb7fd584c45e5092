//! Document-ingestion engine: retrieval, parsing, embedding, persistence
//! and reference linking, orchestrated across three worker pools.

pub mod bulk_linker;
pub mod config;
pub mod context;
pub mod embed_step;
pub mod error;
pub mod orchestrator;
pub mod pipeline;
pub mod processor;
pub mod resources;
pub mod result;
pub mod retriever;

pub use bulk_linker::{BulkReferenceLinker, LinkingStats};
pub use config::{IngestionConfig, WorkerConfig};
pub use context::IngestionContext;
pub use error::{ErrorCategory, IngestionError, Result};
pub use orchestrator::{IngestionOrchestrator, OrchestratorOptions};
pub use pipeline::{DocumentPipeline, PipelineOutcome};
pub use processor::DataProcessor;
pub use resources::{EmbeddingMode, Resources};
pub use result::{
    DocumentResult, IngestionBatchResult, IngestionResult, IngestionStatus, RollbackResult,
    StepResult,
};
pub use retriever::{DocumentRetriever, RawDocument};
