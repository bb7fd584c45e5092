//! Result types for ingestion and rollback operations (stable JSON shape).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestionStatus {
    Success,
    Failed,
    RolledBack,
}

/// Result of a single pipeline step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step_name: String,
    pub status: String,
    pub duration_seconds: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Result of ingesting one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionResult {
    pub law_id: String,
    pub status: IngestionStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_seconds: f64,
    pub step_results: Vec<StepResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub nodes_created: u64,
    pub relationships_created: u64,
    pub embeddings_generated: u64,
    pub embeddings_from_cache: u64,
    pub was_rolled_back: bool,
}

/// Result of a rollback operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackResult {
    pub law_id: String,
    pub success: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_seconds: f64,
    pub nodes_deleted: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// One document's row inside a batch result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentResult {
    pub law_id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<String>,
    pub nodes_created: u64,
    pub relationships_created: u64,
}

/// Aggregate result of a batch ingestion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionBatchResult {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub duration_seconds: f64,
    pub total_nodes: u64,
    pub total_reference_links: u64,
    /// How article vectors were produced: `real`, `simulated` or `skipped`.
    pub embedding_mode: String,
    pub document_results: Vec<DocumentResult>,
}
