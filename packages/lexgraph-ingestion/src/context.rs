//! Per-document lifecycle: step tracking, counters, commit and rollback.
//!
//! The context travels with its document from pool to pool. On failure the
//! pipeline driver calls [`IngestionContext::finish_failed`], which performs
//! the one-shot auto-rollback; repeated rollbacks are no-ops and rollback
//! errors are swallowed into logs.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use lexgraph_storage::GraphStore;

use crate::error::IngestionError;
use crate::result::{DocumentResult, IngestionResult, IngestionStatus, RollbackResult, StepResult};

pub struct IngestionContext {
    law_id: String,
    store: Arc<dyn GraphStore>,
    auto_rollback: bool,

    committed: bool,
    rolled_back: bool,
    current_step: Option<String>,
    failed_step: Option<String>,
    error_message: Option<String>,
    step_results: Vec<StepResult>,

    nodes_created: u64,
    relationships_created: u64,
    embeddings_generated: u64,
    embeddings_from_cache: u64,

    started_at: DateTime<Utc>,
}

impl IngestionContext {
    pub fn new(law_id: impl Into<String>, store: Arc<dyn GraphStore>, auto_rollback: bool) -> Self {
        let law_id = law_id.into();
        info!(law_id = %law_id, "ingestion started");
        Self {
            law_id,
            store,
            auto_rollback,
            committed: false,
            rolled_back: false,
            current_step: None,
            failed_step: None,
            error_message: None,
            step_results: Vec::new(),
            nodes_created: 0,
            relationships_created: 0,
            embeddings_generated: 0,
            embeddings_from_cache: 0,
            started_at: Utc::now(),
        }
    }

    pub fn law_id(&self) -> &str {
        &self.law_id
    }

    pub fn nodes_created(&self) -> u64 {
        self.nodes_created
    }

    pub fn relationships_created(&self) -> u64 {
        self.relationships_created
    }

    pub fn failed_step(&self) -> Option<&str> {
        self.failed_step.as_deref()
    }

    pub fn was_rolled_back(&self) -> bool {
        self.rolled_back
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    pub fn mark_step_started(&mut self, step_name: &str) {
        self.current_step = Some(step_name.to_string());
    }

    pub fn record_step(&mut self, step_name: &str, duration_seconds: f64) {
        self.step_results.push(StepResult {
            step_name: step_name.to_string(),
            status: "success".to_string(),
            duration_seconds,
            error_message: None,
        });
        self.current_step = None;
    }

    pub fn add_graph_counts(&mut self, nodes: u64, relationships: u64) {
        self.nodes_created += nodes;
        self.relationships_created += relationships;
    }

    pub fn add_embedding_counts(&mut self, generated: u64, from_cache: u64) {
        self.embeddings_generated += generated;
        self.embeddings_from_cache += from_cache;
    }

    pub fn mark_failed(&mut self, step_name: &str, error: &IngestionError, duration_seconds: f64) {
        error!(
            law_id = %self.law_id,
            step = step_name,
            category = error.category().as_str(),
            "step failed: {error}"
        );
        self.step_results.push(StepResult {
            step_name: step_name.to_string(),
            status: "failed".to_string(),
            duration_seconds,
            error_message: Some(error.to_string()),
        });
        self.failed_step = Some(step_name.to_string());
        self.error_message = Some(error.to_string());
        self.current_step = None;
    }

    /// Mark the ingestion as successfully committed, preventing rollback.
    pub fn commit(&mut self) {
        self.committed = true;
        info!(law_id = %self.law_id, "ingestion committed");
    }

    /// Delete the document's content tree and the document node itself,
    /// preserving shared classification nodes. Idempotent.
    pub async fn rollback(&mut self) -> RollbackResult {
        let started_at = Utc::now();
        if self.rolled_back {
            warn!(law_id = %self.law_id, "already rolled back");
            return RollbackResult {
                law_id: self.law_id.clone(),
                success: true,
                started_at,
                completed_at: Some(Utc::now()),
                duration_seconds: 0.0,
                nodes_deleted: 0,
                error_message: Some("already rolled back".to_string()),
            };
        }

        info!(law_id = %self.law_id, "rolling back");
        let start = Instant::now();
        match self.store.delete_document(&self.law_id).await {
            Ok(nodes_deleted) => {
                self.rolled_back = true;
                info!(
                    law_id = %self.law_id,
                    nodes_deleted,
                    "rollback complete"
                );
                RollbackResult {
                    law_id: self.law_id.clone(),
                    success: true,
                    started_at,
                    completed_at: Some(Utc::now()),
                    duration_seconds: start.elapsed().as_secs_f64(),
                    nodes_deleted,
                    error_message: None,
                }
            }
            Err(e) => {
                error!(law_id = %self.law_id, "rollback failed: {e}");
                RollbackResult {
                    law_id: self.law_id.clone(),
                    success: false,
                    started_at,
                    completed_at: Some(Utc::now()),
                    duration_seconds: start.elapsed().as_secs_f64(),
                    nodes_deleted: 0,
                    error_message: Some(e.to_string()),
                }
            }
        }
    }

    /// Failure exit path: perform the one-shot auto-rollback when
    /// configured. Rollback errors are logged, never propagated.
    pub async fn finish_failed(&mut self) {
        if self.auto_rollback && !self.committed && !self.rolled_back {
            let result = self.rollback().await;
            if !result.success {
                error!(
                    law_id = %self.law_id,
                    "auto-rollback failed: {:?}",
                    result.error_message
                );
            }
        }
    }

    pub fn into_document_result(self) -> DocumentResult {
        DocumentResult {
            law_id: self.law_id,
            success: self.committed,
            error_message: self.error_message,
            failed_step: self.failed_step,
            nodes_created: self.nodes_created,
            relationships_created: self.relationships_created,
        }
    }

    pub fn into_ingestion_result(self) -> IngestionResult {
        let status = if self.committed {
            IngestionStatus::Success
        } else if self.rolled_back {
            IngestionStatus::RolledBack
        } else {
            IngestionStatus::Failed
        };
        let completed_at = Utc::now();
        IngestionResult {
            law_id: self.law_id,
            status,
            started_at: self.started_at,
            completed_at: Some(completed_at),
            duration_seconds: (completed_at - self.started_at).num_milliseconds() as f64 / 1000.0,
            step_results: self.step_results,
            failed_step: self.failed_step,
            error_message: self.error_message,
            nodes_created: self.nodes_created,
            relationships_created: self.relationships_created,
            embeddings_generated: self.embeddings_generated,
            embeddings_from_cache: self.embeddings_from_cache,
            was_rolled_back: self.rolled_back,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexgraph_storage::{EdgeRecord, GraphStore, MemoryGraphStore, NodeRecord};
    use serde_json::{json, Map};

    fn node(id: &str, label: &str) -> NodeRecord {
        let mut props = Map::new();
        props.insert("id".to_string(), json!(id));
        NodeRecord::new(vec![label.to_string()], props)
    }

    async fn seed_document(store: &MemoryGraphStore, doc_id: &str) {
        store.merge_node(&node(doc_id, "Normativa")).await.unwrap();
        let article_id = format!("{doc_id}-n1");
        store.merge_node(&node(&article_id, "articulo")).await.unwrap();
        store
            .merge_edge(&EdgeRecord::new(
                article_id,
                "articulo",
                doc_id,
                "Normativa",
                "PART_OF",
            ))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_rollback_deletes_document_tree() {
        let store = Arc::new(MemoryGraphStore::new());
        seed_document(&store, "BOE-A-2000-1").await;
        // A second document shares nothing and must survive.
        seed_document(&store, "BOE-A-2001-2").await;

        let mut ctx = IngestionContext::new("BOE-A-2000-1", store.clone(), true);
        let result = ctx.rollback().await;
        assert!(result.success);
        assert_eq!(result.nodes_deleted, 2);
        assert!(!store.has_node("BOE-A-2000-1"));
        assert!(store.has_node("BOE-A-2001-2"));
        assert!(store.has_node("BOE-A-2001-2-n1"));
    }

    #[tokio::test]
    async fn test_rollback_is_idempotent() {
        let store = Arc::new(MemoryGraphStore::new());
        seed_document(&store, "BOE-A-2000-1").await;

        let mut ctx = IngestionContext::new("BOE-A-2000-1", store.clone(), true);
        assert!(ctx.rollback().await.success);
        let second = ctx.rollback().await;
        assert!(second.success);
        assert_eq!(second.nodes_deleted, 0);
    }

    #[tokio::test]
    async fn test_finish_failed_triggers_auto_rollback() {
        let store = Arc::new(MemoryGraphStore::new());
        seed_document(&store, "BOE-A-2000-1").await;

        let mut ctx = IngestionContext::new("BOE-A-2000-1", store.clone(), true);
        ctx.mark_failed(
            "graph_construction",
            &IngestionError::Parse("boom".to_string()),
            0.1,
        );
        ctx.finish_failed().await;
        assert!(ctx.was_rolled_back());
        assert!(!store.has_node("BOE-A-2000-1"));
    }

    #[tokio::test]
    async fn test_commit_prevents_auto_rollback() {
        let store = Arc::new(MemoryGraphStore::new());
        seed_document(&store, "BOE-A-2000-1").await;

        let mut ctx = IngestionContext::new("BOE-A-2000-1", store.clone(), true);
        ctx.commit();
        ctx.finish_failed().await;
        assert!(!ctx.was_rolled_back());
        assert!(store.has_node("BOE-A-2000-1"));
    }

    #[tokio::test]
    async fn test_result_status_reflects_lifecycle() {
        let store = Arc::new(MemoryGraphStore::new());
        let mut ctx = IngestionContext::new("BOE-A-2000-1", store.clone(), true);
        ctx.record_step("data_retriever", 0.2);
        ctx.mark_failed(
            "data_processor",
            &IngestionError::Parse("bad".to_string()),
            0.1,
        );
        ctx.finish_failed().await;

        let result = ctx.into_ingestion_result();
        assert_eq!(result.status, IngestionStatus::RolledBack);
        assert_eq!(result.failed_step.as_deref(), Some("data_processor"));
        assert_eq!(result.step_results.len(), 2);
        assert!(result.was_rolled_back);
    }
}
