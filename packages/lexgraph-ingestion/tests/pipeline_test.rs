//! End-to-end pipeline tests against the in-memory graph store and the
//! simulated embedding backend.

mod common;

use async_trait::async_trait;
use serde_json::{json, Map};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use lexgraph_ingestion::{DocumentPipeline, IngestionStatus};
use lexgraph_storage::{
    ArticleRow, EdgeRecord, GraphStore, MemoryGraphStore, NodeRecord, SearchHit, StorageError,
    VectorIndexSpec,
};

use common::{boe_payload, test_resources, write_fixture};

#[tokio::test]
async fn test_three_article_document_ingests_successfully() {
    let archive = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    write_fixture(
        archive.path(),
        "BOE-A-2000-1",
        &boe_payload("BOE-A-2000-1", &[("1", &[]), ("2", &[]), ("3", &[])]),
    );

    let store = Arc::new(MemoryGraphStore::new());
    let resources = test_resources(store.clone(), archive.path(), scratch.path());
    let pipeline = DocumentPipeline::new(resources);

    let result = pipeline.run("BOE-A-2000-1").await;

    assert_eq!(result.status, IngestionStatus::Success);
    // One Normativa node plus three articles.
    assert_eq!(result.nodes_created, 4);
    // At least one PART_OF edge per article.
    assert!(result.relationships_created >= 3);
    assert_eq!(result.step_results.len(), 4);
    assert!(result.step_results.iter().all(|s| s.status == "success"));
    assert!(!result.was_rolled_back);

    // Every persisted article carries exactly one PART_OF to its document.
    assert_eq!(store.edges_of_type("PART_OF").len(), 3);
    assert!(store.has_node("BOE-A-2000-1"));
}

#[tokio::test]
async fn test_articles_receive_embeddings_of_configured_dimension() {
    let archive = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    write_fixture(
        archive.path(),
        "BOE-A-2000-2",
        &boe_payload("BOE-A-2000-2", &[("1", &["Contenido uno."])]),
    );

    let store = Arc::new(MemoryGraphStore::new());
    let resources = test_resources(store.clone(), archive.path(), scratch.path());
    let pipeline = DocumentPipeline::new(resources);

    let result = pipeline.run("BOE-A-2000-2").await;
    assert_eq!(result.status, IngestionStatus::Success);
    assert_eq!(result.embeddings_generated, 1);

    let article_edge = store
        .edges_of_type("PART_OF")
        .into_iter()
        .find(|e| e.from_label == "articulo")
        .expect("article PART_OF edge");
    let embedding = store
        .node_prop(&article_edge.from_id, "embedding")
        .expect("article should carry an embedding");
    assert_eq!(embedding.as_array().unwrap().len(), common::DIMS);
}

#[tokio::test]
async fn test_double_ingestion_is_idempotent() {
    let archive = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    write_fixture(
        archive.path(),
        "BOE-A-2000-3",
        &boe_payload("BOE-A-2000-3", &[("1", &["Texto."]), ("2", &["Texto."])]),
    );

    let store = Arc::new(MemoryGraphStore::new());
    let resources = test_resources(store.clone(), archive.path(), scratch.path());
    let pipeline = DocumentPipeline::new(resources);

    assert_eq!(
        pipeline.run("BOE-A-2000-3").await.status,
        IngestionStatus::Success
    );
    let nodes_before = store.node_count();
    let edges_before = store.edge_count();

    assert_eq!(
        pipeline.run("BOE-A-2000-3").await.status,
        IngestionStatus::Success
    );
    assert_eq!(store.node_count(), nodes_before);
    assert_eq!(store.edge_count(), edges_before);
}

#[tokio::test]
async fn test_missing_document_fails_without_side_effects() {
    let archive = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    // Malformed fixture: the processor rejects payloads without data.
    std::fs::write(archive.path().join("BOE-A-2000-4.json"), "{}").unwrap();

    let store = Arc::new(MemoryGraphStore::new());
    let resources = test_resources(store.clone(), archive.path(), scratch.path());
    let pipeline = DocumentPipeline::new(resources);

    let result = pipeline.run("BOE-A-2000-4").await;
    assert_ne!(result.status, IngestionStatus::Success);
    assert_eq!(result.failed_step.as_deref(), Some("data_processor"));
    assert_eq!(store.node_count(), 0);
}

/// Store wrapper that rejects node batches on demand, failing the
/// `graph_construction` step after parsing and embedding succeed.
struct FailingStore {
    inner: MemoryGraphStore,
    fail_batches: AtomicBool,
}

#[async_trait]
impl GraphStore for FailingStore {
    async fn merge_node(&self, record: &NodeRecord) -> lexgraph_storage::Result<()> {
        self.inner.merge_node(record).await
    }

    async fn merge_edge(&self, record: &EdgeRecord) -> lexgraph_storage::Result<()> {
        self.inner.merge_edge(record).await
    }

    async fn batch_merge_nodes(&self, records: &[NodeRecord]) -> lexgraph_storage::Result<u64> {
        if self.fail_batches.load(Ordering::SeqCst) {
            return Err(StorageError::Constraint("injected failure".to_string()));
        }
        self.inner.batch_merge_nodes(records).await
    }

    async fn batch_merge_edges(&self, records: &[EdgeRecord]) -> lexgraph_storage::Result<u64> {
        self.inner.batch_merge_edges(records).await
    }

    async fn fetch_article_page(
        &self,
        offset: u64,
        limit: u64,
    ) -> lexgraph_storage::Result<Vec<ArticleRow>> {
        self.inner.fetch_article_page(offset, limit).await
    }

    async fn find_article(
        &self,
        document_id: &str,
        clean_number: &str,
        at_date: Option<&str>,
    ) -> lexgraph_storage::Result<Option<String>> {
        self.inner.find_article(document_id, clean_number, at_date).await
    }

    async fn document_exists(&self, document_id: &str) -> lexgraph_storage::Result<bool> {
        self.inner.document_exists(document_id).await
    }

    async fn delete_document(&self, document_id: &str) -> lexgraph_storage::Result<u64> {
        self.inner.delete_document(document_id).await
    }

    async fn count_part_of(&self, document_id: &str) -> lexgraph_storage::Result<u64> {
        self.inner.count_part_of(document_id).await
    }

    async fn ensure_constraints(&self) -> lexgraph_storage::Result<()> {
        self.inner.ensure_constraints().await
    }

    async fn create_vector_index(&self, spec: &VectorIndexSpec) -> lexgraph_storage::Result<()> {
        self.inner.create_vector_index(spec).await
    }

    async fn drop_vector_index(&self, name: &str) -> lexgraph_storage::Result<()> {
        self.inner.drop_vector_index(name).await
    }

    async fn vector_search(
        &self,
        embedding: &[f32],
        top_k: usize,
        index_name: &str,
    ) -> lexgraph_storage::Result<Vec<SearchHit>> {
        self.inner.vector_search(embedding, top_k, index_name).await
    }
}

#[tokio::test]
async fn test_graph_construction_failure_rolls_back() {
    let archive = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    write_fixture(
        archive.path(),
        "BOE-A-2000-5",
        &boe_payload("BOE-A-2000-5", &[("1", &["Texto."])]),
    );

    let failing = Arc::new(FailingStore {
        inner: MemoryGraphStore::new(),
        fail_batches: AtomicBool::new(false),
    });

    // Classification node from earlier ingestion of another document.
    let mut props = Map::new();
    props.insert("id".to_string(), json!("materia:sanidad"));
    failing
        .inner
        .merge_node(&NodeRecord::new(vec!["Materia".to_string()], props))
        .await
        .unwrap();

    failing.fail_batches.store(true, Ordering::SeqCst);

    let resources = test_resources(failing.clone(), archive.path(), scratch.path());
    let pipeline = DocumentPipeline::new(resources);
    let result = pipeline.run("BOE-A-2000-5").await;

    assert_eq!(result.status, IngestionStatus::RolledBack);
    assert!(result.was_rolled_back);
    assert_eq!(result.failed_step.as_deref(), Some("graph_construction"));

    let retriever_ok = result
        .step_results
        .iter()
        .find(|s| s.step_name == "data_processor")
        .unwrap();
    assert_eq!(retriever_ok.status, "success");

    // The document never became visible, and the pre-existing shared
    // classification node survived the rollback.
    assert!(!failing.inner.has_node("BOE-A-2000-5"));
    assert!(failing.inner.has_node("materia:sanidad"));
}
