//! Graph-store port trait and the record types that cross it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Result;

/// A node upsert: labels plus a property map keyed by `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    pub labels: Vec<String>,
    pub props: Map<String, Value>,
}

impl NodeRecord {
    pub fn new(labels: Vec<String>, props: Map<String, Value>) -> Self {
        Self { labels, props }
    }

    pub fn id(&self) -> Option<&str> {
        self.props.get("id").and_then(Value::as_str)
    }
}

/// An edge upsert between two nodes identified by id and label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub from_id: String,
    pub from_label: String,
    pub to_id: String,
    pub to_label: String,
    pub rel_type: String,
    pub props: Map<String, Value>,
}

impl EdgeRecord {
    pub fn new(
        from_id: impl Into<String>,
        from_label: impl Into<String>,
        to_id: impl Into<String>,
        to_label: impl Into<String>,
        rel_type: impl Into<String>,
    ) -> Self {
        Self {
            from_id: from_id.into(),
            from_label: from_label.into(),
            to_id: to_id.into(),
            to_label: to_label.into(),
            rel_type: rel_type.into(),
            props: Map::new(),
        }
    }

    pub fn with_props(mut self, props: Map<String, Value>) -> Self {
        self.props = props;
        self
    }
}

/// One article as fetched for bulk reference linking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleRow {
    pub id: String,
    pub name: String,
    pub full_text: String,
    pub fecha_vigencia: Option<String>,
    pub document_id: String,
}

/// A vector-search hit with its similarity score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub article_id: String,
    pub score: f64,
}

/// Parameters of the article-embedding vector index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndexSpec {
    pub name: String,
    pub label: String,
    pub property: String,
    pub dimensions: usize,
    pub metric: String,
}

impl Default for VectorIndexSpec {
    fn default() -> Self {
        Self {
            name: "article_embeddings".to_string(),
            label: "articulo".to_string(),
            property: "embedding".to_string(),
            dimensions: 768,
            metric: "cosine".to_string(),
        }
    }
}

/// Typed surface over the property graph.
///
/// Batch operations either fully commit or fully fail; no partial
/// visibility. Index lifecycle operations are idempotent.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Upsert one node by `props.id`.
    async fn merge_node(&self, record: &NodeRecord) -> Result<()>;

    /// Upsert one edge between existing nodes.
    async fn merge_edge(&self, record: &EdgeRecord) -> Result<()>;

    /// Upsert a batch of nodes in a single round-trip. Returns the number
    /// of records committed.
    async fn batch_merge_nodes(&self, records: &[NodeRecord]) -> Result<u64>;

    /// Upsert a batch of edges in a single round-trip. Edges whose
    /// endpoints are missing are not created.
    async fn batch_merge_edges(&self, records: &[EdgeRecord]) -> Result<u64>;

    /// Page over persisted articles (ordered by id) with their document
    /// context, for the bulk reference linker.
    async fn fetch_article_page(&self, offset: u64, limit: u64) -> Result<Vec<ArticleRow>>;

    /// Find the article of `document_id` with the given clean number that
    /// is temporally valid at `at_date` (`YYYYMMDD`; `None` skips the
    /// validity check). Returns the newest matching article id.
    async fn find_article(
        &self,
        document_id: &str,
        clean_number: &str,
        at_date: Option<&str>,
    ) -> Result<Option<String>>;

    async fn document_exists(&self, document_id: &str) -> Result<bool>;

    /// Delete every node reachable from the document via `PART_OF`, then
    /// the document node itself. Shared classification nodes survive.
    /// Returns the number of nodes deleted.
    async fn delete_document(&self, document_id: &str) -> Result<u64>;

    /// Number of `PART_OF` edges pointing at the document.
    async fn count_part_of(&self, document_id: &str) -> Result<u64>;

    /// Create unique-id constraints and the clean-number lookup index.
    async fn ensure_constraints(&self) -> Result<()>;

    async fn create_vector_index(&self, spec: &VectorIndexSpec) -> Result<()>;

    async fn drop_vector_index(&self, name: &str) -> Result<()>;

    async fn vector_search(
        &self,
        embedding: &[f32],
        top_k: usize,
        index_name: &str,
    ) -> Result<Vec<SearchHit>>;
}
