//! Bulk reference linking, run after every document of a batch has been
//! persisted.
//!
//! Linking after the graph build means every potential target already
//! exists, cross-document references resolve, and edges land in large
//! batches instead of per-article writes. Articles are processed in chunks
//! across a bounded set of workers; each chunk flushes its edges with a
//! single batched merge, so re-running over the same corpus produces the
//! same edge set.

use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use lexgraph_core::services::reference_extractor::{
    ExtractedReference, ReferenceExtractor, ReferenceType,
};
use lexgraph_core::utils::spanish_numbers::normalize_article_number;
use lexgraph_storage::{ArticleRow, EdgeRecord, GraphStore};

use crate::error::Result;

const REL_REFERS_TO: &str = "REFERS_TO";
const REL_DEROGATES: &str = "DEROGATES";
const REL_MODIFIES: &str = "MODIFIES";

static LEADING_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("number pattern"));

/// Statistics from a bulk linking run.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkingStats {
    pub articles_processed: usize,
    pub references_found: usize,
    pub internal_links_created: usize,
    pub external_links_created: usize,
    pub unresolved_references: usize,
}

impl LinkingStats {
    fn merge(&mut self, other: LinkingStats) {
        self.articles_processed += other.articles_processed;
        self.references_found += other.references_found;
        self.internal_links_created += other.internal_links_created;
        self.external_links_created += other.external_links_created;
        self.unresolved_references += other.unresolved_references;
    }
}

pub struct BulkReferenceLinker {
    store: Arc<dyn GraphStore>,
    batch_size: u64,
    workers: usize,
    unresolved_log_path: Option<PathBuf>,
    extractor: Arc<ReferenceExtractor>,
    /// Document-existence answers, shared across chunks.
    document_cache: Arc<DashMap<String, bool>>,
}

impl BulkReferenceLinker {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self {
            store,
            batch_size: 5000,
            workers: 6,
            unresolved_log_path: None,
            extractor: Arc::new(ReferenceExtractor::new()),
            document_cache: Arc::new(DashMap::new()),
        }
    }

    pub fn with_batch_size(mut self, batch_size: u64) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_unresolved_log(mut self, path: PathBuf) -> Self {
        self.unresolved_log_path = Some(path);
        self
    }

    /// Scan all persisted articles and create reference edges. Returns the
    /// number of links created plus run statistics.
    pub async fn link_all(&self) -> Result<(u64, LinkingStats)> {
        info!(workers = self.workers, batch_size = self.batch_size, "bulk linking started");

        // Fetch all chunks up front; the page set is stable while linking.
        let mut chunks = Vec::new();
        let mut offset = 0u64;
        loop {
            let page = self.store.fetch_article_page(offset, self.batch_size).await?;
            if page.is_empty() {
                break;
            }
            offset += page.len() as u64;
            chunks.push(page);
        }
        if chunks.is_empty() {
            info!("no articles to link");
            return Ok((0, LinkingStats::default()));
        }
        info!(chunks = chunks.len(), articles = offset, "fetched article chunks");

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut handles = Vec::new();
        for (index, chunk) in chunks.into_iter().enumerate() {
            let semaphore = semaphore.clone();
            let store = self.store.clone();
            let extractor = self.extractor.clone();
            let document_cache = self.document_cache.clone();
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore open");
                let result =
                    process_chunk(store, extractor, document_cache, &chunk).await;
                (index, result)
            }));
        }

        let mut total_links = 0u64;
        let mut stats = LinkingStats::default();
        let mut unresolved_entries: Vec<Value> = Vec::new();
        for handle in handles {
            match handle.await {
                Ok((index, Ok((links, chunk_stats, unresolved)))) => {
                    total_links += links;
                    stats.merge(chunk_stats);
                    unresolved_entries.extend(unresolved);
                    info!(chunk = index + 1, links, "chunk linked");
                }
                Ok((index, Err(e))) => {
                    error!(chunk = index + 1, "chunk linking failed: {e}");
                }
                Err(e) => {
                    error!("chunk task failed: {e}");
                }
            }
        }

        if let Some(path) = &self.unresolved_log_path {
            if !unresolved_entries.is_empty() {
                if let Err(e) = append_unresolved_log(path, &unresolved_entries) {
                    warn!(path = %path.display(), "could not write unresolved log: {e}");
                }
            }
        }

        info!(
            articles = stats.articles_processed,
            references = stats.references_found,
            links = total_links,
            unresolved = stats.unresolved_references,
            "bulk linking complete"
        );
        Ok((total_links, stats))
    }
}

async fn process_chunk(
    store: Arc<dyn GraphStore>,
    extractor: Arc<ReferenceExtractor>,
    document_cache: Arc<DashMap<String, bool>>,
    articles: &[ArticleRow],
) -> Result<(u64, LinkingStats, Vec<Value>)> {
    let mut stats = LinkingStats::default();
    let mut edges: Vec<EdgeRecord> = Vec::new();
    let mut unresolved_entries: Vec<Value> = Vec::new();

    for article in articles {
        stats.articles_processed += 1;
        if article.full_text.is_empty() {
            continue;
        }

        let current_number = LEADING_NUMBER
            .find(&article.name)
            .map(|m| m.as_str().to_string());
        let extraction = extractor.extract(
            &article.full_text,
            &article.id,
            Some(&article.document_id),
            current_number.as_deref(),
        );

        stats.references_found += extraction.references.len();
        stats.unresolved_references += extraction.unresolved_references.len();
        for reference in &extraction.unresolved_references {
            unresolved_entries.push(json!({
                "source_document": article.id,
                "extraction_time": extraction.extraction_timestamp,
                "reference": reference,
            }));
        }

        for reference in &extraction.references {
            if let Some(edge) = build_reference_edge(
                &store,
                &document_cache,
                article,
                reference,
            )
            .await?
            {
                if reference.is_external {
                    stats.external_links_created += 1;
                } else {
                    stats.internal_links_created += 1;
                }
                edges.push(edge);
            }
        }
    }

    let links = store.batch_merge_edges(&edges).await?;
    Ok((links, stats, unresolved_entries))
}

/// Build the edge for one reference, or `None` when it cannot be resolved
/// to an existing target.
async fn build_reference_edge(
    store: &Arc<dyn GraphStore>,
    document_cache: &DashMap<String, bool>,
    article: &ArticleRow,
    reference: &ExtractedReference,
) -> Result<Option<EdgeRecord>> {
    if reference.reference_type == ReferenceType::Judicial {
        return Ok(None);
    }

    let mut target: Option<(String, &'static str)> = None;

    if !reference.is_external {
        if let Some(number) = reference.article_number.as_deref() {
            if !matches!(number, "anterior" | "siguiente" | "precedente") {
                let clean = clean_article_number(number);
                if let Some(id) = store
                    .find_article(
                        &article.document_id,
                        &clean,
                        article.fecha_vigencia.as_deref(),
                    )
                    .await?
                {
                    target = Some((id, "articulo"));
                }
            }
        }
    } else if let Some(resolved) = reference.resolved_doc_id.as_deref() {
        if let Some(number) = reference.article_number.as_deref() {
            let clean = clean_article_number(number);
            if let Some(id) = store
                .find_article(resolved, &clean, article.fecha_vigencia.as_deref())
                .await?
            {
                target = Some((id, "articulo"));
            }
        }
        if target.is_none() && document_exists(store, document_cache, resolved).await? {
            // Fall back to the document itself.
            target = Some((resolved.to_string(), "Normativa"));
        }
    }

    let Some((target_id, target_label)) = target else {
        return Ok(None);
    };

    let mut props = Map::new();
    props.insert(
        "raw_citation".to_string(),
        json!(reference.raw_text.chars().take(200).collect::<String>()),
    );
    Ok(Some(
        EdgeRecord::new(
            article.id.clone(),
            "articulo",
            target_id,
            target_label,
            relationship_type(reference),
        )
        .with_props(props),
    ))
}

async fn document_exists(
    store: &Arc<dyn GraphStore>,
    cache: &DashMap<String, bool>,
    document_id: &str,
) -> Result<bool> {
    if let Some(known) = cache.get(document_id) {
        return Ok(*known);
    }
    let exists = store.document_exists(document_id).await?;
    cache.insert(document_id.to_string(), exists);
    Ok(exists)
}

/// Normalize a cited article number to the persisted clean-number format.
fn clean_article_number(number: &str) -> String {
    let trimmed = number.trim().trim_end_matches(['º', 'ª']);
    normalize_article_number(trimmed).unwrap_or_else(|| trimmed.to_string())
}

/// Edge type by citation context keyword.
fn relationship_type(reference: &ExtractedReference) -> &'static str {
    let raw = reference.raw_text.to_lowercase();
    if raw.contains("deroga") {
        REL_DEROGATES
    } else if raw.contains("modifica") {
        REL_MODIFIES
    } else {
        REL_REFERS_TO
    }
}

/// Append unresolved references to the JSON debug log.
fn append_unresolved_log(path: &PathBuf, entries: &[Value]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut data: Value = match std::fs::read_to_string(path) {
        Ok(text) => serde_json::from_str(&text).unwrap_or_else(|_| json!({"unresolved": []})),
        Err(_) => json!({"unresolved": []}),
    };
    if let Some(list) = data
        .get_mut("unresolved")
        .and_then(Value::as_array_mut)
    {
        list.extend(entries.iter().cloned());
    }
    std::fs::write(path, serde_json::to_string_pretty(&data)?)
}
