//! In-memory [`GraphStore`] used by the test suite.
//!
//! Mirrors the adapter semantics that matter to callers: upsert by id,
//! all-or-nothing batches, edges only between existing nodes, cascade
//! delete over `PART_OF`, and temporal article lookup.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

use crate::domain::{ArticleRow, EdgeRecord, GraphStore, NodeRecord, SearchHit, VectorIndexSpec};
use crate::error::{Result, StorageError};

#[derive(Debug, Clone)]
struct StoredNode {
    labels: Vec<String>,
    props: Map<String, Value>,
}

#[derive(Default)]
struct State {
    nodes: HashMap<String, StoredNode>,
    edges: Vec<EdgeRecord>,
    indexes: HashSet<String>,
}

#[derive(Default)]
pub struct MemoryGraphStore {
    state: Mutex<State>,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.state.lock().nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.state.lock().edges.len()
    }

    pub fn has_node(&self, id: &str) -> bool {
        self.state.lock().nodes.contains_key(id)
    }

    pub fn node_labels(&self, id: &str) -> Option<Vec<String>> {
        self.state.lock().nodes.get(id).map(|n| n.labels.clone())
    }

    pub fn node_prop(&self, id: &str, key: &str) -> Option<Value> {
        self.state.lock().nodes.get(id).and_then(|n| n.props.get(key).cloned())
    }

    pub fn has_index(&self, name: &str) -> bool {
        self.state.lock().indexes.contains(name)
    }

    pub fn edges_of_type(&self, rel_type: &str) -> Vec<EdgeRecord> {
        self.state
            .lock()
            .edges
            .iter()
            .filter(|e| e.rel_type == rel_type)
            .cloned()
            .collect()
    }

    fn record_id(record: &NodeRecord) -> Result<String> {
        record
            .id()
            .map(str::to_string)
            .ok_or_else(|| StorageError::InvalidRecord("node record without id".to_string()))
    }

    /// Ids of all nodes reachable from the document via `PART_OF`.
    fn content_node_ids(state: &State, document_id: &str) -> HashSet<String> {
        // PART_OF edges always point at the document directly, but resolve
        // transitively so manually inserted chains also cascade.
        let mut reachable: HashSet<String> = HashSet::new();
        let mut frontier: HashSet<String> = HashSet::from([document_id.to_string()]);
        while !frontier.is_empty() {
            let next: HashSet<String> = state
                .edges
                .iter()
                .filter(|e| e.rel_type == "PART_OF" && frontier.contains(&e.to_id))
                .map(|e| e.from_id.clone())
                .filter(|id| !reachable.contains(id))
                .collect();
            reachable.extend(frontier.drain());
            frontier = next;
        }
        reachable.remove(document_id);
        reachable
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn merge_node(&self, record: &NodeRecord) -> Result<()> {
        let id = Self::record_id(record)?;
        let mut state = self.state.lock();
        upsert_node(&mut state.nodes, id, record);
        Ok(())
    }

    async fn merge_edge(&self, record: &EdgeRecord) -> Result<()> {
        let mut state = self.state.lock();
        if !state.nodes.contains_key(&record.from_id) || !state.nodes.contains_key(&record.to_id) {
            return Ok(());
        }
        let exists = state.edges.iter().any(|e| {
            e.from_id == record.from_id && e.to_id == record.to_id && e.rel_type == record.rel_type
        });
        if !exists {
            state.edges.push(record.clone());
        }
        Ok(())
    }

    async fn batch_merge_nodes(&self, records: &[NodeRecord]) -> Result<u64> {
        // Validate the whole batch before touching state: all-or-nothing.
        let mut ids = Vec::with_capacity(records.len());
        for record in records {
            ids.push(Self::record_id(record)?);
        }
        let mut state = self.state.lock();
        for (record, id) in records.iter().zip(ids) {
            upsert_node(&mut state.nodes, id, record);
        }
        Ok(records.len() as u64)
    }

    async fn batch_merge_edges(&self, records: &[EdgeRecord]) -> Result<u64> {
        let mut created = 0u64;
        let mut state = self.state.lock();
        for record in records {
            if !state.nodes.contains_key(&record.from_id)
                || !state.nodes.contains_key(&record.to_id)
            {
                continue;
            }
            let exists = state.edges.iter().any(|e| {
                e.from_id == record.from_id
                    && e.to_id == record.to_id
                    && e.rel_type == record.rel_type
            });
            if !exists {
                state.edges.push(record.clone());
                created += 1;
            }
        }
        Ok(created)
    }

    async fn fetch_article_page(&self, offset: u64, limit: u64) -> Result<Vec<ArticleRow>> {
        let state = self.state.lock();
        let mut rows: Vec<ArticleRow> = state
            .nodes
            .iter()
            .filter(|(_, node)| node.labels.iter().any(|l| l == "articulo"))
            .filter_map(|(id, node)| {
                let full_text = node.props.get("full_text")?.as_str()?.to_string();
                let document_id = state
                    .edges
                    .iter()
                    .find(|e| e.rel_type == "PART_OF" && &e.from_id == id)
                    .map(|e| e.to_id.clone())?;
                Some(ArticleRow {
                    id: id.clone(),
                    name: node
                        .props
                        .get("name")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    full_text,
                    fecha_vigencia: node
                        .props
                        .get("fecha_vigencia")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    document_id,
                })
            })
            .collect();
        rows.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(rows
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn find_article(
        &self,
        document_id: &str,
        clean_number: &str,
        at_date: Option<&str>,
    ) -> Result<Option<String>> {
        let state = self.state.lock();
        let mut candidates: Vec<(&String, Option<&str>)> = state
            .nodes
            .iter()
            .filter(|(id, node)| {
                node.labels.iter().any(|l| l == "articulo")
                    && node.props.get("clean_number").and_then(Value::as_str) == Some(clean_number)
                    && state.edges.iter().any(|e| {
                        e.rel_type == "PART_OF" && &e.from_id == *id && e.to_id == document_id
                    })
            })
            .map(|(id, node)| (id, node.props.get("fecha_vigencia").and_then(Value::as_str)))
            .filter(|(_, vigencia)| match at_date {
                None => true,
                Some(at) => matches!(vigencia, Some(v) if *v <= at),
            })
            .collect();
        // Temporal upper bound: fecha_caducidad must be null or after the
        // referencing date.
        if let Some(at) = at_date {
            candidates.retain(|(id, _)| {
                match state
                    .nodes
                    .get(*id)
                    .and_then(|n| n.props.get("fecha_caducidad"))
                    .and_then(Value::as_str)
                {
                    Some(caducidad) => at < caducidad,
                    None => true,
                }
            });
        }
        candidates.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(candidates.first().map(|(id, _)| (*id).clone()))
    }

    async fn document_exists(&self, document_id: &str) -> Result<bool> {
        let state = self.state.lock();
        Ok(state
            .nodes
            .get(document_id)
            .map(|n| n.labels.iter().any(|l| l == "Normativa"))
            .unwrap_or(false))
    }

    async fn delete_document(&self, document_id: &str) -> Result<u64> {
        let mut state = self.state.lock();
        let mut to_delete = Self::content_node_ids(&state, document_id);
        if state.nodes.contains_key(document_id) {
            to_delete.insert(document_id.to_string());
        }
        let deleted = to_delete.iter().filter(|id| state.nodes.contains_key(*id)).count() as u64;
        state.nodes.retain(|id, _| !to_delete.contains(id));
        state
            .edges
            .retain(|e| !to_delete.contains(&e.from_id) && !to_delete.contains(&e.to_id));
        Ok(deleted)
    }

    async fn count_part_of(&self, document_id: &str) -> Result<u64> {
        let state = self.state.lock();
        Ok(state
            .edges
            .iter()
            .filter(|e| e.rel_type == "PART_OF" && e.to_id == document_id)
            .count() as u64)
    }

    async fn ensure_constraints(&self) -> Result<()> {
        Ok(())
    }

    async fn create_vector_index(&self, spec: &VectorIndexSpec) -> Result<()> {
        self.state.lock().indexes.insert(spec.name.clone());
        Ok(())
    }

    async fn drop_vector_index(&self, name: &str) -> Result<()> {
        self.state.lock().indexes.remove(name);
        Ok(())
    }

    async fn vector_search(
        &self,
        embedding: &[f32],
        top_k: usize,
        _index_name: &str,
    ) -> Result<Vec<SearchHit>> {
        let state = self.state.lock();
        let mut hits: Vec<SearchHit> = state
            .nodes
            .iter()
            .filter(|(_, node)| node.labels.iter().any(|l| l == "articulo"))
            .filter_map(|(id, node)| {
                let stored: Vec<f32> = node
                    .props
                    .get("embedding")?
                    .as_array()?
                    .iter()
                    .filter_map(|v| v.as_f64().map(|f| f as f32))
                    .collect();
                if stored.len() != embedding.len() {
                    return None;
                }
                Some(SearchHit {
                    article_id: id.clone(),
                    score: cosine(embedding, &stored),
                })
            })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top_k);
        Ok(hits)
    }
}

fn upsert_node(nodes: &mut HashMap<String, StoredNode>, id: String, record: &NodeRecord) {
    match nodes.entry(id) {
        std::collections::hash_map::Entry::Occupied(mut entry) => {
            entry.get_mut().props.extend(record.props.clone());
        }
        std::collections::hash_map::Entry::Vacant(entry) => {
            entry.insert(StoredNode {
                labels: record.labels.clone(),
                props: record.props.clone(),
            });
        }
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f64 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        (dot / (na * nb)) as f64
    }
}
