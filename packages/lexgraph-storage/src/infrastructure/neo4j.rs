//! Bolt-backed [`GraphStore`] adapter.
//!
//! Batch merges group records by label (or edge type + endpoint labels) and
//! issue one `UNWIND $rows` statement per group inside a single transaction,
//! so a batch either fully commits or fully fails.

use async_trait::async_trait;
use neo4rs::{
    query, BoltBoolean, BoltFloat, BoltInteger, BoltList, BoltMap, BoltNull, BoltString, BoltType,
    Graph,
};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::domain::{ArticleRow, EdgeRecord, GraphStore, NodeRecord, SearchHit, VectorIndexSpec};
use crate::error::{Result, StorageError};

pub struct Neo4jGraphStore {
    graph: Graph,
}

impl Neo4jGraphStore {
    /// Connect to the graph store. The connection pool should be sized to
    /// at least `disk_workers + 2`.
    pub async fn connect(uri: &str, user: &str, password: &str) -> Result<Self> {
        let graph = Graph::new(uri, user, password)
            .await
            .map_err(StorageError::from)?;
        info!(uri, "connected to graph store");
        Ok(Self { graph })
    }

    fn label_list(labels: &[String]) -> String {
        labels
            .iter()
            .map(|l| format!("`{l}`"))
            .collect::<Vec<_>>()
            .join(":")
    }

    fn de_err(e: impl std::fmt::Display) -> StorageError {
        StorageError::Unavailable(format!("row decode: {e}"))
    }
}

fn json_to_bolt(value: &Value) -> BoltType {
    match value {
        Value::Null => BoltType::Null(BoltNull),
        Value::Bool(b) => BoltType::Boolean(BoltBoolean::new(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => BoltType::Integer(BoltInteger::new(i)),
            None => BoltType::Float(BoltFloat::new(n.as_f64().unwrap_or(0.0))),
        },
        Value::String(s) => BoltType::String(BoltString::from(s.as_str())),
        Value::Array(items) => {
            let mut list = BoltList::default();
            for item in items {
                list.push(json_to_bolt(item));
            }
            BoltType::List(list)
        }
        Value::Object(map) => BoltType::Map(map_to_bolt(map)),
    }
}

fn map_to_bolt(map: &Map<String, Value>) -> BoltMap {
    let mut bolt = BoltMap::default();
    for (key, value) in map {
        bolt.put(BoltString::from(key.as_str()), json_to_bolt(value));
    }
    bolt
}

fn f32_list(values: &[f32]) -> BoltType {
    let mut list = BoltList::default();
    for v in values {
        list.push(BoltType::Float(BoltFloat::new(*v as f64)));
    }
    BoltType::List(list)
}

#[async_trait]
impl GraphStore for Neo4jGraphStore {
    async fn merge_node(&self, record: &NodeRecord) -> Result<()> {
        let id = record
            .id()
            .ok_or_else(|| StorageError::InvalidRecord("node record without id".to_string()))?
            .to_string();
        let cypher = format!(
            "MERGE (n:{} {{id: $id}}) SET n += $props",
            Self::label_list(&record.labels)
        );
        self.graph
            .run(
                query(&cypher)
                    .param("id", id)
                    .param("props", BoltType::Map(map_to_bolt(&record.props))),
            )
            .await?;
        Ok(())
    }

    async fn merge_edge(&self, record: &EdgeRecord) -> Result<()> {
        let cypher = format!(
            "MATCH (a:`{}` {{id: $from_id}}) MATCH (b:`{}` {{id: $to_id}}) \
             MERGE (a)-[r:`{}`]->(b) SET r += $props",
            record.from_label, record.to_label, record.rel_type
        );
        self.graph
            .run(
                query(&cypher)
                    .param("from_id", record.from_id.clone())
                    .param("to_id", record.to_id.clone())
                    .param("props", BoltType::Map(map_to_bolt(&record.props))),
            )
            .await?;
        Ok(())
    }

    async fn batch_merge_nodes(&self, records: &[NodeRecord]) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        // Group rows per label combination; Cypher labels cannot be
        // parameterized.
        let mut groups: BTreeMap<String, BoltList> = BTreeMap::new();
        for record in records {
            let id = record
                .id()
                .ok_or_else(|| StorageError::InvalidRecord("node record without id".to_string()))?;
            let mut row = BoltMap::default();
            row.put(BoltString::from("id"), BoltType::String(BoltString::from(id)));
            row.put(
                BoltString::from("props"),
                BoltType::Map(map_to_bolt(&record.props)),
            );
            groups
                .entry(Self::label_list(&record.labels))
                .or_default()
                .push(BoltType::Map(row));
        }

        let mut txn = self.graph.start_txn().await?;
        for (labels, rows) in groups {
            let cypher =
                format!("UNWIND $rows AS row MERGE (n:{labels} {{id: row.id}}) SET n += row.props");
            txn.run(query(&cypher).param("rows", BoltType::List(rows)))
                .await?;
        }
        txn.commit().await?;
        debug!(count = records.len(), "batch node merge committed");
        Ok(records.len() as u64)
    }

    async fn batch_merge_edges(&self, records: &[EdgeRecord]) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut groups: BTreeMap<(String, String, String), BoltList> = BTreeMap::new();
        for record in records {
            let mut row = BoltMap::default();
            row.put(
                BoltString::from("from_id"),
                BoltType::String(BoltString::from(record.from_id.as_str())),
            );
            row.put(
                BoltString::from("to_id"),
                BoltType::String(BoltString::from(record.to_id.as_str())),
            );
            row.put(
                BoltString::from("props"),
                BoltType::Map(map_to_bolt(&record.props)),
            );
            groups
                .entry((
                    record.rel_type.clone(),
                    record.from_label.clone(),
                    record.to_label.clone(),
                ))
                .or_default()
                .push(BoltType::Map(row));
        }

        let mut txn = self.graph.start_txn().await?;
        for ((rel_type, from_label, to_label), rows) in groups {
            let cypher = format!(
                "UNWIND $rows AS row \
                 MATCH (a:`{from_label}` {{id: row.from_id}}) \
                 MATCH (b:`{to_label}` {{id: row.to_id}}) \
                 MERGE (a)-[r:`{rel_type}`]->(b) SET r += row.props"
            );
            txn.run(query(&cypher).param("rows", BoltType::List(rows)))
                .await?;
        }
        txn.commit().await?;
        debug!(count = records.len(), "batch edge merge committed");
        Ok(records.len() as u64)
    }

    async fn fetch_article_page(&self, offset: u64, limit: u64) -> Result<Vec<ArticleRow>> {
        let cypher = "MATCH (a:articulo)-[:PART_OF]->(n:Normativa) \
                      WHERE a.full_text IS NOT NULL \
                      RETURN a.id AS id, a.full_text AS full_text, a.name AS name, \
                             a.fecha_vigencia AS fecha_vigencia, n.id AS document_id \
                      ORDER BY a.id SKIP $offset LIMIT $limit";
        let mut stream = self
            .graph
            .execute(
                query(cypher)
                    .param("offset", offset as i64)
                    .param("limit", limit as i64),
            )
            .await?;

        let mut rows = Vec::new();
        while let Some(row) = stream.next().await? {
            rows.push(ArticleRow {
                id: row.get::<String>("id").map_err(Self::de_err)?,
                full_text: row.get::<String>("full_text").map_err(Self::de_err)?,
                name: row.get::<Option<String>>("name").map_err(Self::de_err)?.unwrap_or_default(),
                fecha_vigencia: row
                    .get::<Option<String>>("fecha_vigencia")
                    .map_err(Self::de_err)?,
                document_id: row.get::<String>("document_id").map_err(Self::de_err)?,
            });
        }
        Ok(rows)
    }

    async fn find_article(
        &self,
        document_id: &str,
        clean_number: &str,
        at_date: Option<&str>,
    ) -> Result<Option<String>> {
        let cypher = "MATCH (a:articulo)-[:PART_OF]->(n:Normativa {id: $document_id}) \
                      WHERE a.clean_number = $clean_number \
                        AND ($at_date IS NULL \
                             OR (a.fecha_vigencia IS NOT NULL \
                                 AND a.fecha_vigencia <= $at_date \
                                 AND (a.fecha_caducidad IS NULL OR $at_date < a.fecha_caducidad))) \
                      RETURN a.id AS id ORDER BY a.fecha_vigencia DESC LIMIT 1";
        let mut stream = self
            .graph
            .execute(
                query(cypher)
                    .param("document_id", document_id)
                    .param("clean_number", clean_number)
                    .param(
                        "at_date",
                        match at_date {
                            Some(d) => BoltType::String(BoltString::from(d)),
                            None => BoltType::Null(BoltNull),
                        },
                    ),
            )
            .await?;
        match stream.next().await? {
            Some(row) => Ok(Some(row.get::<String>("id").map_err(Self::de_err)?)),
            None => Ok(None),
        }
    }

    async fn document_exists(&self, document_id: &str) -> Result<bool> {
        let mut stream = self
            .graph
            .execute(
                query("MATCH (n:Normativa {id: $id}) RETURN n.id AS id LIMIT 1")
                    .param("id", document_id),
            )
            .await?;
        Ok(stream.next().await?.is_some())
    }

    async fn delete_document(&self, document_id: &str) -> Result<u64> {
        let mut deleted = 0u64;

        // Content tree first: every node with a PART_OF path to the
        // document.
        let mut stream = self
            .graph
            .execute(
                query(
                    "MATCH (n)-[:PART_OF*]->(d:Normativa {id: $id}) \
                     WITH DISTINCT n DETACH DELETE n RETURN count(n) AS deleted",
                )
                .param("id", document_id),
            )
            .await?;
        if let Some(row) = stream.next().await? {
            deleted += row.get::<i64>("deleted").map_err(Self::de_err)? as u64;
        }

        // Then the document node itself; DETACH DELETE drops the
        // classification edges but keeps the shared nodes.
        let mut stream = self
            .graph
            .execute(
                query(
                    "MATCH (d:Normativa {id: $id}) DETACH DELETE d RETURN count(d) AS deleted",
                )
                .param("id", document_id),
            )
            .await?;
        if let Some(row) = stream.next().await? {
            deleted += row.get::<i64>("deleted").map_err(Self::de_err)? as u64;
        }

        info!(document_id, deleted, "document deleted from graph");
        Ok(deleted)
    }

    async fn count_part_of(&self, document_id: &str) -> Result<u64> {
        let mut stream = self
            .graph
            .execute(
                query(
                    "MATCH ()-[r:PART_OF]->(d:Normativa {id: $id}) RETURN count(r) AS total",
                )
                .param("id", document_id),
            )
            .await?;
        match stream.next().await? {
            Some(row) => Ok(row.get::<i64>("total").map_err(Self::de_err)? as u64),
            None => Ok(0),
        }
    }

    async fn ensure_constraints(&self) -> Result<()> {
        let statements = [
            "CREATE CONSTRAINT normativa_id IF NOT EXISTS \
             FOR (n:Normativa) REQUIRE n.id IS UNIQUE",
            "CREATE INDEX articulo_id IF NOT EXISTS FOR (n:articulo) ON (n.id)",
            // clean_number is the hot key of reference resolution.
            "CREATE INDEX articulo_clean_number IF NOT EXISTS \
             FOR (n:articulo) ON (n.clean_number)",
        ];
        for statement in statements {
            self.graph.run(query(statement)).await?;
        }
        Ok(())
    }

    async fn create_vector_index(&self, spec: &VectorIndexSpec) -> Result<()> {
        let cypher = format!(
            "CREATE VECTOR INDEX {} IF NOT EXISTS \
             FOR (n:`{}`) ON (n.`{}`) \
             OPTIONS {{indexConfig: {{`vector.dimensions`: {}, `vector.similarity_function`: '{}'}}}}",
            spec.name, spec.label, spec.property, spec.dimensions, spec.metric
        );
        self.graph.run(query(&cypher)).await?;
        info!(index = %spec.name, dimensions = spec.dimensions, "vector index ensured");
        Ok(())
    }

    async fn drop_vector_index(&self, name: &str) -> Result<()> {
        let cypher = format!("DROP INDEX {name} IF EXISTS");
        self.graph.run(query(&cypher)).await?;
        Ok(())
    }

    async fn vector_search(
        &self,
        embedding: &[f32],
        top_k: usize,
        index_name: &str,
    ) -> Result<Vec<SearchHit>> {
        let cypher = "CALL db.index.vector.queryNodes($index_name, $top_k, $vector) \
                      YIELD node, score \
                      RETURN node.id AS article_id, score ORDER BY score DESC";
        let mut stream = self
            .graph
            .execute(
                query(cypher)
                    .param("index_name", index_name)
                    .param("top_k", top_k as i64)
                    .param("vector", f32_list(embedding)),
            )
            .await?;

        let mut hits = Vec::new();
        while let Some(row) = stream.next().await? {
            hits.push(SearchHit {
                article_id: row.get::<String>("article_id").map_err(Self::de_err)?,
                score: row.get::<f64>("score").map_err(Self::de_err)?,
            });
        }
        Ok(hits)
    }
}
