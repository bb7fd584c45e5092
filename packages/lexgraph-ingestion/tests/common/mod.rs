//! Shared fixtures for integration tests: an archive-backed retriever, an
//! in-memory graph store and a simulated embedder.

use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use lexgraph_ai::{Embedder, EmbeddingConfig, SimulatedBackend, SlidingWindowRateLimiter};
use lexgraph_ingestion::{DocumentRetriever, EmbeddingMode, IngestionConfig, Resources};
use lexgraph_storage::GraphStore;

pub const DIMS: usize = 16;

/// A consolidated-legislation payload with one block per article. Each
/// entry is `(article_number, body_lines)`.
pub fn boe_payload(id: &str, articles: &[(&str, &[&str])]) -> Value {
    let blocks: Vec<Value> = articles
        .iter()
        .map(|(num, body)| {
            let mut lines = vec![format!("Artículo {num}.")];
            lines.extend(body.iter().map(|s| s.to_string()));
            json!({
                "@id": format!("a{num}"),
                "@tipo": "precepto",
                "@titulo": format!("Artículo {num}"),
                "version": [{
                    "@id_norma": id,
                    "@fecha_vigencia": "20000101",
                    "p": lines
                }]
            })
        })
        .collect();

    json!({
        "data": {
            "metadatos": {
                "identificador": id,
                "titulo": format!("Norma {id}")
            },
            "analisis": {"materias": []},
            "texto": {"bloque": blocks}
        }
    })
}

pub fn write_fixture(dir: &Path, id: &str, payload: &Value) {
    std::fs::write(dir.join(format!("{id}.json")), payload.to_string()).unwrap();
}

pub fn test_embedder() -> Arc<Embedder> {
    let config = EmbeddingConfig {
        provider: "simulated".to_string(),
        dimensions: DIMS,
        ..EmbeddingConfig::default()
    };
    Arc::new(Embedder::new(
        Arc::new(SimulatedBackend::new(config.clone())),
        None,
        Arc::new(SlidingWindowRateLimiter::new(100_000, Duration::from_secs(60))),
        config,
    ))
}

pub fn test_resources(
    store: Arc<dyn GraphStore>,
    archive_dir: &Path,
    scratch_dir: &Path,
) -> Arc<Resources> {
    let mut config = IngestionConfig::default();
    config.embedding.dimensions = DIMS;
    config.unresolved_log_path = scratch_dir.join("unresolved_references.json");
    config.archive_dir = Some(archive_dir.to_path_buf());

    Resources::with_parts(
        config,
        store,
        test_embedder(),
        Arc::new(DocumentRetriever::new(Some(archive_dir.to_path_buf()))),
        EmbeddingMode::Simulated,
    )
}
