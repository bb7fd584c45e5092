//! Tree-to-graph persistence.
//!
//! Walks a [`Normativa`] once, collecting one node record per persisted
//! content node and one `PART_OF` edge from each to the document, plus the
//! document node and its classification nodes. The collected batches are
//! committed with exactly one `batch_merge_nodes` and one
//! `batch_merge_edges` call.

use serde_json::{json, Map};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use lexgraph_core::domain::node::{DocumentTree, NodeId, NodeType};
use lexgraph_core::services::article_text;
use lexgraph_core::Normativa;

use crate::domain::{EdgeRecord, GraphStore, NodeRecord};
use crate::Result;

/// Statistics from persisting one document.
#[derive(Debug, Clone, Copy, Default)]
pub struct SaveStats {
    pub nodes_created: u64,
    pub edges_created: u64,
}

/// High-level persistence of documents into the graph.
pub struct NormativaRepository {
    store: Arc<dyn GraphStore>,
    /// Structural node types kept out of the graph for size reasons. Their
    /// children still gain `PART_OF` edges pointing straight at the
    /// document.
    skip_types: HashSet<NodeType>,
}

impl NormativaRepository {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self {
            store,
            skip_types: HashSet::from([
                NodeType::Root,
                NodeType::Capitulo,
                NodeType::Seccion,
                NodeType::Subseccion,
            ]),
        }
    }

    pub fn with_skip_types(mut self, skip_types: HashSet<NodeType>) -> Self {
        self.skip_types = skip_types;
        self.skip_types.insert(NodeType::Root);
        self
    }

    /// Persist the document, its classification nodes and its content tree.
    pub async fn save(&self, normativa: &Normativa) -> Result<SaveStats> {
        let mut nodes: Vec<NodeRecord> = Vec::new();
        let mut edges: Vec<EdgeRecord> = Vec::new();

        self.collect_document(normativa, &mut nodes, &mut edges);
        self.collect_tree(
            &normativa.tree,
            normativa.tree.root(),
            &normativa.id,
            String::new(),
            &mut nodes,
            &mut edges,
        );

        let nodes_created = self.store.batch_merge_nodes(&nodes).await?;
        let edges_created = self.store.batch_merge_edges(&edges).await?;
        debug!(
            document_id = %normativa.id,
            nodes = nodes_created,
            edges = edges_created,
            "document persisted"
        );
        Ok(SaveStats {
            nodes_created,
            edges_created,
        })
    }

    fn collect_document(
        &self,
        normativa: &Normativa,
        nodes: &mut Vec<NodeRecord>,
        edges: &mut Vec<EdgeRecord>,
    ) {
        let meta = &normativa.metadata;
        let mut props = Map::new();
        props.insert("id".to_string(), json!(normativa.id));
        props.insert("source".to_string(), json!(meta.source.as_str()));
        let optional = [
            ("titulo", &meta.titulo),
            ("ambito", &meta.ambito),
            ("rango", &meta.rango),
            ("departamento", &meta.departamento),
            ("fecha_disposicion", &meta.fecha_disposicion),
            ("fecha_publicacion", &meta.fecha_publicacion),
            ("fecha_vigencia", &meta.fecha_vigencia),
            ("fecha_actualizacion", &meta.fecha_actualizacion),
            ("diario", &meta.diario),
            ("diario_numero", &meta.diario_numero),
            ("vigencia_agotada", &meta.vigencia_agotada),
            ("estatus_derogacion", &meta.estatus_derogacion),
            ("estatus_anulacion", &meta.estatus_anulacion),
            ("estado_consolidacion", &meta.estado_consolidacion),
            ("url_eli", &meta.url_eli),
            ("url_html_consolidada", &meta.url_html_consolidada),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                props.insert(key.to_string(), json!(value));
            }
        }
        nodes.push(NodeRecord::new(vec!["Normativa".to_string()], props));

        for materia in &normativa.analysis.materias {
            let id = format!("materia:{}", materia.to_lowercase());
            nodes.push(classification_node(&id, materia, "Materia"));
            edges.push(EdgeRecord::new(
                normativa.id.clone(),
                "Normativa",
                id,
                "Materia",
                "ABOUT",
            ));
        }
        if let Some(rango) = &normativa.metadata.rango {
            let id = format!("rango:{}", rango.to_lowercase());
            nodes.push(classification_node(&id, rango, "Rango"));
            edges.push(EdgeRecord::new(
                normativa.id.clone(),
                "Normativa",
                id,
                "Rango",
                "HAS_TYPE",
            ));
        }
        if let Some(departamento) = &normativa.metadata.departamento {
            let id = format!("departamento:{}", departamento.to_lowercase());
            nodes.push(classification_node(&id, departamento, "Departamento"));
            edges.push(EdgeRecord::new(
                normativa.id.clone(),
                "Normativa",
                id,
                "Departamento",
                "ISSUED_BY",
            ));
        }
    }

    fn collect_tree(
        &self,
        tree: &DocumentTree,
        id: NodeId,
        document_id: &str,
        path: String,
        nodes: &mut Vec<NodeRecord>,
        edges: &mut Vec<EdgeRecord>,
    ) {
        let node = tree.node(id);
        let skipped = self.skip_types.contains(&node.node_type);

        let child_path = if skipped {
            path.clone()
        } else if path.is_empty() {
            node.name.clone()
        } else {
            format!("{path}/{}", node.name)
        };

        if !skipped {
            let mut props = Map::new();
            props.insert("id".to_string(), json!(node.id));
            props.insert("name".to_string(), json!(node.name));

            if let Some(article) = node.article() {
                props.insert(
                    "full_text".to_string(),
                    json!(article_text::build_full_text(tree, id)),
                );
                props.insert("path".to_string(), json!(child_path));
                if let Some(clean_number) = &article.clean_number {
                    props.insert("clean_number".to_string(), json!(clean_number));
                }
                if let Some(fecha) = &article.fecha_vigencia {
                    props.insert("fecha_vigencia".to_string(), json!(fecha));
                }
                if let Some(fecha) = &article.fecha_caducidad {
                    props.insert("fecha_caducidad".to_string(), json!(fecha));
                }
                if let Some(norma) = &article.introduced_by {
                    props.insert("introduced_by".to_string(), json!(norma));
                }
                if let Some(embedding) = &article.embedding {
                    props.insert("embedding".to_string(), json!(embedding));
                }
            } else if node.node_type.is_article_element() {
                let text: Vec<&str> = tree.texts(id).collect();
                props.insert("text".to_string(), json!(text.join("\n")));
            }

            let label = node.node_type.as_str().to_string();
            nodes.push(NodeRecord::new(vec![label.clone()], props));
            edges.push(EdgeRecord::new(
                node.id.clone(),
                label,
                document_id.to_string(),
                "Normativa",
                "PART_OF",
            ));
        }

        for child in tree.children(id) {
            self.collect_tree(tree, child, document_id, child_path.clone(), nodes, edges);
        }
    }
}

fn classification_node(id: &str, name: &str, label: &str) -> NodeRecord {
    let mut props = Map::new();
    props.insert("id".to_string(), json!(id));
    props.insert("name".to_string(), json!(name));
    NodeRecord::new(vec![label.to_string()], props)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::memory::MemoryGraphStore;
    use lexgraph_core::domain::document::{Analysis, Metadata, Source};

    fn fixture(with_structure: bool) -> Normativa {
        let mut tree = DocumentTree::new("BOE-A-2000-1");
        let root = tree.root();
        let parent = if with_structure {
            tree.create_node(root, NodeType::Capitulo, "I", 2)
        } else {
            root
        };
        for n in 1..=3 {
            let art = tree.create_node(parent, NodeType::Articulo, n.to_string(), 5);
            if let Some(article) = tree.node_mut(art).article_mut() {
                article.fecha_vigencia = Some("20000101".to_string());
            }
        }

        let mut metadata = Metadata::new("BOE-A-2000-1", Source::Boe);
        metadata.titulo = Some("Ley de prueba".to_string());
        metadata.rango = Some("Ley".to_string());
        let analysis = Analysis {
            materias: vec!["Sanidad".to_string()],
            ..Analysis::default()
        };
        Normativa::new(metadata, analysis, tree)
    }

    #[tokio::test]
    async fn test_save_three_articles() {
        let store = Arc::new(MemoryGraphStore::new());
        let repo = NormativaRepository::new(store.clone());
        let stats = repo.save(&fixture(false)).await.unwrap();

        // Normativa + 3 articles + Materia + Rango.
        assert_eq!(stats.nodes_created, 6);
        // 3 PART_OF + ABOUT + HAS_TYPE.
        assert_eq!(stats.edges_created, 5);
        assert_eq!(store.edges_of_type("PART_OF").len(), 3);
        assert!(store.has_node("BOE-A-2000-1"));
        assert_eq!(
            store.node_prop("BOE-A-2000-1", "source"),
            Some(json!("BOE"))
        );
    }

    #[tokio::test]
    async fn test_skipped_structure_children_attach_to_document() {
        let store = Arc::new(MemoryGraphStore::new());
        let repo = NormativaRepository::new(store.clone());
        repo.save(&fixture(true)).await.unwrap();

        // Capitulo is in the default skip set: no node, but articles still
        // carry PART_OF edges to the document.
        let part_of = store.edges_of_type("PART_OF");
        assert_eq!(part_of.len(), 3);
        assert!(part_of.iter().all(|e| e.to_id == "BOE-A-2000-1"));
        assert!(!store.has_node("BOE-A-2000-1-n1"));
    }

    #[tokio::test]
    async fn test_article_path_excludes_skipped_layers() {
        let store = Arc::new(MemoryGraphStore::new());
        let repo = NormativaRepository::new(store.clone());
        let normativa = fixture(true);
        repo.save(&normativa).await.unwrap();

        let first_article = &normativa.tree.article_ids()[0];
        let article_node_id = normativa.tree.node(*first_article).id.clone();
        assert_eq!(store.node_prop(&article_node_id, "path"), Some(json!("1")));
    }

    #[tokio::test]
    async fn test_save_is_idempotent() {
        let store = Arc::new(MemoryGraphStore::new());
        let repo = NormativaRepository::new(store.clone());
        let normativa = fixture(false);

        repo.save(&normativa).await.unwrap();
        let nodes_before = store.node_count();
        let edges_before = store.edge_count();

        repo.save(&normativa).await.unwrap();
        assert_eq!(store.node_count(), nodes_before);
        assert_eq!(store.edge_count(), edges_before);
    }

    #[tokio::test]
    async fn test_empty_document_persists_only_document_and_classification() {
        let store = Arc::new(MemoryGraphStore::new());
        let repo = NormativaRepository::new(store.clone());

        let tree = DocumentTree::new("BOE-A-2001-2");
        let metadata = Metadata::new("BOE-A-2001-2", Source::Boe);
        let normativa = Normativa::new(metadata, Analysis::default(), tree);

        let stats = repo.save(&normativa).await.unwrap();
        assert_eq!(stats.nodes_created, 1);
        assert_eq!(stats.edges_created, 0);
        assert!(store.has_node("BOE-A-2001-2"));
    }
}
