//! Stack-based construction of the content tree from version elements.
//!
//! A fixed ordered table maps heading patterns to `(level, NodeType)`. Each
//! recognised heading opens a node at its level after popping the stack; the
//! `parrafo` rule is the catch-all last entry and only creates nodes under
//! articles or other paragraphs. Multiple versions of the same article fold
//! into sibling article nodes chained by validity dates.

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::domain::change::{ChangeEvent, ChangeLog};
use crate::domain::node::{DocumentTree, NodeId, NodeType};
use crate::domain::version::{ElementType, Version};
use crate::services::change_detector;

/// Ordered heading table. The `Parrafo` entry must stay last: its pattern
/// matches any non-empty line.
static LEVELS: Lazy<Vec<(i32, NodeType, Regex)>> = Lazy::new(|| {
    vec![
        (0, NodeType::Disposicion, regex(r"(?i)^Disposición\s+(.+)")),
        (0, NodeType::Libro, regex(r"(?i)^LIBRO\s+(.+)")),
        (0, NodeType::Anexo, regex(r"(?i)^ANEXO(?:\s+(.+))?$")),
        (1, NodeType::Titulo, regex(r"(?i)^TÍTULO\s+(.+)")),
        (2, NodeType::Capitulo, regex(r"(?i)^CAPÍTULO\s+(.+)")),
        (
            3,
            NodeType::Seccion,
            regex(r"(?i)^Sección\s+(\d+\.ª)(?:\s*\.?\s*(.*))?"),
        ),
        (
            4,
            NodeType::Subseccion,
            regex(r"(?i)^Subsección\s+(\d+ª)(?:\s*\.?\s*(.*))?"),
        ),
        (
            5,
            NodeType::ArticuloUnico,
            regex(r"(?i)^Artículo\s+(único)(?:\s*\.?\s*(.*))?"),
        ),
        (
            5,
            NodeType::Articulo,
            regex(
                r"(?i)^Artículo\s+(\d+(?:\s+(?:bis|ter|quater|quinquies|sexies|septies|octies|novies|decies|[A-Za-z]))?)",
            ),
        ),
        // Written-out article numbers end the heading with a period:
        // "Artículo cincuenta y uno."
        (
            5,
            NodeType::Articulo,
            regex(r"(?i)^Artículo\s+(\p{L}+(?:\s+\p{L}+){0,4})\s*\."),
        ),
        (6, NodeType::ApartadoNumerico, regex(r"^(\d+)\.\s+(.+)")),
        (8, NodeType::ApartadoAlfabetico, regex(r"(?i)^([a-z])\)\s+(.+)")),
        (8, NodeType::OrdinalAlfabetico, regex(r"(?i)^(\d+\.+ª)\s*(.*)$")),
        (10, NodeType::OrdinalNumerico, regex(r"(?i)^(\d+\.+º)\s*(.*)$")),
        (9, NodeType::Parrafo, regex(r"^\s*(.+)")),
    ]
});

fn regex(pattern: &str) -> Regex {
    Regex::new(pattern).expect("level pattern")
}

/// Result of heading detection for one line.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub level: i32,
    pub node_type: NodeType,
    pub name: String,
    pub residual: Option<String>,
}

/// Detect the hierarchical level and type of a text line. Returns `None`
/// when no pattern matches (blank lines).
pub fn detect_level(text: &str) -> Option<Detection> {
    for (level, node_type, pattern) in LEVELS.iter() {
        if let Some(caps) = pattern.captures(text) {
            let name = caps
                .get(1)
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| text.to_string());
            let residual = caps
                .get(2)
                .map(|m| m.as_str().to_string())
                .filter(|s| !s.is_empty());
            return Some(Detection {
                level: *level,
                node_type: *node_type,
                name,
                residual,
            });
        }
    }
    None
}

/// Builds one document's content tree from its blocks' versions.
pub struct TreeBuilder {
    tree: DocumentTree,
    stack: Vec<NodeId>,
    paragraph_counter: u32,
    change_log: ChangeLog,
}

impl TreeBuilder {
    pub fn new(document_id: impl Into<String>) -> Self {
        let document_id = document_id.into();
        let tree = DocumentTree::new(document_id.clone());
        let root = tree.root();
        Self {
            tree,
            stack: vec![root],
            paragraph_counter: 0,
            change_log: ChangeLog::new(document_id),
        }
    }

    pub fn tree(&self) -> &DocumentTree {
        &self.tree
    }

    pub fn change_log(&self) -> &ChangeLog {
        &self.change_log
    }

    /// Consume the builder and hand over the tree and its change log.
    pub fn finish(self) -> (DocumentTree, ChangeLog) {
        (self.tree, self.change_log)
    }

    /// Parse a single version and integrate it into the tree. Returns the
    /// block's originating type and the node left at block level.
    pub fn parse_version(&mut self, version: &Version) -> (Option<NodeType>, NodeId) {
        self.paragraph_counter = 0;

        // The block's level and type are set by its first element.
        let first_text = version
            .elements
            .first()
            .map(|e| e.content.trim())
            .unwrap_or("");
        let block = detect_level(first_text).filter(|d| d.node_type != NodeType::Parrafo);
        let block_level = block.as_ref().map(|d| d.level);
        let block_type = block.as_ref().map(|d| d.node_type);

        for element in &version.elements {
            if element.element_type == ElementType::Blockquote {
                continue;
            }
            let text = element.content.trim();
            if text.is_empty() {
                continue;
            }

            let mut detection = detect_level(text);

            if let Some(d) = detection.take() {
                if d.node_type == NodeType::Parrafo {
                    let top = self.tree.node(*self.stack.last().expect("stack"));
                    if top.node_type.is_article() || top.node_type == NodeType::Parrafo {
                        self.paragraph_counter += 1;
                        detection = Some(Detection {
                            level: d.level,
                            node_type: NodeType::Parrafo,
                            name: self.paragraph_counter.to_string(),
                            residual: Some(text.to_string()),
                        });
                    }
                    // Otherwise: plain text under a structure node.
                } else {
                    detection = Some(d);
                }
            }

            match detection {
                Some(d) => {
                    while self
                        .stack
                        .last()
                        .map(|id| self.tree.node(*id).level >= d.level)
                        .unwrap_or(false)
                        && self.stack.len() > 1
                    {
                        self.stack.pop();
                    }
                    let parent = *self.stack.last().expect("root stays on the stack");
                    let name = d.name.replace(' ', "_");
                    let node = self.tree.create_node(parent, d.node_type, name, d.level);
                    self.stack.push(node);
                    if let Some(residual) = d.residual {
                        self.tree.add_text(node, residual);
                    }
                }
                None => {
                    let top = *self.stack.last().expect("stack");
                    if top != self.tree.root() {
                        self.tree.add_text(top, text.to_string());
                    }
                }
            }
        }

        // Pop back to the block's originating level.
        if let Some(block_level) = block_level {
            while self
                .stack
                .last()
                .map(|id| self.tree.node(*id).level > block_level)
                .unwrap_or(false)
                && self.stack.len() > 1
            {
                self.stack.pop();
            }
        }

        (block_type, *self.stack.last().expect("stack"))
    }

    /// Parse all versions of one block. The first version creates the base
    /// structure; subsequent versions are chained by validity dates and
    /// diffed into the change log.
    pub fn parse_versions(&mut self, versions: &[Version]) {
        if versions.is_empty() {
            return;
        }

        let mut sorted: Vec<&Version> = versions.iter().collect();
        sorted.sort_by_key(|v| v.fecha_vigencia.clone().unwrap_or_else(|| "18000101".to_string()));

        let (_, mut old_id) = self.parse_version(sorted[0]);
        self.annotate_article(old_id, sorted[0]);

        for version in &sorted[1..] {
            let (_, new_id) = self.parse_version(version);
            if self.tree.node(new_id).node_type.is_article() {
                self.annotate_article(new_id, version);
                if let Some(article) = self.tree.node_mut(old_id).article_mut() {
                    article.fecha_caducidad = version.fecha_vigencia.clone();
                }
                self.diff_into_log(new_id, old_id);
            }
            old_id = new_id;
        }
    }

    fn annotate_article(&mut self, id: NodeId, version: &Version) {
        if let Some(article) = self.tree.node_mut(id).article_mut() {
            article.introduced_by = version.id_norma.clone();
            article.fecha_vigencia = version.fecha_vigencia.clone();
        }
    }

    fn diff_into_log(&mut self, new_id: NodeId, old_id: NodeId) {
        let from_version = self
            .tree
            .node(old_id)
            .article()
            .and_then(|a| a.introduced_by.clone());
        let to_version = self
            .tree
            .node(new_id)
            .article()
            .and_then(|a| a.introduced_by.clone());
        let article_id = self.tree.node(new_id).id.clone();
        let timestamp = Utc::now();

        let changes = change_detector::diff_versions(&self.tree, new_id, old_id);
        debug!(article = %article_id, count = changes.len(), "article version diff");
        for kind in changes {
            self.change_log.push(ChangeEvent {
                article_id: article_id.clone(),
                kind,
                from_version: from_version.clone(),
                to_version: to_version.clone(),
                timestamp,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::version::Element;

    fn version(fecha: &str, norma: &str, lines: &[&str]) -> Version {
        Version::new(
            Some(norma.to_string()),
            None,
            Some(fecha.to_string()),
            lines
                .iter()
                .map(|l| Element::new(ElementType::Parrafo, *l))
                .collect(),
        )
    }

    #[test]
    fn test_detect_level_headings() {
        let d = detect_level("TÍTULO I").unwrap();
        assert_eq!((d.level, d.node_type), (1, NodeType::Titulo));
        assert_eq!(d.name, "I");

        let d = detect_level("Artículo 14").unwrap();
        assert_eq!((d.level, d.node_type), (5, NodeType::Articulo));
        assert_eq!(d.name, "14");

        let d = detect_level("Artículo 1 bis").unwrap();
        assert_eq!(d.name, "1 bis");

        let d = detect_level("Artículo único. Objeto").unwrap();
        assert_eq!(d.node_type, NodeType::ArticuloUnico);
    }

    #[test]
    fn test_detect_level_written_article() {
        let d = detect_level("Artículo cincuenta y uno.").unwrap();
        assert_eq!(d.node_type, NodeType::Articulo);
        assert_eq!(d.name, "cincuenta y uno");
    }

    #[test]
    fn test_detect_level_catch_all_is_parrafo() {
        let d = detect_level("Cualquier texto corriente").unwrap();
        assert_eq!(d.node_type, NodeType::Parrafo);
    }

    #[test]
    fn test_single_version_builds_article_with_paragraphs() {
        let mut builder = TreeBuilder::new("BOE-A-2000-1");
        builder.parse_versions(&[version(
            "20000101",
            "BOE-A-2000-1",
            &["Artículo 1.", "Primer párrafo.", "Segundo párrafo."],
        )]);

        let (tree, _) = builder.finish();
        let articles = tree.article_ids();
        assert_eq!(articles.len(), 1);
        let article = tree.node(articles[0]);
        assert_eq!(article.name, "1");
        assert_eq!(
            article.article().unwrap().fecha_vigencia.as_deref(),
            Some("20000101")
        );
        assert!(article.article().unwrap().fecha_caducidad.is_none());

        let paragraphs: Vec<NodeId> = tree.children(articles[0]).collect();
        assert_eq!(paragraphs.len(), 2);
        assert_eq!(tree.node(paragraphs[0]).node_type, NodeType::Parrafo);
        assert_eq!(tree.node(paragraphs[0]).name, "1");
        assert_eq!(tree.node(paragraphs[1]).name, "2");
    }

    #[test]
    fn test_structure_nesting() {
        let mut builder = TreeBuilder::new("doc");
        builder.parse_versions(&[version("20000101", "n", &["TÍTULO I"])]);
        builder.parse_versions(&[version("20000101", "n", &["CAPÍTULO II"])]);
        builder.parse_versions(&[version("20000101", "n", &["Artículo 1.", "Texto."])]);

        let tree = builder.tree();
        let articles = tree.article_ids();
        assert_eq!(articles.len(), 1);
        assert_eq!(tree.path(articles[0]), "I/II/1");
    }

    #[test]
    fn test_levels_strictly_increase_along_paths() {
        let mut builder = TreeBuilder::new("doc");
        builder.parse_versions(&[version("20000101", "n", &["TÍTULO I"])]);
        builder.parse_versions(&[version(
            "20000101",
            "n",
            &["Artículo 1.", "1. Primer apartado.", "a) letra."],
        )]);

        let tree = builder.tree();
        for id in (0..tree.len()).map(NodeId) {
            let node = tree.node(id);
            if let Some(parent) = node.parent {
                assert!(
                    tree.node(parent).level < node.level,
                    "level must increase from {} to {}",
                    tree.node(parent).name,
                    node.name
                );
            }
        }
    }

    #[test]
    fn test_version_chain_dates() {
        let mut builder = TreeBuilder::new("doc");
        builder.parse_versions(&[
            version("20000101", "BOE-A-2000-1", &["Artículo 5.", "Texto original."]),
            version("20100101", "BOE-A-2009-9", &["Artículo 5.", "Texto reformado."]),
        ]);

        let tree = builder.tree();
        let articles = tree.article_ids();
        assert_eq!(articles.len(), 2);

        let first = tree.node(articles[0]).article().unwrap();
        let second = tree.node(articles[1]).article().unwrap();
        assert_eq!(first.fecha_caducidad.as_deref(), Some("20100101"));
        assert_eq!(second.fecha_vigencia.as_deref(), Some("20100101"));
        assert!(second.fecha_caducidad.is_none());
        assert_eq!(second.introduced_by.as_deref(), Some("BOE-A-2009-9"));
    }

    #[test]
    fn test_versions_sorted_before_folding() {
        let mut builder = TreeBuilder::new("doc");
        builder.parse_versions(&[
            version("20100101", "B", &["Artículo 5.", "Nuevo."]),
            version("20000101", "A", &["Artículo 5.", "Viejo."]),
        ]);

        let tree = builder.tree();
        let articles = tree.article_ids();
        let first = tree.node(articles[0]).article().unwrap();
        assert_eq!(first.introduced_by.as_deref(), Some("A"));
        assert_eq!(first.fecha_caducidad.as_deref(), Some("20100101"));
    }

    #[test]
    fn test_modified_version_emits_change_event() {
        let mut builder = TreeBuilder::new("doc");
        builder.parse_versions(&[
            version("20000101", "A", &["Artículo 5.", "Texto original."]),
            version("20100101", "B", &["Artículo 5.", "Texto reformado."]),
        ]);
        assert!(!builder.change_log().is_empty());
    }

    #[test]
    fn test_identical_versions_emit_no_events() {
        let mut builder = TreeBuilder::new("doc");
        builder.parse_versions(&[
            version("20000101", "A", &["Artículo 5.", "Mismo texto."]),
            version("20100101", "B", &["Artículo 5.", "Mismo texto."]),
        ]);
        assert!(builder.change_log().is_empty());
    }

    #[test]
    fn test_empty_versions_are_noop() {
        let mut builder = TreeBuilder::new("doc");
        builder.parse_versions(&[]);
        assert!(builder.tree().is_empty());
    }
}
