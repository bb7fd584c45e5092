//! Content-tree arena.
//!
//! Every structural element of a document becomes a [`Node`] stored in a
//! [`DocumentTree`] arena. Parents are referred to by index, so the back
//! reference is a lookup relation rather than an ownership handle, and the
//! whole tree is owned by the per-document builder.

use serde::{Deserialize, Serialize};

use crate::utils::spanish_numbers::normalize_article_number;

/// Index into the tree arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub usize);

/// Node variant discriminator. `as_str` values double as graph labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Root,
    Disposicion,
    Libro,
    Anexo,
    Titulo,
    Capitulo,
    Seccion,
    Subseccion,
    ArticuloUnico,
    Articulo,
    ApartadoNumerico,
    ApartadoAlfabetico,
    OrdinalNumerico,
    OrdinalAlfabetico,
    Parrafo,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Root => "root",
            NodeType::Disposicion => "disposicion",
            NodeType::Libro => "libro",
            NodeType::Anexo => "anexo",
            NodeType::Titulo => "titulo",
            NodeType::Capitulo => "capitulo",
            NodeType::Seccion => "seccion",
            NodeType::Subseccion => "subseccion",
            NodeType::ArticuloUnico => "articulo_unico",
            NodeType::Articulo => "articulo",
            NodeType::ApartadoNumerico => "apartado_numerico",
            NodeType::ApartadoAlfabetico => "apartado_alfabetico",
            NodeType::OrdinalNumerico => "ordinal_numerico",
            NodeType::OrdinalAlfabetico => "ordinal_alfabetico",
            NodeType::Parrafo => "parrafo",
        }
    }

    /// Structure layers above the article level.
    pub fn is_structure(&self) -> bool {
        matches!(
            self,
            NodeType::Root
                | NodeType::Disposicion
                | NodeType::Libro
                | NodeType::Titulo
                | NodeType::Capitulo
                | NodeType::Seccion
                | NodeType::Subseccion
        )
    }

    /// Article-level nodes carry the [`ArticleData`] specialization.
    pub fn is_article(&self) -> bool {
        matches!(
            self,
            NodeType::Articulo | NodeType::ArticuloUnico | NodeType::Anexo
        )
    }

    /// Sub-article nodes: apartados, letters, ordinals, paragraphs.
    pub fn is_article_element(&self) -> bool {
        matches!(
            self,
            NodeType::ApartadoNumerico
                | NodeType::ApartadoAlfabetico
                | NodeType::OrdinalNumerico
                | NodeType::OrdinalAlfabetico
                | NodeType::Parrafo
        )
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ordered child content: interleaved raw text fragments and child nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NodeContent {
    Text(String),
    Child(NodeId),
}

/// Article specialization, present when the variant is an article kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArticleData {
    /// Normalized identifier, e.g. `"51"` or `"1 bis"`, or `None`.
    pub clean_number: Option<String>,
    /// Start of validity, `YYYYMMDD`.
    pub fecha_vigencia: Option<String>,
    /// End of validity, `YYYYMMDD`; `None` means current.
    pub fecha_caducidad: Option<String>,
    /// Id of the norm version that introduced this text.
    pub introduced_by: Option<String>,
    /// Populated by the embedding step.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Stable string id, unique within the document tree.
    pub id: String,
    /// Human label; spaces are stored as underscores.
    pub name: String,
    pub node_type: NodeType,
    /// Depth; -1 for the root.
    pub level: i32,
    pub parent: Option<NodeId>,
    pub content: Vec<NodeContent>,
    pub article: Option<ArticleData>,
}

impl Node {
    pub fn article(&self) -> Option<&ArticleData> {
        self.article.as_ref()
    }

    pub fn article_mut(&mut self) -> Option<&mut ArticleData> {
        self.article.as_mut()
    }
}

/// Arena-backed content tree for one document.
///
/// Node ids are `"{document_id}-n{counter}"` with a monotonic counter, so
/// ids are stable across rebuilds of the same input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentTree {
    document_id: String,
    nodes: Vec<Node>,
    root: NodeId,
}

impl DocumentTree {
    pub fn new(document_id: impl Into<String>) -> Self {
        let document_id = document_id.into();
        let root = Node {
            id: format!("{document_id}-n0"),
            name: "Content".to_string(),
            node_type: NodeType::Root,
            level: -1,
            parent: None,
            content: Vec::new(),
            article: None,
        };
        Self {
            document_id,
            nodes: vec![root],
            root: NodeId(0),
        }
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// Node factory: allocate a child of `parent` and register it in order.
    pub fn create_node(
        &mut self,
        parent: NodeId,
        node_type: NodeType,
        name: impl Into<String>,
        level: i32,
    ) -> NodeId {
        let name = name.into();
        let id = NodeId(self.nodes.len());
        let article = if node_type.is_article() {
            Some(ArticleData {
                clean_number: normalize_article_number(&name),
                ..ArticleData::default()
            })
        } else {
            None
        };
        self.nodes.push(Node {
            id: format!("{}-n{}", self.document_id, id.0),
            name,
            node_type,
            level,
            parent: Some(parent),
            content: Vec::new(),
            article,
        });
        self.nodes[parent.0].content.push(NodeContent::Child(id));
        id
    }

    pub fn add_text(&mut self, id: NodeId, text: impl Into<String>) {
        let text = text.into();
        if !text.is_empty() {
            self.nodes[id.0].content.push(NodeContent::Text(text));
        }
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes[id.0].content.iter().filter_map(|c| match c {
            NodeContent::Child(child) => Some(*child),
            NodeContent::Text(_) => None,
        })
    }

    pub fn texts(&self, id: NodeId) -> impl Iterator<Item = &str> {
        self.nodes[id.0].content.iter().filter_map(|c| match c {
            NodeContent::Text(t) => Some(t.as_str()),
            NodeContent::Child(_) => None,
        })
    }

    /// All article-kind nodes in depth-first document order.
    pub fn article_ids(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            if self.node(id).node_type.is_article() {
                out.push(id);
            }
            // Reverse so the stack pops children in document order.
            let children: Vec<NodeId> = self.children(id).collect();
            for child in children.into_iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    /// Slash-joined ancestor names from the root down to (and including) `id`.
    pub fn path(&self, id: NodeId) -> String {
        let mut parts = Vec::new();
        let mut current = Some(id);
        while let Some(cur) = current {
            let node = self.node(cur);
            if node.node_type != NodeType::Root {
                parts.push(node.name.clone());
            }
            current = node.parent;
        }
        parts.reverse();
        parts.join("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_tree_has_only_root() {
        let tree = DocumentTree::new("BOE-A-2000-1");
        assert_eq!(tree.len(), 1);
        assert!(tree.is_empty());
        assert_eq!(tree.node(tree.root()).level, -1);
        assert_eq!(tree.node(tree.root()).node_type, NodeType::Root);
    }

    #[test]
    fn test_create_node_assigns_prefixed_ids() {
        let mut tree = DocumentTree::new("BOE-A-2000-1");
        let root = tree.root();
        let titulo = tree.create_node(root, NodeType::Titulo, "I", 1);
        let articulo = tree.create_node(titulo, NodeType::Articulo, "14", 5);

        assert_eq!(tree.node(titulo).id, "BOE-A-2000-1-n1");
        assert_eq!(tree.node(articulo).id, "BOE-A-2000-1-n2");
        assert_eq!(tree.node(articulo).parent, Some(titulo));
    }

    #[test]
    fn test_article_nodes_get_clean_number() {
        let mut tree = DocumentTree::new("doc");
        let root = tree.root();
        let art = tree.create_node(root, NodeType::Articulo, "1 bis", 5);
        assert_eq!(
            tree.node(art).article().unwrap().clean_number.as_deref(),
            Some("1 bis")
        );

        let titulo = tree.create_node(root, NodeType::Titulo, "I", 1);
        assert!(tree.node(titulo).article().is_none());
    }

    #[test]
    fn test_article_ids_in_document_order() {
        let mut tree = DocumentTree::new("doc");
        let root = tree.root();
        let cap = tree.create_node(root, NodeType::Capitulo, "I", 2);
        let a1 = tree.create_node(cap, NodeType::Articulo, "1", 5);
        let a2 = tree.create_node(cap, NodeType::Articulo, "2", 5);
        let a3 = tree.create_node(root, NodeType::Articulo, "3", 5);

        assert_eq!(tree.article_ids(), vec![a1, a2, a3]);
    }

    #[test]
    fn test_path_joins_ancestor_names() {
        let mut tree = DocumentTree::new("doc");
        let root = tree.root();
        let titulo = tree.create_node(root, NodeType::Titulo, "TÍTULO_I", 1);
        let art = tree.create_node(titulo, NodeType::Articulo, "14", 5);
        assert_eq!(tree.path(art), "TÍTULO_I/14");
    }

    #[test]
    fn test_content_preserves_text_and_child_order() {
        let mut tree = DocumentTree::new("doc");
        let root = tree.root();
        let art = tree.create_node(root, NodeType::Articulo, "1", 5);
        tree.add_text(art, "first");
        let p = tree.create_node(art, NodeType::Parrafo, "1", 9);
        tree.add_text(art, "last");

        let node = tree.node(art);
        assert_eq!(node.content.len(), 3);
        assert!(matches!(&node.content[0], NodeContent::Text(t) if t == "first"));
        assert!(matches!(&node.content[1], NodeContent::Child(c) if *c == p));
        assert!(matches!(&node.content[2], NodeContent::Text(t) if t == "last"));
    }
}
