//! Concatenation of an article subtree into the `full_text` property.

use crate::domain::node::{DocumentTree, NodeContent, NodeId, NodeType};

/// Build the full text of an article node: its own text fragments followed
/// by sub-article content in document order. Apartado and ordinal markers
/// keep their identifiers so the flattened text still reads like the source.
pub fn build_full_text(tree: &DocumentTree, article_id: NodeId) -> String {
    let mut lines = Vec::new();
    collect(tree, article_id, &mut lines);
    lines.join("\n")
}

fn collect(tree: &DocumentTree, id: NodeId, lines: &mut Vec<String>) {
    for content in &tree.node(id).content {
        match content {
            NodeContent::Text(text) => lines.push(text.clone()),
            NodeContent::Child(child) => {
                let node = tree.node(*child);
                let marker = match node.node_type {
                    NodeType::Parrafo => None,
                    NodeType::ApartadoNumerico => Some(format!("{}.", display_name(&node.name))),
                    NodeType::ApartadoAlfabetico => Some(format!("{})", display_name(&node.name))),
                    _ => Some(display_name(&node.name)),
                };
                match (marker, first_text(tree, *child)) {
                    // Fold the marker into the first text line.
                    (Some(marker), Some(first)) => {
                        lines.push(format!("{} {}", marker, first));
                        collect_rest(tree, *child, lines);
                    }
                    (Some(marker), None) => {
                        lines.push(marker);
                        collect(tree, *child, lines);
                    }
                    (None, _) => collect(tree, *child, lines),
                }
            }
        }
    }
}

fn collect_rest(tree: &DocumentTree, id: NodeId, lines: &mut Vec<String>) {
    let mut skipped_first_text = false;
    for content in &tree.node(id).content {
        match content {
            NodeContent::Text(text) => {
                if skipped_first_text {
                    lines.push(text.clone());
                } else {
                    skipped_first_text = true;
                }
            }
            NodeContent::Child(child) => collect(tree, *child, lines),
        }
    }
}

fn first_text<'a>(tree: &'a DocumentTree, id: NodeId) -> Option<&'a str> {
    tree.texts(id).next()
}

fn display_name(name: &str) -> String {
    name.replace('_', " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_text_plain_paragraphs() {
        let mut tree = DocumentTree::new("doc");
        let root = tree.root();
        let art = tree.create_node(root, NodeType::Articulo, "1", 5);
        let p1 = tree.create_node(art, NodeType::Parrafo, "1", 9);
        tree.add_text(p1, "Primer párrafo.");
        let p2 = tree.create_node(art, NodeType::Parrafo, "2", 9);
        tree.add_text(p2, "Segundo párrafo.");

        assert_eq!(
            build_full_text(&tree, art),
            "Primer párrafo.\nSegundo párrafo."
        );
    }

    #[test]
    fn test_full_text_keeps_apartado_markers() {
        let mut tree = DocumentTree::new("doc");
        let root = tree.root();
        let art = tree.create_node(root, NodeType::Articulo, "1", 5);
        let ap = tree.create_node(art, NodeType::ApartadoNumerico, "1", 6);
        tree.add_text(ap, "Contenido del apartado.");
        let letra = tree.create_node(ap, NodeType::ApartadoAlfabetico, "a", 8);
        tree.add_text(letra, "Contenido de la letra.");

        assert_eq!(
            build_full_text(&tree, art),
            "1. Contenido del apartado.\na) Contenido de la letra."
        );
    }

    #[test]
    fn test_full_text_of_empty_article() {
        let mut tree = DocumentTree::new("doc");
        let root = tree.root();
        let art = tree.create_node(root, NodeType::Articulo, "1", 5);
        assert_eq!(build_full_text(&tree, art), "");
    }
}
