//! Structural diff between two versions of an article subtree.
//!
//! Children are matched by `(node_type, name)`; matched pairs with differing
//! normalized text are `Modified`, unmatched new children are `Added`,
//! unmatched old children are `Removed`. The traversal order is the document
//! order of the new tree (then the old tree for removals), so the same input
//! pair always produces the same ordered result.

use crate::domain::change::ChangeKind;
use crate::domain::node::{DocumentTree, NodeId};

/// Diff `new` against `old`, returning the ordered list of change kinds.
/// `diff(a, a)` is empty.
pub fn diff_versions(tree: &DocumentTree, new_id: NodeId, old_id: NodeId) -> Vec<ChangeKind> {
    let mut changes = Vec::new();
    if new_id == old_id {
        return changes;
    }
    diff_node(tree, new_id, old_id, &mut changes);
    changes
}

fn diff_node(tree: &DocumentTree, new_id: NodeId, old_id: NodeId, changes: &mut Vec<ChangeKind>) {
    if normalized_text(tree, new_id) != normalized_text(tree, old_id) {
        changes.push(ChangeKind::Modified);
    }

    let new_children: Vec<NodeId> = tree.children(new_id).collect();
    let old_children: Vec<NodeId> = tree.children(old_id).collect();
    let mut consumed = vec![false; old_children.len()];

    for &new_child in &new_children {
        let key = child_key(tree, new_child);
        let matched = old_children
            .iter()
            .enumerate()
            .find(|(i, &old_child)| !consumed[*i] && child_key(tree, old_child) == key);
        match matched {
            Some((i, &old_child)) => {
                consumed[i] = true;
                diff_node(tree, new_child, old_child, changes);
            }
            None => changes.push(ChangeKind::Added),
        }
    }

    for (i, _) in old_children.iter().enumerate() {
        if !consumed[i] {
            changes.push(ChangeKind::Removed);
        }
    }
}

fn child_key(tree: &DocumentTree, id: NodeId) -> (&'static str, String) {
    let node = tree.node(id);
    (node.node_type.as_str(), node.name.clone())
}

/// Direct text of a node with whitespace collapsed.
fn normalized_text(tree: &DocumentTree, id: NodeId) -> String {
    tree.texts(id)
        .flat_map(|t| t.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::node::NodeType;

    fn article_with_paragraphs(tree: &mut DocumentTree, name: &str, texts: &[&str]) -> NodeId {
        let root = tree.root();
        let art = tree.create_node(root, NodeType::Articulo, name, 5);
        for (i, text) in texts.iter().enumerate() {
            let p = tree.create_node(art, NodeType::Parrafo, (i + 1).to_string(), 9);
            tree.add_text(p, *text);
        }
        art
    }

    #[test]
    fn test_diff_identical_is_empty() {
        let mut tree = DocumentTree::new("doc");
        let a = article_with_paragraphs(&mut tree, "1", &["uno", "dos"]);
        let b = article_with_paragraphs(&mut tree, "1", &["uno", "dos"]);
        assert!(diff_versions(&tree, a, b).is_empty());
        assert!(diff_versions(&tree, a, a).is_empty());
    }

    #[test]
    fn test_diff_detects_modified_text() {
        let mut tree = DocumentTree::new("doc");
        let old = article_with_paragraphs(&mut tree, "1", &["texto original"]);
        let new = article_with_paragraphs(&mut tree, "1", &["texto reformado"]);
        assert_eq!(diff_versions(&tree, new, old), vec![ChangeKind::Modified]);
    }

    #[test]
    fn test_diff_detects_added_and_removed() {
        let mut tree = DocumentTree::new("doc");
        let old = article_with_paragraphs(&mut tree, "1", &["uno", "dos"]);
        let new = article_with_paragraphs(&mut tree, "1", &["uno"]);

        assert_eq!(diff_versions(&tree, new, old), vec![ChangeKind::Removed]);

        let wider = article_with_paragraphs(&mut tree, "1", &["uno", "dos", "tres"]);
        assert_eq!(diff_versions(&tree, wider, old), vec![ChangeKind::Added]);
    }

    #[test]
    fn test_diff_ignores_whitespace_differences() {
        let mut tree = DocumentTree::new("doc");
        let old = article_with_paragraphs(&mut tree, "1", &["uno  dos"]);
        let new = article_with_paragraphs(&mut tree, "1", &["uno dos"]);
        assert!(diff_versions(&tree, new, old).is_empty());
    }

    #[test]
    fn test_diff_is_deterministic() {
        let mut tree = DocumentTree::new("doc");
        let old = article_with_paragraphs(&mut tree, "1", &["a", "b", "c"]);
        let new = article_with_paragraphs(&mut tree, "1", &["a", "x", "y", "z"]);

        let first = diff_versions(&tree, new, old);
        let second = diff_versions(&tree, new, old);
        assert_eq!(first, second);
    }
}
