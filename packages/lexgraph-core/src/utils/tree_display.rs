//! Indented debug rendering of a content tree for logs.

use crate::domain::node::{DocumentTree, NodeId};

pub fn render_tree(tree: &DocumentTree) -> String {
    let mut out = String::new();
    render_node(tree, tree.root(), 0, &mut out);
    out
}

fn render_node(tree: &DocumentTree, id: NodeId, depth: usize, out: &mut String) {
    let node = tree.node(id);
    out.push_str(&"  ".repeat(depth));
    out.push_str(node.node_type.as_str());
    out.push_str(": ");
    out.push_str(&node.name);
    out.push('\n');
    for child in tree.children(id) {
        render_node(tree, child, depth + 1, out);
    }
}
