//! Read-only traversal helpers over `KnowledgeTree`.

use crate::model::node::{KnowledgeNode, KnowledgeTree};
use std::sync::Arc;

/// Visits every node parent-before-children, children in stored order.
pub fn walk_preorder<F>(tree: &KnowledgeTree, mut visit: F)
where
    F: FnMut(&Arc<KnowledgeNode>),
{
    let mut stack = vec![tree.root()];
    while let Some(node) = stack.pop() {
        visit(node);
        stack.extend(node.children.iter().rev());
    }
}

/// Finds the node with `node_id`.
pub fn find_node(tree: &KnowledgeTree, node_id: &str) -> Option<Arc<KnowledgeNode>> {
    let mut stack = vec![tree.root()];
    while let Some(node) = stack.pop() {
        if node.id == node_id {
            return Some(Arc::clone(node));
        }
        stack.extend(node.children.iter().rev());
    }
    None
}

pub fn contains(tree: &KnowledgeTree, node_id: &str) -> bool {
    find_node(tree, node_id).is_some()
}

/// Total number of nodes, root included.
pub fn node_count(tree: &KnowledgeTree) -> usize {
    let mut count = 0;
    walk_preorder(tree, |_| count += 1);
    count
}

/// Number of levels; a root-only tree has depth 1.
pub fn depth(tree: &KnowledgeTree) -> usize {
    fn level(node: &KnowledgeNode) -> usize {
        1 + node
            .children
            .iter()
            .map(|child| level(child))
            .max()
            .unwrap_or(0)
    }
    level(tree.root())
}
