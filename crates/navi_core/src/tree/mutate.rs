//! Copy-on-write edits over `KnowledgeTree`.
//!
//! # Responsibility
//! - Produce a new tree for add/update/delete requests.
//! - Rebuild only the path to the edited node; share everything else.
//!
//! # Invariants
//! - The input tree is never modified; callers may keep and compare it.
//! - A request whose target is missing returns the input snapshot itself
//!   (`ptr_eq` holds) and emits a `debug` diagnostic.
//! - `root` can never be deleted.
//! - New children are always appended at the end.

use crate::model::node::{
    generate_node_id, KnowledgeNode, KnowledgeTree, NewNode, NodeId, NodePatch, ROOT_NODE_ID,
};
use crate::tree::traverse::contains;
use log::{debug, warn};
use std::sync::Arc;

const NODE_ID_PREFIX: &str = "node";

/// Appends a new node built from `data` under `parent_id`.
///
/// Returns the new tree and the id of the created node. When `parent_id`
/// does not exist, returns the input tree and `None`; no node is created.
pub fn add_child(
    tree: &KnowledgeTree,
    parent_id: &str,
    data: NewNode,
) -> (KnowledgeTree, Option<NodeId>) {
    let node = data.into_node(generate_node_id(NODE_ID_PREFIX));
    insert_child(tree, parent_id, node)
}

/// Appends a prepared leaf node under `parent_id`.
///
/// Rejects nodes whose id is already present so that id uniqueness holds.
pub(crate) fn insert_child(
    tree: &KnowledgeTree,
    parent_id: &str,
    mut node: KnowledgeNode,
) -> (KnowledgeTree, Option<NodeId>) {
    if contains(tree, &node.id) {
        warn!(
            "event=tree_add_child module=tree status=rejected reason=duplicate_id node_id={}",
            node.id
        );
        return (tree.clone(), None);
    }

    node.children.clear();
    let node_id = node.id.clone();
    let child = Arc::new(node);
    let rebuilt = rewrite_first(tree.root(), parent_id, &|parent: &KnowledgeNode| {
        let mut children = Vec::with_capacity(parent.children.len() + 1);
        children.extend(parent.children.iter().cloned());
        children.push(Arc::clone(&child));
        parent.with_children(children)
    });

    match rebuilt {
        Some(root) => {
            debug!(
                "event=tree_add_child module=tree status=ok parent_id={} node_id={}",
                parent_id, node_id
            );
            (KnowledgeTree::from_shared(root), Some(node_id))
        }
        None => {
            debug!(
                "event=tree_add_child module=tree status=not_found parent_id={}",
                parent_id
            );
            (tree.clone(), None)
        }
    }
}

/// Shallow-merges `patch` into the node with `node_id`.
///
/// Identity and children are never touched. Missing target is a no-op.
pub fn update_node(tree: &KnowledgeTree, node_id: &str, patch: &NodePatch) -> KnowledgeTree {
    match rewrite_first(tree.root(), node_id, &|node: &KnowledgeNode| patch.apply(node)) {
        Some(root) => {
            debug!(
                "event=tree_update_node module=tree status=ok node_id={}",
                node_id
            );
            KnowledgeTree::from_shared(root)
        }
        None => {
            debug!(
                "event=tree_update_node module=tree status=not_found node_id={}",
                node_id
            );
            tree.clone()
        }
    }
}

/// Removes the node with `node_id` and its whole subtree.
///
/// Every level of the tree is searched. Deleting `root` returns the input.
pub fn delete_node(tree: &KnowledgeTree, node_id: &str) -> KnowledgeTree {
    if node_id == ROOT_NODE_ID {
        debug!("event=tree_delete_node module=tree status=rejected reason=root_guard");
        return tree.clone();
    }

    match prune(tree.root(), node_id) {
        Some(root) => {
            debug!(
                "event=tree_delete_node module=tree status=ok node_id={}",
                node_id
            );
            KnowledgeTree::from_shared(root)
        }
        None => {
            debug!(
                "event=tree_delete_node module=tree status=not_found node_id={}",
                node_id
            );
            tree.clone()
        }
    }
}

/// Rewrites the first node (pre-order) whose id equals `target`.
///
/// Returns `None` when no node matched; otherwise the rebuilt ancestor chain
/// with untouched siblings shared by reference.
fn rewrite_first(
    node: &Arc<KnowledgeNode>,
    target: &str,
    edit: &dyn Fn(&KnowledgeNode) -> KnowledgeNode,
) -> Option<Arc<KnowledgeNode>> {
    if node.id == target {
        return Some(Arc::new(edit(node.as_ref())));
    }

    for (index, child) in node.children.iter().enumerate() {
        if let Some(replacement) = rewrite_first(child, target, edit) {
            let mut children = node.children.clone();
            children[index] = replacement;
            return Some(Arc::new(node.with_children(children)));
        }
    }
    None
}

fn prune(node: &Arc<KnowledgeNode>, target: &str) -> Option<Arc<KnowledgeNode>> {
    let mut changed = false;
    let mut children = Vec::with_capacity(node.children.len());
    for child in &node.children {
        if child.id == target {
            changed = true;
            continue;
        }
        match prune(child, target) {
            Some(rebuilt) => {
                changed = true;
                children.push(rebuilt);
            }
            None => children.push(Arc::clone(child)),
        }
    }

    if changed {
        Some(Arc::new(node.with_children(children)))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::{add_child, delete_node, insert_child, update_node};
    use crate::model::node::{KnowledgeTree, NewNode, NodePatch, NodeType};
    use crate::tree::traverse::find_node;
    use std::sync::Arc;

    #[test]
    fn add_child_shares_untouched_siblings() {
        let tree = KnowledgeTree::default();
        let (tree, a) = add_child(&tree, "root", NewNode::titled("A"));
        let (tree, b) = add_child(&tree, "root", NewNode::titled("B"));
        let (a, b) = (a.unwrap(), b.unwrap());

        let (next, _) = add_child(&tree, &b, NewNode::titled("B1"));

        let old_a = find_node(&tree, &a).unwrap();
        let new_a = find_node(&next, &a).unwrap();
        assert!(Arc::ptr_eq(&old_a, &new_a));
        assert!(find_node(&tree, &b).unwrap().is_leaf());
        assert_eq!(find_node(&next, &b).unwrap().children.len(), 1);
    }

    #[test]
    fn add_child_to_missing_parent_returns_same_snapshot() {
        let tree = KnowledgeTree::default();
        let (next, id) = add_child(&tree, "missing", NewNode::titled("x"));
        assert!(id.is_none());
        assert!(next.ptr_eq(&tree));
    }

    #[test]
    fn insert_child_rejects_duplicate_id() {
        let tree = KnowledgeTree::default();
        let node = NewNode::titled("dup").into_node("root".to_string());
        let (next, id) = insert_child(&tree, "root", node);
        assert!(id.is_none());
        assert!(next.ptr_eq(&tree));
    }

    #[test]
    fn update_merges_only_patched_fields() {
        let tree = KnowledgeTree::default();
        let (tree, id) = add_child(
            &tree,
            "root",
            NewNode::titled("before")
                .content("body")
                .kind(NodeType::Learning),
        );
        let id = id.unwrap();

        let patch = NodePatch {
            title: Some("after".to_string()),
            ..NodePatch::default()
        };
        let next = update_node(&tree, &id, &patch);
        let node = find_node(&next, &id).unwrap();
        assert_eq!(node.title, "after");
        assert_eq!(node.content, "body");
        assert_eq!(node.kind, NodeType::Learning);
        assert_eq!(find_node(&tree, &id).unwrap().title, "before");
    }

    #[test]
    fn delete_root_is_guarded() {
        let tree = KnowledgeTree::default();
        let (tree, _) = add_child(&tree, "root", NewNode::titled("A"));
        let next = delete_node(&tree, "root");
        assert!(next.ptr_eq(&tree));
        assert_eq!(next.root().children.len(), 1);
    }

    #[test]
    fn delete_missing_node_is_noop() {
        let tree = KnowledgeTree::default();
        let next = delete_node(&tree, "ghost");
        assert!(next.ptr_eq(&tree));
    }
}
