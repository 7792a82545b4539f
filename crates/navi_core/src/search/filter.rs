//! Substring search and filtered display view over the knowledge tree.
//!
//! # Responsibility
//! - Return flat, pre-order match lists for a query.
//! - Decide per branch whether a filtered view keeps it.
//!
//! # Invariants
//! - Matching is case-insensitive substring on `title` or `content`.
//! - A query that is blank after trimming matches nothing; the view treats
//!   a blank or absent query as "no filter" instead.
//! - Memoized branch results live for one `FilterPass` only.

use crate::model::node::{KnowledgeNode, KnowledgeTree, NodeId};
use crate::tree::traverse::walk_preorder;
use std::collections::HashMap;
use std::sync::Arc;

/// Returns every node whose title or content contains `query`.
///
/// Results are in pre-order (parent before children, children in stored
/// order). Each call traverses the tree afresh.
pub fn search(tree: &KnowledgeTree, query: &str) -> Vec<Arc<KnowledgeNode>> {
    let Some(needle) = normalize_query(query) else {
        return Vec::new();
    };

    let mut hits = Vec::new();
    walk_preorder(tree, |node| {
        if node_matches_normalized(node, &needle) {
            hits.push(Arc::clone(node));
        }
    });
    hits
}

/// Whether `node` itself matches `query`.
pub fn node_matches(node: &KnowledgeNode, query: &str) -> bool {
    normalize_query(query).is_some_and(|needle| node_matches_normalized(node, &needle))
}

/// Whether `node` or any of its descendants matches `query`.
///
/// Uncached; use [`FilterPass`] when evaluating many branches of one tree.
pub fn node_or_descendant_matches(node: &KnowledgeNode, query: &str) -> bool {
    match FilterPass::new(query) {
        Some(mut pass) => pass.branch_matches(node),
        None => false,
    }
}

/// Builds the display view for an optional query.
///
/// `None` or a blank query returns the tree unchanged. Otherwise only
/// branches containing a match survive; the root is always kept.
pub fn filtered_view(tree: &KnowledgeTree, query: Option<&str>) -> KnowledgeTree {
    let Some(mut pass) = query.and_then(FilterPass::new) else {
        return tree.clone();
    };

    let root = tree.root();
    let children = root
        .children
        .iter()
        .filter_map(|child| pass.keep_branch(child))
        .collect::<Vec<_>>();
    KnowledgeTree::from_shared(Arc::new(root.with_children(children)))
}

/// One render pass worth of branch-match memoization.
#[derive(Debug)]
pub struct FilterPass {
    needle: String,
    memo: HashMap<NodeId, bool>,
}

impl FilterPass {
    /// Returns `None` for a blank query (filtering disabled).
    pub fn new(query: &str) -> Option<Self> {
        normalize_query(query).map(|needle| Self {
            needle,
            memo: HashMap::new(),
        })
    }

    /// Bottom-up "this node or any descendant matches", memoized by id.
    pub fn branch_matches(&mut self, node: &KnowledgeNode) -> bool {
        if let Some(cached) = self.memo.get(&node.id) {
            return *cached;
        }

        let mut any_child = false;
        for child in &node.children {
            any_child |= self.branch_matches(child);
        }
        let matched = any_child || node_matches_normalized(node, &self.needle);
        self.memo.insert(node.id.clone(), matched);
        matched
    }

    fn keep_branch(&mut self, node: &Arc<KnowledgeNode>) -> Option<Arc<KnowledgeNode>> {
        if !self.branch_matches(node) {
            return None;
        }
        let children = node
            .children
            .iter()
            .filter_map(|child| self.keep_branch(child))
            .collect::<Vec<_>>();
        if children.len() == node.children.len() {
            return Some(Arc::clone(node));
        }
        Some(Arc::new(node.with_children(children)))
    }
}

fn normalize_query(query: &str) -> Option<String> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_lowercase())
}

fn node_matches_normalized(node: &KnowledgeNode, needle: &str) -> bool {
    node.title.to_lowercase().contains(needle) || node.content.to_lowercase().contains(needle)
}
