//! Knowledge node domain model.
//!
//! # Responsibility
//! - Define the canonical tree node shared by mutation, search and storage.
//! - Provide the immutable `KnowledgeTree` value callers hold as state.
//!
//! # Invariants
//! - The top node of every `KnowledgeTree` has id `root`.
//! - Node ids are non-empty and unique within one tree.
//! - `children` is always present and keeps insertion order.
//! - A `KnowledgeTree` is never mutated in place; edits build a new value and
//!   share untouched subtrees through `Arc`.

use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

/// Stable identifier of a knowledge node.
pub type NodeId = String;

/// Id of the single top node of every tree.
pub const ROOT_NODE_ID: &str = "root";
/// Title applied when a new node is created without one.
pub const DEFAULT_NODE_TITLE: &str = "新知识点";
/// Title of the root node in a freshly created profile.
pub const ROOT_NODE_TITLE: &str = "我的知识库";
/// Content of the root node in a freshly created profile.
pub const ROOT_NODE_CONTENT: &str = "个人知识图谱根节点";

/// Provenance tag of a knowledge node.
///
/// Used for presentation only; mutation logic never branches on it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    /// Derived from a learning-mode conversation turn.
    Learning,
    /// Derived from a questioning-mode conversation turn.
    Questioning,
    /// Created directly by the user.
    #[default]
    Manual,
    /// Seeded by the application.
    System,
}

impl NodeType {
    /// Stable wire value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Learning => "learning",
            Self::Questioning => "questioning",
            Self::Manual => "manual",
            Self::System => "system",
        }
    }
}

impl Display for NodeType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "learning" => Ok(Self::Learning),
            "questioning" => Ok(Self::Questioning),
            "manual" => Ok(Self::Manual),
            "system" => Ok(Self::System),
            other => Err(format!(
                "unsupported node type `{other}`; expected learning|questioning|manual|system"
            )),
        }
    }
}

/// One node of the knowledge tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeNode {
    pub id: NodeId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    /// Serialized as `type` to match the durable record layout.
    #[serde(rename = "type", default)]
    pub kind: NodeType,
    /// RFC 3339 creation time. Required for conversation-derived nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub children: Vec<Arc<KnowledgeNode>>,
}

impl KnowledgeNode {
    /// Builds the root node used for a fresh profile.
    pub fn default_root() -> Self {
        Self {
            id: ROOT_NODE_ID.to_string(),
            title: ROOT_NODE_TITLE.to_string(),
            content: ROOT_NODE_CONTENT.to_string(),
            kind: NodeType::System,
            timestamp: None,
            children: Vec::new(),
        }
    }

    /// Copies this node's own fields onto a new child list.
    pub(crate) fn with_children(&self, children: Vec<Arc<KnowledgeNode>>) -> Self {
        Self {
            id: self.id.clone(),
            title: self.title.clone(),
            content: self.content.clone(),
            kind: self.kind,
            timestamp: self.timestamp.clone(),
            children,
        }
    }

    pub fn is_root(&self) -> bool {
        self.id == ROOT_NODE_ID
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Caller-supplied fields for a node about to be created.
///
/// Missing or empty fields fall back to defaults in [`NewNode::into_node`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NewNode {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<NodeType>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl NewNode {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn kind(mut self, kind: NodeType) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    /// Materializes a leaf node with the given id.
    pub fn into_node(self, id: NodeId) -> KnowledgeNode {
        KnowledgeNode {
            id,
            title: self
                .title
                .filter(|title| !title.is_empty())
                .unwrap_or_else(|| DEFAULT_NODE_TITLE.to_string()),
            content: self.content.unwrap_or_default(),
            kind: self.kind.unwrap_or_default(),
            timestamp: self.timestamp,
            children: Vec::new(),
        }
    }
}

/// Shallow field patch for an existing node.
///
/// There is no `id` or `children` field: identity and structure cannot be
/// edited through a patch. When decoded from JSON, those keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NodePatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<NodeType>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl NodePatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.kind.is_none()
            && self.timestamp.is_none()
    }

    /// Returns a copy of `node` with patched fields overriding its own.
    pub fn apply(&self, node: &KnowledgeNode) -> KnowledgeNode {
        KnowledgeNode {
            id: node.id.clone(),
            title: self.title.clone().unwrap_or_else(|| node.title.clone()),
            content: self.content.clone().unwrap_or_else(|| node.content.clone()),
            kind: self.kind.unwrap_or(node.kind),
            timestamp: self.timestamp.clone().or_else(|| node.timestamp.clone()),
            children: node.children.clone(),
        }
    }
}

/// Structural invariant violations of a knowledge tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeValidationError {
    /// Top node id is not `root`.
    RootIdMismatch(NodeId),
    /// A node carries an empty id.
    EmptyNodeId,
    /// Two nodes share the same id.
    DuplicateNodeId(NodeId),
}

impl Display for TreeValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RootIdMismatch(found) => {
                write!(f, "top node id must be `{ROOT_NODE_ID}`, got `{found}`")
            }
            Self::EmptyNodeId => write!(f, "node id must not be empty"),
            Self::DuplicateNodeId(id) => write!(f, "duplicate node id: {id}"),
        }
    }
}

impl Error for TreeValidationError {}

/// Immutable knowledge tree value.
///
/// Cloning is cheap and yields a snapshot that later edits never affect.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "KnowledgeNode")]
pub struct KnowledgeTree {
    root: Arc<KnowledgeNode>,
}

impl KnowledgeTree {
    /// Validates `root` and wraps it as a tree.
    pub fn from_root(root: KnowledgeNode) -> Result<Self, TreeValidationError> {
        validate_root(&root)?;
        Ok(Self {
            root: Arc::new(root),
        })
    }

    /// Wraps an already validated root produced by tree rewriting.
    pub(crate) fn from_shared(root: Arc<KnowledgeNode>) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Arc<KnowledgeNode> {
        &self.root
    }

    /// Whether both values are the same snapshot (no rebuild happened).
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.root, &other.root)
    }

    /// Re-checks the structural invariants.
    pub fn validate(&self) -> Result<(), TreeValidationError> {
        validate_root(&self.root)
    }
}

impl Default for KnowledgeTree {
    fn default() -> Self {
        Self {
            root: Arc::new(KnowledgeNode::default_root()),
        }
    }
}

impl TryFrom<KnowledgeNode> for KnowledgeTree {
    type Error = TreeValidationError;

    fn try_from(value: KnowledgeNode) -> Result<Self, Self::Error> {
        Self::from_root(value)
    }
}

impl Serialize for KnowledgeTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.root.serialize(serializer)
    }
}

/// Generates a fresh node id of the form `<prefix>_<uuid>`.
pub fn generate_node_id(prefix: &str) -> NodeId {
    format!("{prefix}_{}", Uuid::new_v4().simple())
}

fn validate_root(root: &KnowledgeNode) -> Result<(), TreeValidationError> {
    if root.id != ROOT_NODE_ID {
        return Err(TreeValidationError::RootIdMismatch(root.id.clone()));
    }

    let mut seen = HashSet::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.id.is_empty() {
            return Err(TreeValidationError::EmptyNodeId);
        }
        if !seen.insert(node.id.as_str()) {
            return Err(TreeValidationError::DuplicateNodeId(node.id.clone()));
        }
        stack.extend(node.children.iter().map(Arc::as_ref));
    }
    Ok(())
}
