//! Knowledge nodes synthesized from completed conversation turns.
//!
//! # Responsibility
//! - Turn a user input plus a tutoring response into a timestamped node.
//!
//! # Invariants
//! - Titles and response excerpts are cut on character boundaries.
//! - Synthesized nodes always carry a timestamp and a fresh prefixed id.

use crate::model::node::{generate_node_id, KnowledgeNode, NewNode, NodeType};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;

const LEARNING_TITLE_CHARS: usize = 30;
const QUESTIONING_TITLE_CHARS: usize = 25;
const RESPONSE_EXCERPT_CHARS: usize = 200;
const ELLIPSIS: &str = "...";

/// Completed response delivered by the external conversational backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConversationResponse {
    pub content: String,
}

impl ConversationResponse {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// Conversation panel a turn came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationMode {
    Learning,
    Questioning,
}

impl ConversationMode {
    fn node_type(self) -> NodeType {
        match self {
            Self::Learning => NodeType::Learning,
            Self::Questioning => NodeType::Questioning,
        }
    }
}

/// Builds the node recording one conversation turn.
///
/// Returns `None` for blank input.
pub fn synthesize_node(
    mode: ConversationMode,
    input: &str,
    response: &ConversationResponse,
    now: DateTime<Utc>,
) -> Option<KnowledgeNode> {
    if input.trim().is_empty() {
        return None;
    }

    let excerpt = truncate_chars(&response.content, RESPONSE_EXCERPT_CHARS);
    let (title, content) = match mode {
        ConversationMode::Learning => (
            truncate_chars(input, LEARNING_TITLE_CHARS),
            format!("问题: {input}\n学习指导: {excerpt}"),
        ),
        ConversationMode::Questioning => (
            format!("质疑: {}", truncate_chars(input, QUESTIONING_TITLE_CHARS)),
            format!("原问题: {input}\n批判思考: {excerpt}"),
        ),
    };
    let kind = mode.node_type();

    Some(
        NewNode::titled(title)
            .content(content)
            .kind(kind)
            .timestamp(now.to_rfc3339_opts(SecondsFormat::Millis, true))
            .into_node(generate_node_id(kind.as_str())),
    )
}

/// Keeps the first `max_chars` characters, appending `...` when cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => format!("{}{ELLIPSIS}", &text[..byte_index]),
        None => text.to_string(),
    }
}
