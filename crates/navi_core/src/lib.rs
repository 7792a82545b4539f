//! Core domain logic for the NAVI hierarchical knowledge store.
//! This crate is the single source of truth for tree and storage invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod quota;
pub mod repo;
pub mod search;
pub mod service;
pub mod store;
pub mod tree;

pub use config::StoreConfig;
pub use db::{open_db, open_db_in_memory, DbError, DbLocation, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::node::{
    generate_node_id, KnowledgeNode, KnowledgeTree, NewNode, NodeId, NodePatch, NodeType,
    TreeValidationError, ROOT_NODE_ID,
};
pub use model::session::{SessionRecord, Sessions};
pub use model::settings::Settings;
pub use quota::usage::{format_bytes, StorageEstimate};
pub use repo::kv_repo::{KvBackend, KvError, KvResult, MemoryKvBackend, SqliteKvBackend};
pub use search::filter::{filtered_view, search};
pub use service::conversation::{ConversationMode, ConversationResponse};
pub use service::knowledge_service::{AddChildOutcome, KnowledgeService, MutationOutcome};
pub use store::adapter::{KnowledgeStore, StorageInfo};
pub use store::snapshot::{ExportSnapshot, ImportSnapshot};
pub use tree::mutate::{add_child, delete_node, update_node};

/// Version of the core crate, reported by the CLI's `--version`.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
