//! Knowledge store use-case service.
//!
//! # Responsibility
//! - Own the current tree, sessions and settings values for one profile.
//! - Apply edit intents as copy-on-write replacements, then persist.
//!
//! # Invariants
//! - Every mutation replaces the held tree wholesale; snapshots handed out
//!   earlier never change.
//! - `&mut self` is the single-writer point: edits apply in call order.
//! - A failed save never rolls back in-memory state; the value stays
//!   authoritative and is retried on the next save or `flush`.
//! - With `autoSave` off, tree and session edits persist only on `flush`.
//!   Settings edits always persist immediately.
//! - When a save triggers a quota eviction, the held sessions are pruned
//!   with the same cutoff so evicted records are never written back.

use crate::model::node::{KnowledgeNode, KnowledgeTree, NewNode, NodeId, NodePatch, ROOT_NODE_ID};
use crate::model::session::{SessionRecord, Sessions};
use crate::model::settings::Settings;
use crate::quota::eviction::evict_stale;
use crate::quota::usage::StorageEstimate;
use crate::repo::kv_repo::KvBackend;
use crate::search::filter::{filtered_view, search};
use crate::service::conversation::{synthesize_node, ConversationMode, ConversationResponse};
use crate::store::adapter::{KnowledgeStore, StorageInfo};
use crate::store::snapshot::{ExportSnapshot, ImportSnapshot};
use crate::tree::mutate::{add_child, delete_node, insert_child, update_node};
use crate::tree::traverse::{find_node, node_count};
use chrono::Utc;
use log::{debug, info, warn};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Result of an edit that does not create a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationOutcome {
    /// Whether the held value was replaced.
    pub changed: bool,
    /// Whether the held value is known to be durable after this call.
    pub persisted: bool,
}

/// Result of an edit that may create a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddChildOutcome {
    /// Id of the created node; `None` when nothing was created.
    pub node_id: Option<NodeId>,
    pub persisted: bool,
}

/// Explicit store object constructed once per process.
pub struct KnowledgeService<B: KvBackend> {
    store: KnowledgeStore<B>,
    tree: KnowledgeTree,
    sessions: Sessions,
    settings: Settings,
    tree_dirty: bool,
    sessions_dirty: bool,
}

impl<B: KvBackend> KnowledgeService<B> {
    /// Loads every entity from `store`, falling back to defaults.
    pub fn open(store: KnowledgeStore<B>) -> Self {
        let settings = store.load_settings();
        let store = store.with_stale_after(settings.stale_after());
        let tree = store.load_tree();
        let sessions = store.load_sessions();
        info!(
            "event=service_open module=service status=ok nodes={} sessions={} auto_save={}",
            node_count(&tree),
            sessions.len(),
            settings.auto_save
        );
        Self {
            store,
            tree,
            sessions,
            settings,
            tree_dirty: false,
            sessions_dirty: false,
        }
    }

    /// Current tree value. Clone it to keep a snapshot.
    pub fn tree(&self) -> &KnowledgeTree {
        &self.tree
    }

    pub fn find_node(&self, node_id: &str) -> Option<Arc<KnowledgeNode>> {
        find_node(&self.tree, node_id)
    }

    pub fn add_child(&mut self, parent_id: &str, data: NewNode) -> AddChildOutcome {
        let (next, node_id) = add_child(&self.tree, parent_id, data);
        let outcome = self.commit_tree(next);
        AddChildOutcome {
            node_id,
            persisted: outcome.persisted,
        }
    }

    pub fn update_node(&mut self, node_id: &str, patch: &NodePatch) -> MutationOutcome {
        let next = update_node(&self.tree, node_id, patch);
        self.commit_tree(next)
    }

    pub fn delete_node(&mut self, node_id: &str) -> MutationOutcome {
        let next = delete_node(&self.tree, node_id);
        self.commit_tree(next)
    }

    pub fn search(&self, query: &str) -> Vec<Arc<KnowledgeNode>> {
        search(&self.tree, query)
    }

    pub fn filtered_view(&self, query: Option<&str>) -> KnowledgeTree {
        filtered_view(&self.tree, query)
    }

    /// Appends a node for one completed conversation turn under `root`.
    pub fn record_turn(
        &mut self,
        mode: ConversationMode,
        input: &str,
        response: &ConversationResponse,
    ) -> AddChildOutcome {
        let Some(node) = synthesize_node(mode, input, response, Utc::now()) else {
            return AddChildOutcome {
                node_id: None,
                persisted: !self.tree_dirty,
            };
        };
        let (next, node_id) = insert_child(&self.tree, ROOT_NODE_ID, node);
        let outcome = self.commit_tree(next);
        AddChildOutcome {
            node_id,
            persisted: outcome.persisted,
        }
    }

    pub fn record_learning(
        &mut self,
        input: &str,
        response: &ConversationResponse,
    ) -> AddChildOutcome {
        self.record_turn(ConversationMode::Learning, input, response)
    }

    pub fn record_questioning(
        &mut self,
        input: &str,
        response: &ConversationResponse,
    ) -> AddChildOutcome {
        self.record_turn(ConversationMode::Questioning, input, response)
    }

    pub fn sessions(&self) -> &Sessions {
        &self.sessions
    }

    pub fn session(&self, session_id: &str) -> Option<&SessionRecord> {
        self.sessions.get(session_id)
    }

    /// Shallow-merges `attributes` into the session and refreshes `updatedAt`.
    pub fn save_session(
        &mut self,
        session_id: &str,
        attributes: Map<String, Value>,
    ) -> MutationOutcome {
        self.sessions
            .entry(session_id.to_string())
            .or_default()
            .merge(attributes, Utc::now());
        self.sessions_dirty = true;
        MutationOutcome {
            changed: true,
            persisted: self.persist_sessions_if_auto(),
        }
    }

    pub fn delete_session(&mut self, session_id: &str) -> MutationOutcome {
        if self.sessions.remove(session_id).is_none() {
            return MutationOutcome {
                changed: false,
                persisted: !self.sessions_dirty,
            };
        }
        self.sessions_dirty = true;
        MutationOutcome {
            changed: true,
            persisted: self.persist_sessions_if_auto(),
        }
    }

    /// Drops sessions idle longer than `staleSessionDays`.
    ///
    /// Returns the number evicted from the held collection.
    pub fn evict_stale_sessions(&mut self) -> usize {
        let (pruned, evicted) =
            evict_stale(&self.sessions, self.settings.stale_after(), Utc::now());
        if evicted > 0 {
            self.sessions = pruned;
            self.sessions_dirty = true;
            self.persist_sessions_if_auto();
        }
        info!(
            "event=session_evict module=service status=ok evicted={} remaining={}",
            evicted,
            self.sessions.len()
        );
        evicted
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Shallow-merges `patch` into settings and persists them.
    ///
    /// # Errors
    /// Rejects the whole patch, leaving settings untouched, when a known
    /// option has the wrong type or is out of range.
    pub fn update_settings(
        &mut self,
        patch: &Map<String, Value>,
    ) -> Result<MutationOutcome, serde_json::Error> {
        let merged = self.settings.merged(patch).map_err(|err| {
            warn!(
                "event=settings_update module=service status=rejected error={}",
                err
            );
            err
        })?;
        if merged == self.settings {
            return Ok(MutationOutcome {
                changed: false,
                persisted: true,
            });
        }

        self.settings = merged;
        self.store.set_stale_after(self.settings.stale_after());
        let persisted = self.store.save_settings(&self.settings);
        self.adopt_eviction();
        if self.settings.auto_save {
            self.flush();
        }
        Ok(MutationOutcome {
            changed: true,
            persisted,
        })
    }

    /// Writes every value with unsaved edits. Returns `true` when all
    /// held values are durable afterwards.
    pub fn flush(&mut self) -> bool {
        if self.tree_dirty && self.store.save_tree(&self.tree) {
            self.tree_dirty = false;
        }
        self.adopt_eviction();
        if self.sessions_dirty && self.store.save_sessions(&self.sessions) {
            self.sessions_dirty = false;
        }
        self.adopt_eviction();
        !self.tree_dirty && !self.sessions_dirty
    }

    /// Bundles the held (authoritative) values.
    pub fn export_all(&self) -> ExportSnapshot {
        ExportSnapshot::new(
            self.sessions.clone(),
            self.tree.clone(),
            self.settings.clone(),
        )
    }

    /// Installs each present field durably and adopts it in memory.
    pub fn import(&mut self, snapshot: ImportSnapshot) -> bool {
        let ok = self.store.import(&snapshot);
        if let Some(tree) = snapshot.knowledge_graph {
            self.tree = tree;
            self.tree_dirty = !ok;
        }
        if let Some(sessions) = snapshot.sessions {
            self.sessions = sessions;
            self.sessions_dirty = !ok;
        }
        if let Some(settings) = snapshot.settings {
            self.settings = settings;
            self.store.set_stale_after(self.settings.stale_after());
        }
        self.adopt_eviction();
        ok
    }

    /// Removes all durable data and resets held values to defaults.
    pub fn clear_all(&mut self) -> bool {
        let ok = self.store.clear_all();
        self.tree = KnowledgeTree::default();
        self.sessions = Sessions::new();
        self.settings = Settings::default();
        self.store.set_stale_after(self.settings.stale_after());
        self.tree_dirty = false;
        self.sessions_dirty = false;
        info!(
            "event=store_clear module=service status={}",
            if ok { "ok" } else { "error" }
        );
        ok
    }

    pub fn estimate_usage(&self) -> StorageEstimate {
        self.store.estimate_usage()
    }

    pub fn storage_info(&self) -> StorageInfo {
        self.store.storage_info()
    }

    pub fn store(&self) -> &KnowledgeStore<B> {
        &self.store
    }

    /// Tears the service down, returning the store for reuse or inspection.
    pub fn into_store(self) -> KnowledgeStore<B> {
        self.store
    }

    fn commit_tree(&mut self, next: KnowledgeTree) -> MutationOutcome {
        if next.ptr_eq(&self.tree) {
            return MutationOutcome {
                changed: false,
                persisted: !self.tree_dirty,
            };
        }
        self.tree = next;
        self.tree_dirty = true;
        MutationOutcome {
            changed: true,
            persisted: self.persist_tree_if_auto(),
        }
    }

    fn persist_tree_if_auto(&mut self) -> bool {
        if self.settings.auto_save && self.store.save_tree(&self.tree) {
            self.tree_dirty = false;
        }
        self.adopt_eviction();
        !self.tree_dirty
    }

    fn persist_sessions_if_auto(&mut self) -> bool {
        if self.settings.auto_save && self.store.save_sessions(&self.sessions) {
            self.sessions_dirty = false;
        }
        self.adopt_eviction();
        !self.sessions_dirty
    }

    /// Mirrors a quota eviction the store just ran onto the held sessions.
    fn adopt_eviction(&mut self) {
        if !self.store.take_eviction_pass() {
            return;
        }
        let (pruned, evicted) =
            evict_stale(&self.sessions, self.store.stale_after(), Utc::now());
        if evicted > 0 {
            self.sessions = pruned;
        }
        debug!(
            "event=session_evict module=service status=ok source=quota evicted={} remaining={}",
            evicted,
            self.sessions.len()
        );
    }
}
