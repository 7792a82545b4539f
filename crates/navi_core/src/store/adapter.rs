//! JSON persistence of tree, sessions and settings over a `KvBackend`.
//!
//! # Responsibility
//! - Serialize values to JSON text and write them under fixed keys.
//! - Recover from capacity failures with one eviction pass and one retry.
//! - Read values back, substituting defaults for missing or malformed data.
//!
//! # Invariants
//! - `save` and `load` never panic and never surface errors to callers;
//!   failures are logged and reported as `false` or as the default value.
//! - A failed save leaves the previously stored value untouched.
//! - A capacity failure triggers at most one eviction and one retry.
//! - Compression is applied only to the retried write.
//! - Every eviction pass is flagged until the owner takes the flag, so a
//!   holder of in-memory sessions can prune them the same way.

use crate::model::node::KnowledgeTree;
use crate::model::session::Sessions;
use crate::model::settings::{Settings, DEFAULT_STALE_SESSION_DAYS};
use crate::quota::compress::compress;
use crate::quota::eviction::evict_stale;
use crate::quota::usage::{estimate_usage, format_bytes, StorageEstimate};
use crate::repo::kv_repo::{KvBackend, KvError};
use crate::store::snapshot::{ExportSnapshot, ImportSnapshot};
use chrono::{Duration, Utc};
use log::{debug, error, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Durable key of the knowledge tree.
pub const KNOWLEDGE_GRAPH_KEY: &str = "navi_knowledge_graph";
/// Durable key of the session collection.
pub const SESSIONS_KEY: &str = "navi_sessions";
/// Durable key of the settings mapping.
pub const SETTINGS_KEY: &str = "navi_settings";

/// Every durable key with its short display name.
pub const STORAGE_KEYS: [(&str, &str); 3] = [
    ("sessions", SESSIONS_KEY),
    ("knowledge_graph", KNOWLEDGE_GRAPH_KEY),
    ("settings", SETTINGS_KEY),
];

const BYTES_DECIMALS: usize = 2;

/// Size of one stored entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyUsage {
    pub name: String,
    pub size: u64,
    pub size_formatted: String,
}

impl KeyUsage {
    fn new(name: &str, size: u64) -> Self {
        Self {
            name: name.to_string(),
            size,
            size_formatted: format_bytes(size, BYTES_DECIMALS),
        }
    }
}

/// Per-key value sizes plus their total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageInfo {
    pub entries: Vec<KeyUsage>,
    pub total: KeyUsage,
}

/// Persistent store adapter.
///
/// Constructed once per process over an injected backend; dropping it (or
/// calling [`KnowledgeStore::into_backend`]) is the teardown.
pub struct KnowledgeStore<B: KvBackend> {
    backend: B,
    stale_after: Duration,
    eviction_pending: bool,
}

impl<B: KvBackend> KnowledgeStore<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            stale_after: Duration::days(i64::from(DEFAULT_STALE_SESSION_DAYS)),
            eviction_pending: false,
        }
    }

    /// Overrides the session age past which eviction removes a session.
    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn set_stale_after(&mut self, stale_after: Duration) {
        self.stale_after = stale_after;
    }

    pub fn stale_after(&self) -> Duration {
        self.stale_after
    }

    /// Returns whether stale sessions were evicted from durable storage (or
    /// from a retried sessions write) since the last call, and clears the flag.
    pub fn take_eviction_pass(&mut self) -> bool {
        std::mem::take(&mut self.eviction_pending)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Serializes `value` as JSON and writes it under `key`.
    ///
    /// Returns `false` on serialization failure, on a non-capacity backend
    /// failure, or when the post-eviction retry also fails.
    pub fn save<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> bool {
        let json = match serde_json::to_value(value) {
            Ok(json) => json,
            Err(err) => {
                error!(
                    "event=store_save module=store status=error key={} error_code=serialize_failed error={}",
                    key, err
                );
                return false;
            }
        };
        self.write_json(key, &json)
    }

    /// Reads and decodes the value under `key`.
    ///
    /// Missing keys, unreadable storage and malformed JSON all yield
    /// `default`; the latter two are logged.
    pub fn load<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        let text = match self.backend.get(key) {
            Ok(Some(text)) => text,
            Ok(None) => return default,
            Err(err) => {
                error!(
                    "event=store_load module=store status=error key={} error_code=read_failed error={}",
                    key, err
                );
                return default;
            }
        };

        match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(err) => {
                warn!(
                    "event=store_load module=store status=malformed key={} bytes={} error={}",
                    key,
                    text.len(),
                    err
                );
                default
            }
        }
    }

    /// Removes `key` from the medium.
    pub fn remove(&mut self, key: &str) -> bool {
        match self.backend.remove(key) {
            Ok(()) => true,
            Err(err) => {
                error!(
                    "event=store_remove module=store status=error key={} error={}",
                    key, err
                );
                false
            }
        }
    }

    pub fn load_tree(&self) -> KnowledgeTree {
        self.load(KNOWLEDGE_GRAPH_KEY, KnowledgeTree::default())
    }

    pub fn save_tree(&mut self, tree: &KnowledgeTree) -> bool {
        self.save(KNOWLEDGE_GRAPH_KEY, tree)
    }

    pub fn load_sessions(&self) -> Sessions {
        self.load(SESSIONS_KEY, Sessions::new())
    }

    pub fn save_sessions(&mut self, sessions: &Sessions) -> bool {
        self.save(SESSIONS_KEY, sessions)
    }

    /// Loads settings merged over their defaults.
    pub fn load_settings(&self) -> Settings {
        self.load(SETTINGS_KEY, Settings::default())
    }

    pub fn save_settings(&mut self, settings: &Settings) -> bool {
        self.save(SETTINGS_KEY, settings)
    }

    /// Prunes stale sessions in durable storage.
    ///
    /// Returns the number of sessions evicted. Tree and settings are left
    /// untouched.
    pub fn run_eviction(&mut self) -> usize {
        let sessions = self.load_sessions();
        let (pruned, evicted) = evict_stale(&sessions, self.stale_after, Utc::now());
        if evicted == 0 {
            info!("event=quota_evict module=quota status=ok evicted=0");
            return 0;
        }
        self.eviction_pending = true;

        let written = serde_json::to_string(&pruned)
            .map_err(|err| err.to_string())
            .and_then(|text| {
                self.backend
                    .set(SESSIONS_KEY, &text)
                    .map_err(|err| err.to_string())
            });
        match written {
            Ok(()) => info!(
                "event=quota_evict module=quota status=ok evicted={} remaining={}",
                evicted,
                pruned.len()
            ),
            Err(err) => warn!(
                "event=quota_evict module=quota status=error evicted={} error={}",
                evicted, err
            ),
        }
        evicted
    }

    pub fn estimate_usage(&self) -> StorageEstimate {
        estimate_usage(&self.backend)
    }

    /// Reports the stored size of every durable key.
    pub fn storage_info(&self) -> StorageInfo {
        let entries = STORAGE_KEYS
            .iter()
            .map(|(name, key)| {
                let size = match self.backend.get(key) {
                    Ok(value) => value.map_or(0, |text| text.len() as u64),
                    Err(err) => {
                        warn!(
                            "event=store_info module=store status=error key={} error={}",
                            key, err
                        );
                        0
                    }
                };
                KeyUsage::new(name, size)
            })
            .collect::<Vec<_>>();
        let total = entries.iter().map(|entry| entry.size).sum();
        StorageInfo {
            entries,
            total: KeyUsage::new("total", total),
        }
    }

    /// Bundles the durable tree, sessions and settings.
    pub fn export_all(&self) -> ExportSnapshot {
        ExportSnapshot::new(self.load_sessions(), self.load_tree(), self.load_settings())
    }

    /// Installs each field present in `snapshot` independently.
    ///
    /// Returns `true` when every present field was written.
    pub fn import(&mut self, snapshot: &ImportSnapshot) -> bool {
        let mut ok = true;
        if let Some(sessions) = &snapshot.sessions {
            ok &= self.save_sessions(sessions);
        }
        if let Some(tree) = &snapshot.knowledge_graph {
            ok &= self.save_tree(tree);
        }
        if let Some(settings) = &snapshot.settings {
            ok &= self.save_settings(settings);
        }
        info!(
            "event=store_import module=store status={} sessions={} knowledge_graph={} settings={}",
            if ok { "ok" } else { "error" },
            snapshot.sessions.is_some(),
            snapshot.knowledge_graph.is_some(),
            snapshot.settings.is_some()
        );
        ok
    }

    /// Removes every durable key.
    pub fn clear_all(&mut self) -> bool {
        let mut ok = true;
        for (_, key) in STORAGE_KEYS {
            ok &= self.remove(key);
        }
        ok
    }

    fn write_json(&mut self, key: &str, value: &Value) -> bool {
        let text = value.to_string();
        match self.backend.set(key, &text) {
            Ok(()) => {
                debug!(
                    "event=store_save module=store status=ok key={} bytes={}",
                    key,
                    text.len()
                );
                true
            }
            Err(err) if err.is_capacity_exceeded() => self.retry_after_eviction(key, value, &err),
            Err(err) => {
                error!(
                    "event=store_save module=store status=error key={} error_code=write_failed error={}",
                    key, err
                );
                false
            }
        }
    }

    fn retry_after_eviction(&mut self, key: &str, value: &Value, cause: &KvError) -> bool {
        warn!(
            "event=store_save module=store status=capacity_exceeded key={} error={}",
            key, cause
        );
        self.run_eviction();

        let candidate = if key == SESSIONS_KEY {
            self.eviction_pending = true;
            self.prune_sessions_value(value)
        } else {
            value.clone()
        };
        let text = compress(&candidate).to_string();

        match self.backend.set(key, &text) {
            Ok(()) => {
                info!(
                    "event=store_save module=store status=ok key={} attempt=retry bytes={}",
                    key,
                    text.len()
                );
                true
            }
            Err(err) => {
                error!(
                    "event=store_save module=store status=error key={} attempt=retry error_code=capacity_exhausted error={}",
                    key, err
                );
                false
            }
        }
    }

    /// Applies stale-session eviction to a sessions value about to be written.
    fn prune_sessions_value(&self, value: &Value) -> Value {
        let Ok(sessions) = serde_json::from_value::<Sessions>(value.clone()) else {
            return value.clone();
        };
        let (pruned, _) = evict_stale(&sessions, self.stale_after, Utc::now());
        serde_json::to_value(&pruned).unwrap_or_else(|_| value.clone())
    }
}
