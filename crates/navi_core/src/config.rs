//! Process configuration for opening a knowledge store.
//!
//! # Invariants
//! - Opening a configuration always applies pending schema migrations.
//! - `quota_bytes: None` means the medium has no byte quota of its own.

use crate::db::DbLocation;
use crate::repo::kv_repo::{KvResult, SqliteKvBackend};
use crate::service::knowledge_service::KnowledgeService;
use crate::store::adapter::KnowledgeStore;
use std::path::PathBuf;

/// Where the store lives and how much it may hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub location: DbLocation,
    pub quota_bytes: Option<u64>,
}

impl StoreConfig {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            location: DbLocation::File(path.into()),
            quota_bytes: None,
        }
    }

    pub fn in_memory() -> Self {
        Self {
            location: DbLocation::Memory,
            quota_bytes: None,
        }
    }

    pub fn with_quota(mut self, quota_bytes: Option<u64>) -> Self {
        self.quota_bytes = quota_bytes;
        self
    }

    /// Opens the SQLite medium and wraps it in a store adapter.
    pub fn open_store(&self) -> KvResult<KnowledgeStore<SqliteKvBackend>> {
        let backend = SqliteKvBackend::open(&self.location, self.quota_bytes)?;
        Ok(KnowledgeStore::new(backend))
    }

    /// Opens the store and loads a service over it.
    pub fn open_service(&self) -> KvResult<KnowledgeService<SqliteKvBackend>> {
        Ok(KnowledgeService::open(self.open_store()?))
    }
}

#[cfg(test)]
mod tests {
    use super::StoreConfig;
    use crate::db::DbLocation;
    use crate::repo::kv_repo::KvBackend;

    #[test]
    fn file_config_defaults_to_unbounded() {
        let config = StoreConfig::file("/tmp/navi.db");
        assert_eq!(config.location, DbLocation::File("/tmp/navi.db".into()));
        assert_eq!(config.quota_bytes, None);
    }

    #[test]
    fn in_memory_store_carries_quota() {
        let store = StoreConfig::in_memory()
            .with_quota(Some(4096))
            .open_store()
            .unwrap();
        assert_eq!(store.backend().capacity_bytes(), Some(4096));
    }
}
