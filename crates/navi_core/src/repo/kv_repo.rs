//! Key-value medium contracts and implementations.
//!
//! # Responsibility
//! - Provide per-key atomic get/set/remove over JSON text values.
//! - Account stored bytes and enforce an optional capacity.
//!
//! # Invariants
//! - A failed `set` leaves the previous value of that key untouched.
//! - Entry size is the UTF-8 byte length of key plus value.
//! - Capacity exhaustion is always reported as `KvError::CapacityExceeded`,
//!   whether detected by the quota check or signaled by SQLite.

use crate::db::{DbError, DbLocation};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Result type used by key-value backend operations.
pub type KvResult<T> = Result<T, KvError>;

/// Errors from key-value backend operations.
#[derive(Debug)]
pub enum KvError {
    /// The medium has no room for the write.
    CapacityExceeded {
        key: String,
        requested_bytes: u64,
        available_bytes: Option<u64>,
    },
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
}

impl KvError {
    pub fn is_capacity_exceeded(&self) -> bool {
        matches!(self, Self::CapacityExceeded { .. })
    }
}

impl Display for KvError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CapacityExceeded {
                key,
                requested_bytes,
                available_bytes: Some(available),
            } => write!(
                f,
                "storage capacity exceeded writing `{key}`: requested {requested_bytes} bytes, {available} available"
            ),
            Self::CapacityExceeded {
                key,
                requested_bytes,
                available_bytes: None,
            } => write!(
                f,
                "storage capacity exceeded writing `{key}`: requested {requested_bytes} bytes"
            ),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for KvError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::CapacityExceeded { .. } => None,
            Self::Db(err) => Some(err),
        }
    }
}

impl From<DbError> for KvError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for KvError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Durable key-value medium used by the knowledge store.
pub trait KvBackend {
    /// Reads the value stored under `key`.
    fn get(&self, key: &str) -> KvResult<Option<String>>;
    /// Replaces the value under `key` atomically.
    fn set(&mut self, key: &str, value: &str) -> KvResult<()>;
    /// Removes `key`; removing a missing key succeeds.
    fn remove(&mut self, key: &str) -> KvResult<()>;
    /// Bytes currently used by all entries.
    fn used_bytes(&self) -> KvResult<u64>;
    /// Configured capacity in bytes, when known.
    fn capacity_bytes(&self) -> Option<u64>;
}

fn entry_size(key: &str, value: &str) -> u64 {
    (key.len() + value.len()) as u64
}

/// Checks whether replacing `key`'s entry keeps usage within `capacity`.
fn ensure_fits(
    key: &str,
    value: &str,
    used: u64,
    existing_entry: u64,
    capacity: Option<u64>,
) -> KvResult<()> {
    let Some(capacity) = capacity else {
        return Ok(());
    };
    let requested = entry_size(key, value);
    let available = capacity.saturating_sub(used.saturating_sub(existing_entry));
    if requested > available {
        return Err(KvError::CapacityExceeded {
            key: key.to_string(),
            requested_bytes: requested,
            available_bytes: Some(available),
        });
    }
    Ok(())
}

/// SQLite-backed key-value medium.
pub struct SqliteKvBackend {
    conn: Connection,
    capacity: Option<u64>,
}

impl SqliteKvBackend {
    /// Opens `location`, applying migrations, with an optional byte capacity.
    pub fn open(location: &DbLocation, capacity: Option<u64>) -> KvResult<Self> {
        let conn = location.open()?;
        Ok(Self { conn, capacity })
    }

    /// Wraps an already migrated connection.
    pub fn from_connection(conn: Connection, capacity: Option<u64>) -> Self {
        Self { conn, capacity }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn existing_entry_size(&self, key: &str) -> KvResult<u64> {
        let size = self
            .conn
            .query_row(
                "SELECT LENGTH(CAST(key AS BLOB)) + LENGTH(CAST(value AS BLOB))
                 FROM kv_entries
                 WHERE key = ?1;",
                [key],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(size.map_or(0, |value| value.max(0) as u64))
    }
}

impl KvBackend for SqliteKvBackend {
    fn get(&self, key: &str) -> KvResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM kv_entries WHERE key = ?1;",
                [key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&mut self, key: &str, value: &str) -> KvResult<()> {
        if self.capacity.is_some() {
            let used = self.used_bytes()?;
            let existing = self.existing_entry_size(key)?;
            ensure_fits(key, value, used, existing, self.capacity)?;
        }

        let written = self.conn.execute(
            "INSERT INTO kv_entries (key, value, updated_at)
             VALUES (?1, ?2, strftime('%s', 'now') * 1000)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at;",
            params![key, value],
        );

        match written {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(failure, _))
                if failure.code == ErrorCode::DiskFull =>
            {
                Err(KvError::CapacityExceeded {
                    key: key.to_string(),
                    requested_bytes: entry_size(key, value),
                    available_bytes: None,
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    fn remove(&mut self, key: &str) -> KvResult<()> {
        self.conn
            .execute("DELETE FROM kv_entries WHERE key = ?1;", [key])?;
        Ok(())
    }

    fn used_bytes(&self) -> KvResult<u64> {
        let used = self.conn.query_row(
            "SELECT COALESCE(SUM(LENGTH(CAST(key AS BLOB)) + LENGTH(CAST(value AS BLOB))), 0)
             FROM kv_entries;",
            [],
            |row| row.get::<_, i64>(0),
        )?;
        Ok(used.max(0) as u64)
    }

    fn capacity_bytes(&self) -> Option<u64> {
        self.capacity
    }
}

/// In-process key-value medium with an optional byte capacity.
#[derive(Debug, Clone, Default)]
pub struct MemoryKvBackend {
    entries: BTreeMap<String, String>,
    capacity: Option<u64>,
}

impl MemoryKvBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            entries: BTreeMap::new(),
            capacity: Some(capacity),
        }
    }

    pub fn set_capacity(&mut self, capacity: Option<u64>) {
        self.capacity = capacity;
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl KvBackend for MemoryKvBackend {
    fn get(&self, key: &str) -> KvResult<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> KvResult<()> {
        let existing = self
            .entries
            .get(key)
            .map_or(0, |current| entry_size(key, current));
        ensure_fits(key, value, self.used_bytes()?, existing, self.capacity)?;
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> KvResult<()> {
        self.entries.remove(key);
        Ok(())
    }

    fn used_bytes(&self) -> KvResult<u64> {
        Ok(self
            .entries
            .iter()
            .map(|(key, value)| entry_size(key, value))
            .sum())
    }

    fn capacity_bytes(&self) -> Option<u64> {
        self.capacity
    }
}
