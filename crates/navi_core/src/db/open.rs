//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections.
//! - Configure connection pragmas and run migrations before first use.
//!
//! # Invariants
//! - Returned connections have migrations fully applied.
//! - Every open attempt emits one `db_open` start event and one outcome event.

use super::migrations::{apply_migrations, MigrationReport};
use super::{DbError, DbResult};
use log::{error, info};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Where the key-value medium lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbLocation {
    File(PathBuf),
    Memory,
}

impl DbLocation {
    fn mode(&self) -> &'static str {
        match self {
            Self::File(_) => "file",
            Self::Memory => "memory",
        }
    }

    /// Opens this location and applies pending migrations.
    pub fn open(&self) -> DbResult<Connection> {
        let started_at = Instant::now();
        let mode = self.mode();
        info!("event=db_open module=db status=start mode={mode}");

        let opened = match self {
            Self::File(path) => Connection::open(path),
            Self::Memory => Connection::open_in_memory(),
        };
        let mut conn = match opened {
            Ok(conn) => conn,
            Err(err) => {
                error!(
                    "event=db_open module=db status=error mode={} duration_ms={} error_code=db_open_failed error={}",
                    mode,
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(DbError::from(err));
            }
        };

        match bootstrap_connection(&mut conn) {
            Ok(report) => {
                info!(
                    "event=db_open module=db status=ok mode={} schema_version={} migrated={} duration_ms={}",
                    mode,
                    report.to_version,
                    report.applied(),
                    started_at.elapsed().as_millis()
                );
                Ok(conn)
            }
            Err(err) => {
                error!(
                    "event=db_open module=db status=error mode={} duration_ms={} error_code=db_bootstrap_failed error={}",
                    mode,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }
}

/// Opens a SQLite database file and applies all pending migrations.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    DbLocation::File(path.as_ref().to_path_buf()).open()
}

/// Opens an in-memory SQLite database and applies all pending migrations.
pub fn open_db_in_memory() -> DbResult<Connection> {
    DbLocation::Memory.open()
}

fn bootstrap_connection(conn: &mut Connection) -> DbResult<MigrationReport> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    apply_migrations(conn)
}
