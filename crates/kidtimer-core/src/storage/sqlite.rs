//! SQLite-backed snapshot store.
//!
//! Uses a single-row key/value table; every save is one
//! `INSERT OR REPLACE`, which SQLite applies atomically.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};
use tracing::warn;

use super::data_dir;
use super::snapshot::{Snapshot, SnapshotStore};
use crate::error::StorageError;
use crate::timer::ChildId;

const SNAPSHOT_KEY: &str = "timer_snapshot";

pub struct SqliteSnapshotStore {
    conn: Mutex<Connection>,
}

impl SqliteSnapshotStore {
    /// Open the database at `~/.config/kidtimer/kidtimer.db`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_default() -> Result<Self, StorageError> {
        Self::open(data_dir()?.join("kidtimer.db"))
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        Self::with_connection(Connection::open(path)?)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, StorageError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }

    fn kv_get(conn: &Connection, key: &str) -> Result<Option<String>, rusqlite::Error> {
        conn.query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
            row.get::<_, String>(0)
        })
        .optional()
    }

    fn kv_set(conn: &Connection, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}

impl SnapshotStore for SqliteSnapshotStore {
    fn save(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        let encoded = snapshot.encode()?;
        let conn = self.conn()?;
        Self::kv_set(&conn, SNAPSHOT_KEY, &encoded)?;
        Ok(())
    }

    fn load(&self) -> Option<Snapshot> {
        let conn = match self.conn() {
            Ok(conn) => conn,
            Err(e) => {
                warn!(error = %e, "snapshot database unavailable");
                return None;
            }
        };
        match Self::kv_get(&conn, SNAPSHOT_KEY) {
            Ok(Some(raw)) => Snapshot::decode(&raw),
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "cannot read snapshot row");
                None
            }
        }
    }

    fn clear(&self, child_id: ChildId) -> Result<(), StorageError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        if let Some(mut snapshot) = Self::kv_get(&tx, SNAPSHOT_KEY)?
            .as_deref()
            .and_then(Snapshot::decode)
        {
            if snapshot.timers.remove(&child_id).is_some() {
                Self::kv_set(&tx, SNAPSHOT_KEY, &snapshot.encode()?)?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}
