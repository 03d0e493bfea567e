mod config;
mod json_file;
mod snapshot;
mod sqlite;

pub use config::{CategoryEntry, ChildEntry, Config, StorageBackend, StorageConfig, TimerConfig};
pub use json_file::JsonFileStore;
pub use snapshot::{MemoryStore, PersistedTimer, Snapshot, SnapshotStore, SNAPSHOT_VERSION};
pub use sqlite::SqliteSnapshotStore;

use std::path::PathBuf;
use std::sync::Arc;

use crate::error::StorageError;

/// Open the snapshot store selected in `[storage]`.
///
/// # Errors
/// Returns an error if the data directory or the database cannot be opened.
pub fn open_store(storage: &StorageConfig) -> Result<Arc<dyn SnapshotStore>, StorageError> {
    let store: Arc<dyn SnapshotStore> = match (storage.backend, storage.path.as_ref()) {
        (StorageBackend::Sqlite, Some(path)) => Arc::new(SqliteSnapshotStore::open(path)?),
        (StorageBackend::Sqlite, None) => Arc::new(SqliteSnapshotStore::open_default()?),
        (StorageBackend::Json, Some(path)) => Arc::new(JsonFileStore::new(path.clone())),
        (StorageBackend::Json, None) => Arc::new(JsonFileStore::open_default()?),
    };
    Ok(store)
}

/// Returns `~/.config/kidtimer[-dev]/` based on KIDTIMER_ENV.
///
/// Set KIDTIMER_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, StorageError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("KIDTIMER_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("kidtimer-dev")
    } else {
        base_dir.join("kidtimer")
    };

    std::fs::create_dir_all(&dir).map_err(|source| StorageError::Io {
        path: dir.clone(),
        source,
    })?;
    Ok(dir)
}
