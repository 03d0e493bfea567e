//! Snapshot file written by temp-file-and-rename.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};

use super::data_dir;
use super::snapshot::{Snapshot, SnapshotStore};
use crate::error::StorageError;
use crate::timer::ChildId;

/// Stores the snapshot as a single JSON file.
///
/// The new contents are written and synced to a sibling `.tmp` file, then
/// renamed over the target, so a crash mid-write leaves the previous
/// snapshot intact.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// `~/.config/kidtimer/timers.json`.
    pub fn open_default() -> Result<Self, StorageError> {
        Ok(Self::new(data_dir()?.join("timers.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "timers.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn write_atomically(&self, contents: &str) -> Result<(), StorageError> {
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| StorageError::Io { path, source }
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err(parent))?;
        }

        let tmp = self.temp_path();
        let mut file = File::create(&tmp).map_err(io_err(&tmp))?;
        file.write_all(contents.as_bytes()).map_err(io_err(&tmp))?;
        file.sync_all().map_err(io_err(&tmp))?;
        drop(file);

        fs::rename(&tmp, &self.path).map_err(io_err(&self.path))
    }

    fn read(&self) -> Option<Snapshot> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => Snapshot::decode(&raw),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no snapshot file");
                None
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "cannot read snapshot file");
                None
            }
        }
    }
}

impl SnapshotStore for JsonFileStore {
    fn save(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        let encoded = snapshot.encode()?;
        let _guard = self.write_lock.lock().map_err(|_| StorageError::Poisoned)?;
        self.write_atomically(&encoded)
    }

    fn load(&self) -> Option<Snapshot> {
        self.read()
    }

    fn clear(&self, child_id: ChildId) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().map_err(|_| StorageError::Poisoned)?;
        if let Some(mut snapshot) = self.read() {
            if snapshot.timers.remove(&child_id).is_some() {
                self.write_atomically(&snapshot.encode()?)?;
            }
        }
        Ok(())
    }
}
