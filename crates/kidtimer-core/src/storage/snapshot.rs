//! The persisted image of every child's timer.
//!
//! A snapshot is always written whole. Reads never fail upward: a missing,
//! truncated, undecodable or future-versioned snapshot is a cold start.

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::StorageError;
use crate::events::CompletedTimerRecord;
use crate::intent::PendingTimerStart;
use crate::timer::{ChildId, ChildTimerState};

pub const SNAPSHOT_VERSION: u32 = 1;

/// One child's raw timer anchors plus when they were written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedTimer {
    #[serde(flatten)]
    pub timer: ChildTimerState,
    pub saved_at_epoch_ms: u64,
}

impl PersistedTimer {
    /// The machine as it stood at `saved_at_epoch_ms`.
    pub fn into_timer(self) -> ChildTimerState {
        let mut timer = self.timer;
        timer.repair_pause_anchor(self.saved_at_epoch_ms);
        timer
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub saved_at_epoch_ms: u64,
    pub timers: BTreeMap<ChildId, PersistedTimer>,
    /// Completions the UI has not acknowledged yet.
    #[serde(default)]
    pub completed: Vec<CompletedTimerRecord>,
    #[serde(default)]
    pub pending_start: Option<PendingTimerStart>,
}

impl Snapshot {
    pub fn new(saved_at_epoch_ms: u64) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            saved_at_epoch_ms,
            timers: BTreeMap::new(),
            completed: Vec::new(),
            pending_start: None,
        }
    }

    pub fn insert(&mut self, timer: ChildTimerState) {
        self.timers.insert(
            timer.child_id(),
            PersistedTimer {
                timer,
                saved_at_epoch_ms: self.saved_at_epoch_ms,
            },
        );
    }

    pub fn encode(&self) -> Result<String, StorageError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode, treating anything unreadable as absent.
    pub fn decode(raw: &str) -> Option<Snapshot> {
        match serde_json::from_str::<Snapshot>(raw) {
            Ok(snapshot) if snapshot.version == SNAPSHOT_VERSION => Some(snapshot),
            Ok(snapshot) => {
                warn!(
                    version = snapshot.version,
                    "ignoring snapshot with unsupported version"
                );
                None
            }
            Err(e) => {
                warn!(error = %e, "ignoring undecodable snapshot");
                None
            }
        }
    }
}

/// Atomic whole-snapshot persistence.
pub trait SnapshotStore: Send + Sync {
    /// Replace the stored snapshot. Either the old or the new snapshot
    /// survives a crash, never a mix.
    fn save(&self, snapshot: &Snapshot) -> Result<(), StorageError>;

    /// `None` when nothing usable is stored.
    fn load(&self) -> Option<Snapshot>;

    /// Remove one child's entry, leaving the others untouched.
    fn clear(&self, child_id: ChildId) -> Result<(), StorageError> {
        if let Some(mut snapshot) = self.load() {
            if snapshot.timers.remove(&child_id).is_some() {
                self.save(&snapshot)?;
            }
        }
        Ok(())
    }
}

/// Keeps the encoded snapshot in memory. Still goes through JSON so tests
/// exercise the same codec as the durable stores.
#[derive(Debug, Default)]
pub struct MemoryStore {
    raw: Mutex<Option<String>>,
    saves: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored JSON, if any.
    pub fn raw(&self) -> Option<String> {
        self.raw.lock().ok().and_then(|raw| raw.clone())
    }

    /// Overwrite the stored bytes directly, e.g. with garbage.
    pub fn put_raw(&self, raw: impl Into<String>) {
        if let Ok(mut slot) = self.raw.lock() {
            *slot = Some(raw.into());
        }
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.lock().map(|n| *n).unwrap_or(0)
    }
}

impl SnapshotStore for MemoryStore {
    fn save(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        let encoded = snapshot.encode()?;
        *self.raw.lock().map_err(|_| StorageError::Poisoned)? = Some(encoded);
        *self.saves.lock().map_err(|_| StorageError::Poisoned)? += 1;
        Ok(())
    }

    fn load(&self) -> Option<Snapshot> {
        let raw = self.raw()?;
        debug!(bytes = raw.len(), "loading in-memory snapshot");
        Snapshot::decode(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::{CategoryRef, TimerMode};
    use uuid::Uuid;

    fn running_timer(child_id: ChildId) -> ChildTimerState {
        let mut timer = ChildTimerState::idle(child_id, "Mia");
        timer
            .start(
                1_000,
                TimerMode::Countdown,
                60_000,
                CategoryRef {
                    id: Uuid::new_v4(),
                    name: "Piano".into(),
                    icon: String::new(),
                },
            )
            .unwrap();
        timer
    }

    #[test]
    fn persisted_layout_is_flat_per_child() {
        let child = Uuid::new_v4();
        let mut snapshot = Snapshot::new(5_000);
        snapshot.insert(running_timer(child));

        let json: serde_json::Value = serde_json::from_str(&snapshot.encode().unwrap()).unwrap();
        let entry = &json["timers"][child.to_string()];
        assert_eq!(entry["child_id"], child.to_string());
        assert_eq!(entry["started_at_epoch_ms"], 1_000);
        assert_eq!(entry["total_duration_ms"], 60_000);
        assert_eq!(entry["accumulated_paused_ms"], 0);
        assert_eq!(entry["state"], "running");
        assert_eq!(entry["saved_at_epoch_ms"], 5_000);
    }

    #[test]
    fn paused_entry_without_anchor_freezes_at_save_time() {
        let child = Uuid::new_v4();
        let mut timer = running_timer(child);
        timer.pause(21_000).unwrap();
        let mut snapshot = Snapshot::new(31_000);
        snapshot.insert(timer);

        let mut json: serde_json::Value =
            serde_json::from_str(&snapshot.encode().unwrap()).unwrap();
        let entry = &mut json["timers"][child.to_string()];
        entry.as_object_mut().unwrap().remove("paused_at_epoch_ms");

        let decoded = Snapshot::decode(&json.to_string()).unwrap();
        let timer = decoded.timers[&child].clone().into_timer();
        assert_eq!(timer.paused_at_epoch_ms(), Some(31_000));
        assert_eq!(timer.remaining_ms(9_999_999), Some(30_000));
    }

    #[test]
    fn corrupt_or_foreign_data_reads_as_absent() {
        assert!(Snapshot::decode("").is_none());
        assert!(Snapshot::decode("{\"version\": 1, \"timers\": ").is_none());
        assert!(Snapshot::decode("[1, 2, 3]").is_none());

        let mut future = Snapshot::new(0);
        future.version = SNAPSHOT_VERSION + 1;
        assert!(Snapshot::decode(&future.encode().unwrap()).is_none());
    }

    #[test]
    fn memory_store_clear_removes_one_child() {
        let store = MemoryStore::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut snapshot = Snapshot::new(5_000);
        snapshot.insert(running_timer(a));
        snapshot.insert(running_timer(b));
        store.save(&snapshot).unwrap();

        store.clear(a).unwrap();
        let loaded = store.load().unwrap();
        assert!(!loaded.timers.contains_key(&a));
        assert_eq!(loaded.timers[&b], snapshot.timers[&b]);

        // Clearing an absent child does not write.
        let saves = store.save_count();
        store.clear(a).unwrap();
        assert_eq!(store.save_count(), saves);
    }

    #[test]
    fn empty_memory_store_loads_nothing() {
        let store = MemoryStore::new();
        assert!(store.load().is_none());
        store.put_raw("not json");
        assert!(store.load().is_none());
    }
}
