//! Shared fixture for orchestrator integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use kidtimer_core::hooks::{RecordingNotifier, RecordingSink, StaticDirectory};
use kidtimer_core::{
    CategoryId, CategoryRef, ChildId, ChildTimerState, ManualClock, MemoryStore, Snapshot,
    SnapshotStore, TimerMode, TimerOrchestrator,
};
use uuid::Uuid;

pub const T0: u64 = 1_700_000_000_000;

pub fn secs(n: u64) -> u64 {
    n * 1000
}

/// One simulated device: clock, storage and hooks outlive any single
/// orchestrator, so tests can "kill" the process and relaunch.
pub struct Device {
    pub clock: Arc<ManualClock>,
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub sink: Arc<RecordingSink>,
    pub directory: StaticDirectory,
    pub emma: ChildId,
    pub noah: ChildId,
    pub reading: CategoryId,
    pub lego: CategoryId,
}

impl Device {
    pub fn new() -> Self {
        let emma = Uuid::new_v4();
        let noah = Uuid::new_v4();
        let reading = Uuid::new_v4();
        let lego = Uuid::new_v4();
        let directory = StaticDirectory::new()
            .with_child(emma, "Emma")
            .with_child(noah, "Noah")
            .with_category(CategoryRef {
                id: reading,
                name: "Reading".into(),
                icon: "book".into(),
            })
            .with_category(CategoryRef {
                id: lego,
                name: "Lego".into(),
                icon: "cube".into(),
            });
        Self {
            clock: Arc::new(ManualClock::new(T0)),
            store: Arc::new(MemoryStore::new()),
            notifier: Arc::new(RecordingNotifier::new()),
            sink: Arc::new(RecordingSink::new()),
            directory,
            emma,
            noah,
            reading,
            lego,
        }
    }

    /// A fresh process on this device.
    pub fn launch(&self) -> TimerOrchestrator {
        TimerOrchestrator::builder(self.store.clone())
            .clock(self.clock.clone())
            .notifier(self.notifier.clone())
            .sink(self.sink.clone())
            .directory(Arc::new(self.directory.clone()))
            .build()
    }

    pub fn advance(&self, ms: u64) {
        self.clock.advance(Duration::from_millis(ms));
    }

    pub fn now(&self) -> u64 {
        use kidtimer_core::Clock;
        self.clock.now_ms()
    }

    /// Write a snapshot holding one running countdown, as a previous
    /// process would have left it.
    pub fn seed_running(&self, child: ChildId, started_at: u64, total_ms: u64) {
        let mut timer = ChildTimerState::idle(child, "Emma");
        timer
            .start(
                started_at,
                TimerMode::Countdown,
                total_ms,
                CategoryRef {
                    id: self.reading,
                    name: "Reading".into(),
                    icon: "book".into(),
                },
            )
            .unwrap();
        let mut snapshot = Snapshot::new(started_at);
        snapshot.insert(timer);
        self.store.save(&snapshot).unwrap();
    }
}
