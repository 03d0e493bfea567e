//! # Kidtimer Core Library
//!
//! Per-child activity timers that survive the process being suspended or
//! killed. The CLI binary and any GUI shell are thin layers over this crate.
//!
//! ## Architecture
//!
//! - **Timer machine**: a pure, wall-clock-anchored state machine per child.
//!   Remaining time is always derived from epoch timestamps and the current
//!   time, never decremented.
//! - **Orchestrator**: owns every child's machine, queues completions for the
//!   UI, schedules notifications and persists a snapshot on each change.
//! - **Service**: a tokio task wrapping the orchestrator behind a cloneable
//!   handle, with a tick driver that can be suspended while backgrounded.
//! - **Storage**: snapshot stores (SQLite or atomic JSON file) and TOML
//!   configuration.
//! - **Hooks**: traits for the notification scheduler, the completion sink
//!   and the profile directory, with tracing-backed defaults.
//!
//! ## Key Components
//!
//! - [`ChildTimerState`]: one child's timer
//! - [`TimerOrchestrator`]: multi-child coordination and crash recovery
//! - [`TimerService`] / [`TimerHandle`]: async front end
//! - [`SnapshotStore`]: persistence seam
//! - [`Config`]: application configuration

pub mod error;
pub mod events;
pub mod hooks;
pub mod intent;
pub mod orchestrator;
pub mod storage;
pub mod timer;

pub use error::{ConfigError, CoreError, StorageError, TransitionError};
pub use events::{CompletedTimerRecord, Event};
pub use hooks::{CompletionEvent, CompletionSink, NotificationHook, ProfileDirectory};
pub use intent::{PendingTimerStart, RestorationNotice};
pub use orchestrator::{
    OrchestratorBuilder, RestoreReport, TimerCommand, TimerHandle, TimerOrchestrator,
    TimerService,
};
pub use storage::{Config, JsonFileStore, MemoryStore, Snapshot, SnapshotStore, SqliteSnapshotStore};
pub use timer::{
    CategoryId, CategoryRef, ChildId, ChildTimerState, Clock, ManualClock, SystemClock,
    TimerMode, TimerPreset, TimerState, VisualizationMode,
};
