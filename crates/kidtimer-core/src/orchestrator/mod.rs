//! Multi-child timer orchestration.
//!
//! [`TimerOrchestrator`] owns one [`ChildTimerState`] per child and is the
//! only thing that mutates them. It is synchronous and reads time from an
//! injected [`Clock`]; [`TimerService`] wraps it in a tokio task that
//! serializes commands and drives the periodic tick.
//!
//! ## Lifecycle
//!
//! ```text
//! launch -> restore_on_launch -> (commands | tick)* -> persist_states_on_background
//! ```
//!
//! Snapshots are written on every mutating command, on every completion and
//! on backgrounding. Plain ticks that change nothing never write.

mod notify;
mod service;

pub use service::{TimerCommand, TimerHandle, TimerService};

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::events::{timestamp, CompletedTimerRecord, Event};
use crate::hooks::{
    CompletionEvent, CompletionSink, NotificationHook, ProfileDirectory, StaticDirectory,
    TracingCompletionSink, TracingNotifier,
};
use crate::intent::{PendingTimerStart, RestorationNotice};
use crate::storage::{open_store, Config, Snapshot, SnapshotStore, TimerConfig};
use crate::timer::{
    CategoryId, CategoryRef, ChildId, ChildTimerState, Clock, Completion, SystemClock,
    TimerMode, TimerState, VisualizationMode,
};

const EVENT_CHANNEL_CAPACITY: usize = 256;
const FALLBACK_CHILD_NAME: &str = "Child";
const FALLBACK_CATEGORY_NAME: &str = "Activity";

/// What `restore_on_launch` found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// Children whose timers came back running or paused.
    pub resumed: Vec<ChildId>,
    /// Children whose timers ran out while the process was gone.
    pub finalized: Vec<CompletedTimerRecord>,
}

impl RestoreReport {
    pub fn is_empty(&self) -> bool {
        self.resumed.is_empty() && self.finalized.is_empty()
    }
}

pub struct OrchestratorBuilder {
    store: Arc<dyn SnapshotStore>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn NotificationHook>,
    sink: Arc<dyn CompletionSink>,
    directory: Arc<dyn ProfileDirectory>,
    config: TimerConfig,
}

impl OrchestratorBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn NotificationHook>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn sink(mut self, sink: Arc<dyn CompletionSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn directory(mut self, directory: Arc<dyn ProfileDirectory>) -> Self {
        self.directory = directory;
        self
    }

    pub fn config(mut self, config: TimerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> TimerOrchestrator {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        TimerOrchestrator {
            store: self.store,
            clock: self.clock,
            notifier: self.notifier,
            sink: self.sink,
            directory: self.directory,
            config: self.config,
            timers: BTreeMap::new(),
            completed: VecDeque::new(),
            pending_start: None,
            restoration: None,
            restored: false,
            last_change_ms: 0,
            events,
        }
    }
}

pub struct TimerOrchestrator {
    store: Arc<dyn SnapshotStore>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn NotificationHook>,
    sink: Arc<dyn CompletionSink>,
    directory: Arc<dyn ProfileDirectory>,
    config: TimerConfig,
    /// Only non-idle timers are tracked.
    timers: BTreeMap<ChildId, ChildTimerState>,
    completed: VecDeque<CompletedTimerRecord>,
    pending_start: Option<PendingTimerStart>,
    restoration: Option<RestorationNotice>,
    restored: bool,
    /// Stamped into snapshots so unchanged state encodes identically.
    last_change_ms: u64,
    events: broadcast::Sender<Event>,
}

impl TimerOrchestrator {
    /// Start building an orchestrator around a snapshot store. Everything
    /// else defaults to the system clock and log-only hooks.
    pub fn builder(store: Arc<dyn SnapshotStore>) -> OrchestratorBuilder {
        OrchestratorBuilder {
            store,
            clock: Arc::new(SystemClock),
            notifier: Arc::new(TracingNotifier),
            sink: Arc::new(TracingCompletionSink),
            directory: Arc::new(StaticDirectory::new()),
            config: TimerConfig::default(),
        }
    }

    /// Wire an orchestrator from the application config: the configured
    /// snapshot store, the configured children and categories, and log-only
    /// hooks.
    ///
    /// # Errors
    /// Returns an error if the snapshot store cannot be opened.
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = open_store(&config.storage)?;
        Ok(Self::builder(store)
            .directory(Arc::new(StaticDirectory::from_config(config)))
            .config(config.timer.clone())
            .build())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    pub(crate) fn event_sender(&self) -> broadcast::Sender<Event> {
        self.events.clone()
    }

    pub fn config(&self) -> &TimerConfig {
        &self.config
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn timer_state(&self, child_id: ChildId) -> Option<&ChildTimerState> {
        self.timers.get(&child_id)
    }

    pub fn timer_states(&self) -> impl Iterator<Item = &ChildTimerState> {
        self.timers.values()
    }

    pub fn remaining_ms(&self, child_id: ChildId) -> Option<u64> {
        let now = self.clock.now_ms();
        self.timers.get(&child_id)?.remaining_ms(now)
    }

    /// Current state of one child, as a UI-ready event.
    pub fn state_snapshot(&self, child_id: ChildId) -> Option<Event> {
        let now = self.clock.now_ms();
        self.timers.get(&child_id).map(|t| Event::snapshot(t, now))
    }

    /// Children with a running or paused timer.
    pub fn active_children(&self) -> Vec<ChildId> {
        self.timers
            .values()
            .filter(|t| t.is_active())
            .map(|t| t.child_id())
            .collect()
    }

    pub fn has_active_timer(&self, child_id: ChildId) -> bool {
        self.timers.get(&child_id).is_some_and(|t| t.is_active())
    }

    /// Unacknowledged completions, oldest first.
    pub fn completed_timers(&self) -> Vec<CompletedTimerRecord> {
        self.completed.iter().cloned().collect()
    }

    /// The completion the UI should surface next.
    pub fn next_completed(&self) -> Option<&CompletedTimerRecord> {
        self.completed.front()
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start a timer for `child_id`, replacing whatever that child had.
    ///
    /// A stale unacknowledged completion for the same child is dropped.
    /// Returns `false` (and leaves any existing timer untouched) if the
    /// request itself is invalid.
    pub fn start_timer(
        &mut self,
        child_id: ChildId,
        category_id: CategoryId,
        mode: TimerMode,
        duration_ms: u64,
    ) -> bool {
        let now = self.clock.now_ms();
        let finished = self.collect_completions(now, Some(child_id));

        let child_name = self
            .directory
            .child_name(child_id)
            .unwrap_or_else(|| FALLBACK_CHILD_NAME.to_string());
        let category = self
            .directory
            .category(category_id)
            .unwrap_or_else(|| CategoryRef {
                id: category_id,
                name: FALLBACK_CATEGORY_NAME.to_string(),
                icon: String::new(),
            });

        let mut timer = ChildTimerState::idle(child_id, child_name);
        if let Some(previous) = self.timers.get(&child_id) {
            timer.set_visualization(previous.visualization());
        }
        if let Err(e) = timer.start(now, mode, duration_ms, category) {
            warn!(%child_id, error = %e, "start rejected");
            self.commit(finished);
            return false;
        }

        if let Some(mut previous) = self.timers.remove(&child_id) {
            let was = previous.stop();
            debug!(%child_id, ?was, "replacing existing timer");
            self.notifier.cancel_all(child_id);
        }
        self.completed.retain(|r| r.child_id != child_id);

        notify::schedule(
            self.notifier.as_ref(),
            &timer,
            now,
            &self.config.warning_offsets_secs,
        );
        let event = Event::TimerStarted {
            child_id,
            mode,
            category_id,
            duration_ms: timer.total_duration_ms(),
            at: timestamp(now),
        };
        info!(%child_id, ?mode, duration_ms = timer.total_duration_ms(), "timer started");
        self.timers.insert(child_id, timer);
        self.touch(now);
        self.persist();
        self.announce_all(finished);
        self.emit(event);
        true
    }

    pub fn pause_timer(&mut self, child_id: ChildId) -> bool {
        let now = self.clock.now_ms();
        let finished = self.collect_completions(now, Some(child_id));
        let outcome = match self.timers.get_mut(&child_id) {
            None => None,
            Some(timer) => match timer.pause(now) {
                Ok(()) => Some(timer.remaining_ms(now)),
                Err(e) => {
                    debug!(%child_id, error = %e, "pause ignored");
                    None
                }
            },
        };

        let Some(remaining_ms) = outcome else {
            self.commit(finished);
            return false;
        };
        self.notifier.cancel_all(child_id);
        self.touch(now);
        self.persist();
        self.announce_all(finished);
        self.emit(Event::TimerPaused {
            child_id,
            remaining_ms,
            at: timestamp(now),
        });
        true
    }

    pub fn resume_timer(&mut self, child_id: ChildId) -> bool {
        let now = self.clock.now_ms();
        let outcome = match self.timers.get_mut(&child_id) {
            None => None,
            Some(timer) => match timer.resume(now) {
                Ok(()) => Some(timer.remaining_ms(now)),
                Err(e) => {
                    debug!(%child_id, error = %e, "resume ignored");
                    None
                }
            },
        };

        let Some(remaining_ms) = outcome else {
            return false;
        };
        self.reschedule(child_id, now);
        self.touch(now);
        self.persist();
        self.emit(Event::TimerResumed {
            child_id,
            remaining_ms,
            at: timestamp(now),
        });
        true
    }

    /// Stop and forget a child's timer. Safe to call with nothing running.
    ///
    /// A countdown that already ran out is completed first, so its record
    /// stays queued.
    pub fn stop_timer(&mut self, child_id: ChildId) -> bool {
        let now = self.clock.now_ms();
        let finished = self.collect_completions(now, Some(child_id));
        let Some(mut timer) = self.timers.remove(&child_id) else {
            self.commit(finished);
            return false;
        };
        let previous = timer.stop();
        self.notifier.cancel_all(child_id);
        info!(%child_id, ?previous, "timer stopped");
        self.touch(now);
        self.persist();
        self.announce_all(finished);
        self.emit(Event::TimerStopped {
            child_id,
            previous,
            at: timestamp(now),
        });
        true
    }

    /// Add (or with a negative delta, remove) countdown time.
    pub fn add_time(&mut self, child_id: ChildId, delta_ms: i64) -> bool {
        let now = self.clock.now_ms();
        let finished = self.collect_completions(now, Some(child_id));
        let outcome = match self.timers.get_mut(&child_id) {
            None => None,
            Some(timer) => match timer.add_time(now, delta_ms) {
                Ok(total) => Some((total, timer.remaining_ms(now))),
                Err(e) => {
                    debug!(%child_id, error = %e, "add time ignored");
                    None
                }
            },
        };

        let Some((total_duration_ms, remaining_ms)) = outcome else {
            self.commit(finished);
            return false;
        };
        self.reschedule(child_id, now);
        self.touch(now);
        self.persist();
        self.announce_all(finished);
        self.emit(Event::TimeAdded {
            child_id,
            total_duration_ms,
            remaining_ms,
            at: timestamp(now),
        });
        true
    }

    pub fn set_visualization(&mut self, child_id: ChildId, mode: VisualizationMode) -> bool {
        let now = self.clock.now_ms();
        let Some(timer) = self.timers.get_mut(&child_id) else {
            return false;
        };
        if timer.visualization() == mode {
            return true;
        }
        timer.set_visualization(mode);
        self.touch(now);
        self.persist();
        true
    }

    /// Recompute every running timer from its anchors.
    ///
    /// Returns the completions this tick produced; most ticks produce none
    /// and write nothing.
    pub fn tick(&mut self) -> Vec<CompletedTimerRecord> {
        let now = self.clock.now_ms();
        let finished = self.collect_completions(now, None);
        let records = finished.clone();
        self.commit(finished);
        records
    }

    /// Acknowledge the oldest completion and return it.
    pub fn acknowledge_next_completed(&mut self) -> Option<CompletedTimerRecord> {
        let record = self.completed.pop_front()?;
        self.release_completed(record.child_id);
        Some(record)
    }

    /// Acknowledge every completion for one child.
    pub fn dismiss_completed(&mut self, child_id: ChildId) -> bool {
        let before = self.completed.len();
        self.completed.retain(|r| r.child_id != child_id);
        if self.completed.len() == before {
            return false;
        }
        self.release_completed(child_id);
        true
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Write the full snapshot. Calling it again without an intervening
    /// change writes identical bytes.
    pub fn persist_states_on_background(&mut self) -> Snapshot {
        let snapshot = self.build_snapshot();
        match self.store.save(&snapshot) {
            Ok(()) => info!(timers = snapshot.timers.len(), "timer states persisted"),
            Err(e) => warn!(error = %e, "failed to persist timer states"),
        }
        snapshot
    }

    /// Load the last snapshot and rebuild in-memory state from it.
    ///
    /// Runs once per orchestrator; later calls return an empty report.
    /// Timers that ran out while the process was gone are finalized into the
    /// completed queue, never resumed.
    pub fn restore_on_launch(&mut self) -> RestoreReport {
        if self.restored {
            debug!("restore already ran");
            return RestoreReport::default();
        }
        self.restored = true;

        let Some(snapshot) = self.store.load() else {
            info!("no usable snapshot, cold start");
            return RestoreReport::default();
        };

        let now = self.clock.now_ms();
        self.last_change_ms = self.last_change_ms.max(snapshot.saved_at_epoch_ms);

        let mut report = RestoreReport::default();
        let mut finished = Vec::new();
        let mut carried: Vec<CompletedTimerRecord> = snapshot
            .completed
            .into_iter()
            .filter(|r| !self.completed.contains(r))
            .collect();

        for (child_id, persisted) in snapshot.timers {
            if self.timers.contains_key(&child_id) {
                debug!(%child_id, "in-memory timer is newer than snapshot");
                continue;
            }
            let mut timer = persisted.into_timer();
            match timer.state() {
                TimerState::Idle => continue,
                TimerState::Running => {
                    if let Some(completion) = timer.tick(now) {
                        finished.push(Self::record_for(&timer, completion));
                    } else {
                        report.resumed.push(child_id);
                    }
                }
                TimerState::Paused => report.resumed.push(child_id),
                TimerState::Completed => {}
            }
            self.timers.insert(child_id, timer);
        }

        finished.sort_by_key(|r| r.completed_at_epoch_ms);
        carried.extend(finished.iter().cloned());
        self.completed.extend(carried);
        if self.pending_start.is_none() {
            self.pending_start = snapshot.pending_start;
        }

        for child_id in &report.resumed {
            self.reschedule(*child_id, now);
        }
        for record in &finished {
            self.notifier.cancel_all(record.child_id);
        }

        report.finalized = finished.clone();
        if !report.is_empty() {
            info!(
                resumed = report.resumed.len(),
                finalized = report.finalized.len(),
                "timers restored"
            );
            self.restoration = Some(RestorationNotice {
                resumed: report.resumed.clone(),
                finalized: report.finalized.iter().map(|r| r.child_id).collect(),
                raised_at_epoch_ms: now,
            });
            self.emit(Event::TimersRestored {
                resumed: report.resumed.clone(),
                finalized: report.finalized.iter().map(|r| r.child_id).collect(),
                at: timestamp(now),
            });
        }
        if !finished.is_empty() {
            self.touch(now);
        }
        self.commit(finished);
        report
    }

    /// Whether a restoration notice is waiting. Does not consume it.
    pub fn timers_restored(&self) -> bool {
        let now = self.clock.now_ms();
        self.restoration
            .as_ref()
            .is_some_and(|n| !n.is_expired(now, self.config.restoration_notice_ttl()))
    }

    /// Consume the restoration notice. Returns it at most once.
    pub fn take_restoration_notice(&mut self) -> Option<RestorationNotice> {
        let now = self.clock.now_ms();
        let notice = self.restoration.take()?;
        if notice.is_expired(now, self.config.restoration_notice_ttl()) {
            debug!("restoration notice expired unread");
            return None;
        }
        Some(notice)
    }

    pub fn acknowledge_timer_restoration(&mut self) {
        self.restoration = None;
    }

    /// Record a start request to be picked up by the next foreground UI.
    pub fn queue_pending_start(&mut self, child_id: ChildId, category_id: CategoryId) {
        let now = self.clock.now_ms();
        self.pending_start = Some(PendingTimerStart::new(child_id, category_id, now));
        self.touch(now);
        self.persist();
    }

    /// Take the pending start if it is still fresh. Returns it at most once.
    pub fn consume_pending_start(&mut self) -> Option<PendingTimerStart> {
        let now = self.clock.now_ms();
        let pending = self.pending_start.take()?;
        self.touch(now);
        self.persist();
        if pending.is_expired(now, self.config.pending_start_ttl()) {
            debug!(child_id = %pending.child_id, "pending start expired");
            return None;
        }
        Some(pending)
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// Tick `only` (or every timer) and queue whatever completed. The caller
    /// must persist and then pass the result to [`Self::announce_all`].
    fn collect_completions(
        &mut self,
        now: u64,
        only: Option<ChildId>,
    ) -> Vec<CompletedTimerRecord> {
        let mut finished = Vec::new();
        for (child_id, timer) in self.timers.iter_mut() {
            if only.is_some_and(|id| id != *child_id) {
                continue;
            }
            if let Some(completion) = timer.tick(now) {
                finished.push(Self::record_for(timer, completion));
            }
        }
        finished.sort_by_key(|r| r.completed_at_epoch_ms);
        for record in &finished {
            self.notifier.cancel_all(record.child_id);
            self.completed.push_back(record.clone());
        }
        if !finished.is_empty() {
            self.touch(now);
        }
        finished
    }

    /// Persist and announce completions found outside a mutating command.
    fn commit(&self, finished: Vec<CompletedTimerRecord>) {
        if finished.is_empty() {
            return;
        }
        self.persist();
        self.announce_all(finished);
    }

    /// Hand completions to the sink and the event stream. Callers persist
    /// first so a crash cannot replay an announced completion.
    fn announce_all(&self, finished: Vec<CompletedTimerRecord>) {
        for record in finished {
            info!(child_id = %record.child_id, category = %record.category_name, "timer completed");
            self.sink.timer_completed(&CompletionEvent {
                child_id: record.child_id,
                category: CategoryRef {
                    id: record.category_id,
                    name: record.category_name.clone(),
                    icon: record.category_icon.clone(),
                },
                actual_duration_ms: record.actual_duration_ms,
                completed_at_epoch_ms: record.completed_at_epoch_ms,
            });
            let at = record.completed_at();
            self.emit(Event::TimerCompleted { record, at });
        }
    }

    fn record_for(timer: &ChildTimerState, completion: Completion) -> CompletedTimerRecord {
        let category = timer.category().cloned().unwrap_or_else(|| CategoryRef {
            id: CategoryId::nil(),
            name: FALLBACK_CATEGORY_NAME.to_string(),
            icon: String::new(),
        });
        CompletedTimerRecord {
            child_id: timer.child_id(),
            child_name: timer.child_name().to_string(),
            category_id: category.id,
            category_name: category.name,
            category_icon: category.icon,
            actual_duration_ms: completion.actual_duration_ms,
            completed_at_epoch_ms: completion.completed_at_epoch_ms,
        }
    }

    /// After a completion is acknowledged, the child's machine goes idle.
    fn release_completed(&mut self, child_id: ChildId) {
        let now = self.clock.now_ms();
        if self
            .timers
            .get(&child_id)
            .is_some_and(|t| t.state() == TimerState::Completed)
        {
            self.timers.remove(&child_id);
        }
        self.touch(now);
        self.persist();
        self.emit(Event::CompletionDismissed {
            child_id,
            at: timestamp(now),
        });
    }

    fn reschedule(&self, child_id: ChildId, now: u64) {
        if let Some(timer) = self.timers.get(&child_id) {
            notify::reschedule(
                self.notifier.as_ref(),
                timer,
                now,
                &self.config.warning_offsets_secs,
            );
        }
    }

    fn build_snapshot(&self) -> Snapshot {
        let mut snapshot = Snapshot::new(self.last_change_ms);
        for timer in self.timers.values() {
            snapshot.insert(timer.clone());
        }
        snapshot.completed = self.completed.iter().cloned().collect();
        snapshot.pending_start = self.pending_start.clone();
        snapshot
    }

    fn persist(&self) {
        let snapshot = self.build_snapshot();
        if let Err(e) = self.store.save(&snapshot) {
            warn!(error = %e, "failed to persist timer snapshot");
        }
    }

    fn touch(&mut self, now: u64) {
        self.last_change_ms = now;
    }

    fn emit(&self, event: Event) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
