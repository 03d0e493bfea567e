use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use super::traits::{CompletionEvent, CompletionSink, NotificationHook};
use crate::timer::ChildId;

#[derive(Debug, Clone, PartialEq)]
pub enum NotificationCall {
    Completion {
        child_id: ChildId,
        fire_in: Duration,
        label: String,
    },
    Warning {
        child_id: ChildId,
        at_fraction: f64,
        fire_in: Duration,
        label: String,
    },
    CancelAll {
        child_id: ChildId,
    },
}

impl NotificationCall {
    pub fn child_id(&self) -> ChildId {
        match self {
            NotificationCall::Completion { child_id, .. }
            | NotificationCall::Warning { child_id, .. }
            | NotificationCall::CancelAll { child_id } => *child_id,
        }
    }
}

/// Keeps every call in order, for assertions.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    calls: Mutex<Vec<NotificationCall>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<NotificationCall> {
        lock(&self.calls).clone()
    }

    /// Alerts still pending for a child: everything scheduled after its last
    /// `cancel_all`.
    pub fn pending_for(&self, child_id: ChildId) -> Vec<NotificationCall> {
        let calls = lock(&self.calls);
        let mine: Vec<_> = calls.iter().filter(|c| c.child_id() == child_id).collect();
        let start = mine
            .iter()
            .rposition(|c| matches!(c, NotificationCall::CancelAll { .. }))
            .map(|i| i + 1)
            .unwrap_or(0);
        mine[start..].iter().map(|c| (*c).clone()).collect()
    }

    pub fn clear(&self) {
        lock(&self.calls).clear();
    }

    fn push(&self, call: NotificationCall) {
        lock(&self.calls).push(call);
    }
}

impl NotificationHook for RecordingNotifier {
    fn schedule_completion(&self, child_id: ChildId, fire_in: Duration, label: &str) {
        self.push(NotificationCall::Completion {
            child_id,
            fire_in,
            label: label.to_string(),
        });
    }

    fn schedule_warning(&self, child_id: ChildId, at_fraction: f64, fire_in: Duration, label: &str) {
        self.push(NotificationCall::Warning {
            child_id,
            at_fraction,
            fire_in,
            label: label.to_string(),
        });
    }

    fn cancel_all(&self, child_id: ChildId) {
        self.push(NotificationCall::CancelAll { child_id });
    }
}

#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<CompletionEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<CompletionEvent> {
        lock(&self.events).clone()
    }

    pub fn count_for(&self, child_id: ChildId) -> usize {
        lock(&self.events)
            .iter()
            .filter(|e| e.child_id == child_id)
            .count()
    }
}

impl CompletionSink for RecordingSink {
    fn timer_completed(&self, event: &CompletionEvent) {
        lock(&self.events).push(event.clone());
    }
}

// A panicking test thread must not hide the calls recorded before it.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
