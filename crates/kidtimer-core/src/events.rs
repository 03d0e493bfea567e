use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::{CategoryId, ChildId, ChildTimerState, TimerMode, TimerState};

/// Every state change in the orchestrator produces an Event.
/// The UI subscribes to them; nothing downstream mutates timers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TimerStarted {
        child_id: ChildId,
        mode: TimerMode,
        category_id: CategoryId,
        duration_ms: u64,
        at: DateTime<Utc>,
    },
    TimerPaused {
        child_id: ChildId,
        remaining_ms: Option<u64>,
        at: DateTime<Utc>,
    },
    TimerResumed {
        child_id: ChildId,
        remaining_ms: Option<u64>,
        at: DateTime<Utc>,
    },
    TimerStopped {
        child_id: ChildId,
        previous: TimerState,
        at: DateTime<Utc>,
    },
    TimeAdded {
        child_id: ChildId,
        total_duration_ms: u64,
        remaining_ms: Option<u64>,
        at: DateTime<Utc>,
    },
    /// A countdown reached zero. Emitted once per completion.
    TimerCompleted {
        record: CompletedTimerRecord,
        at: DateTime<Utc>,
    },
    /// Timers were recovered from a snapshot at launch.
    TimersRestored {
        resumed: Vec<ChildId>,
        finalized: Vec<ChildId>,
        at: DateTime<Utc>,
    },
    CompletionDismissed {
        child_id: ChildId,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        child_id: ChildId,
        state: TimerState,
        remaining_ms: Option<u64>,
        elapsed_ms: u64,
        progress: f64,
        at: DateTime<Utc>,
    },
}

impl Event {
    pub fn child_id(&self) -> Option<ChildId> {
        match self {
            Event::TimerStarted { child_id, .. }
            | Event::TimerPaused { child_id, .. }
            | Event::TimerResumed { child_id, .. }
            | Event::TimerStopped { child_id, .. }
            | Event::TimeAdded { child_id, .. }
            | Event::CompletionDismissed { child_id, .. }
            | Event::StateSnapshot { child_id, .. } => Some(*child_id),
            Event::TimerCompleted { record, .. } => Some(record.child_id),
            Event::TimersRestored { .. } => None,
        }
    }

    /// Build a state snapshot event for UI binding.
    pub fn snapshot(timer: &ChildTimerState, now_ms: u64) -> Event {
        Event::StateSnapshot {
            child_id: timer.child_id(),
            state: timer.state(),
            remaining_ms: timer.remaining_ms(now_ms),
            elapsed_ms: timer.elapsed_ms(now_ms),
            progress: timer.progress(now_ms),
            at: timestamp(now_ms),
        }
    }
}

/// A finished countdown waiting for the UI to acknowledge it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedTimerRecord {
    pub child_id: ChildId,
    pub child_name: String,
    pub category_id: CategoryId,
    pub category_name: String,
    #[serde(default)]
    pub category_icon: String,
    pub actual_duration_ms: u64,
    pub completed_at_epoch_ms: u64,
}

impl CompletedTimerRecord {
    pub fn completed_at(&self) -> DateTime<Utc> {
        timestamp(self.completed_at_epoch_ms)
    }
}

/// Epoch milliseconds to a UTC timestamp.
pub fn timestamp(epoch_ms: u64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(epoch_ms as i64).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn events_are_tagged_by_type() {
        let event = Event::CompletionDismissed {
            child_id: Uuid::nil(),
            at: timestamp(0),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "CompletionDismissed");
        assert_eq!(event.child_id(), Some(Uuid::nil()));
    }

    #[test]
    fn timestamp_converts_millis() {
        let at = timestamp(1_700_000_000_123);
        assert_eq!(at.timestamp_millis(), 1_700_000_000_123);
    }
}
