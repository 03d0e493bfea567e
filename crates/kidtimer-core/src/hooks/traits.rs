use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::timer::{CategoryId, CategoryRef, ChildId};

/// Schedules local alerts for timer milestones.
///
/// Calls are fire-and-forget: a hook that fails to deliver must log and
/// return, never block the orchestrator.
pub trait NotificationHook: Send + Sync {
    /// Alert when the countdown ends, `fire_in` from now.
    fn schedule_completion(&self, child_id: ChildId, fire_in: Duration, label: &str);

    /// Alert ahead of the end. `at_fraction` is the elapsed share of the
    /// total duration at which the warning fires.
    fn schedule_warning(&self, child_id: ChildId, at_fraction: f64, fire_in: Duration, label: &str);

    /// Drop every pending alert for this child only.
    fn cancel_all(&self, child_id: ChildId);
}

/// Payload delivered to the points/rewards side exactly once per natural
/// completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionEvent {
    pub child_id: ChildId,
    pub category: CategoryRef,
    pub actual_duration_ms: u64,
    pub completed_at_epoch_ms: u64,
}

/// Receives finished countdowns.
pub trait CompletionSink: Send + Sync {
    fn timer_completed(&self, event: &CompletionEvent);
}

/// Display data for children and categories.
pub trait ProfileDirectory: Send + Sync {
    fn child_name(&self, child_id: ChildId) -> Option<String>;

    fn category(&self, category_id: CategoryId) -> Option<CategoryRef>;
}
