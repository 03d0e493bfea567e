use std::time::Duration;

use tracing::info;

use super::traits::{CompletionEvent, CompletionSink, NotificationHook};
use crate::timer::ChildId;

/// Notification hook that only logs. Used by the CLI, which has no
/// notification center to talk to.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl NotificationHook for TracingNotifier {
    fn schedule_completion(&self, child_id: ChildId, fire_in: Duration, label: &str) {
        info!(%child_id, fire_in_secs = fire_in.as_secs(), label, "completion alert scheduled");
    }

    fn schedule_warning(&self, child_id: ChildId, at_fraction: f64, fire_in: Duration, label: &str) {
        info!(
            %child_id,
            at_fraction,
            fire_in_secs = fire_in.as_secs(),
            label,
            "warning alert scheduled"
        );
    }

    fn cancel_all(&self, child_id: ChildId) {
        info!(%child_id, "alerts cancelled");
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingCompletionSink;

impl CompletionSink for TracingCompletionSink {
    fn timer_completed(&self, event: &CompletionEvent) {
        info!(
            child_id = %event.child_id,
            category = %event.category.name,
            actual_secs = event.actual_duration_ms / 1000,
            "timer completed"
        );
    }
}
