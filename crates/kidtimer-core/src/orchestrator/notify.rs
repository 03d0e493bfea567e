use std::time::Duration;

use crate::hooks::NotificationHook;
use crate::timer::{ChildTimerState, TimerState};

/// "Emma's Reading"
pub(crate) fn label(timer: &ChildTimerState) -> String {
    let category = timer.category().map(|c| c.name.as_str()).unwrap_or("Activity");
    format!("{}'s {}", timer.child_name(), category)
}

/// Schedule the completion alert and every warning that still lies ahead.
/// Only running countdowns get alerts.
pub(crate) fn schedule(
    notifier: &dyn NotificationHook,
    timer: &ChildTimerState,
    now_ms: u64,
    warning_offsets_secs: &[u64],
) {
    if timer.state() != TimerState::Running {
        return;
    }
    let remaining = match timer.remaining_ms(now_ms) {
        Some(remaining) if remaining > 0 => remaining,
        _ => return,
    };

    let child_id = timer.child_id();
    let label = label(timer);
    notifier.schedule_completion(child_id, Duration::from_millis(remaining), &label);

    let total = timer.total_duration_ms();
    for offset_ms in warning_offsets_secs.iter().map(|s| s.saturating_mul(1000)) {
        // remaining <= total, so offset < total here
        if remaining > offset_ms {
            let at_fraction = (total - offset_ms) as f64 / total as f64;
            notifier.schedule_warning(
                child_id,
                at_fraction,
                Duration::from_millis(remaining - offset_ms),
                &label,
            );
        }
    }
}

pub(crate) fn reschedule(
    notifier: &dyn NotificationHook,
    timer: &ChildTimerState,
    now_ms: u64,
    warning_offsets_secs: &[u64],
) {
    notifier.cancel_all(timer.child_id());
    schedule(notifier, timer, now_ms, warning_offsets_secs);
}
