//! One-shot intents that cross a process or UI boundary.
//!
//! Both are plain data stamped with their creation time. Expiry is checked
//! when they are read, not by a background sweeper, and only the
//! orchestrator that owns them can consume them.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::timer::{CategoryId, ChildId};

/// A timer start requested from outside the app (for example a voice
/// shortcut) that the UI should pick up on its next foreground.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTimerStart {
    pub child_id: ChildId,
    pub category_id: CategoryId,
    pub created_at_epoch_ms: u64,
}

impl PendingTimerStart {
    pub fn new(child_id: ChildId, category_id: CategoryId, now_ms: u64) -> Self {
        Self {
            child_id,
            category_id,
            created_at_epoch_ms: now_ms,
        }
    }

    pub fn is_expired(&self, now_ms: u64, ttl: Duration) -> bool {
        is_expired(self.created_at_epoch_ms, now_ms, ttl)
    }
}

/// Raised once per launch when timers were recovered from a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestorationNotice {
    /// Children whose timers came back running or paused.
    pub resumed: Vec<ChildId>,
    /// Children whose timers expired while the process was gone.
    pub finalized: Vec<ChildId>,
    pub raised_at_epoch_ms: u64,
}

impl RestorationNotice {
    pub fn is_expired(&self, now_ms: u64, ttl: Duration) -> bool {
        is_expired(self.raised_at_epoch_ms, now_ms, ttl)
    }
}

// A clock that went backwards does not make an intent older.
fn is_expired(created_at_ms: u64, now_ms: u64, ttl: Duration) -> bool {
    now_ms.saturating_sub(created_at_ms) >= ttl.as_millis() as u64
}
