//! Per-child timer state machine.
//!
//! The machine is pure: it holds wall-clock anchors and every operation takes
//! the current time explicitly. Remaining time is always derived from those
//! anchors, never decremented per tick, so a process that was suspended for
//! a week reads the same remaining time as one that ticked every second.
//!
//! ## State Transitions
//!
//! ```text
//! Idle | Completed --start--> Running --pause--> Paused --resume--> Running
//! Running --tick (remaining == 0)--> Completed
//! any --stop--> Idle
//! ```

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TransitionError;

pub type ChildId = Uuid;
pub type CategoryId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Idle,
    Running,
    Paused,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerMode {
    /// Counts down from `total_duration_ms` and completes at zero.
    Countdown,
    /// Counts up forever; never completes on its own.
    Stopwatch,
}

/// How the UI renders a running timer. Carried so it survives restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisualizationMode {
    #[default]
    Circular,
    Bar,
    Analog,
    Space,
    Ocean,
    Pomodoro,
}

impl VisualizationMode {
    pub const ALL: [VisualizationMode; 6] = [
        VisualizationMode::Circular,
        VisualizationMode::Bar,
        VisualizationMode::Analog,
        VisualizationMode::Space,
        VisualizationMode::Ocean,
        VisualizationMode::Pomodoro,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VisualizationMode::Circular => "circular",
            VisualizationMode::Bar => "bar",
            VisualizationMode::Analog => "analog",
            VisualizationMode::Space => "space",
            VisualizationMode::Ocean => "ocean",
            VisualizationMode::Pomodoro => "pomodoro",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            VisualizationMode::Circular => "Classic",
            VisualizationMode::Bar => "Progress Bar",
            VisualizationMode::Analog => "Clock",
            VisualizationMode::Space => "Space Explorer",
            VisualizationMode::Ocean => "Ocean Adventure",
            VisualizationMode::Pomodoro => "Pomodoro",
        }
    }
}

/// Category details resolved when a timer starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRef {
    pub id: CategoryId,
    pub name: String,
    #[serde(default)]
    pub icon: String,
}

/// Returned by [`ChildTimerState::tick`] on the single transition into
/// `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    /// Active (unpaused) running time of the finished countdown.
    pub actual_duration_ms: u64,
    /// When remaining time reached zero, derived from anchors.
    pub completed_at_epoch_ms: u64,
}

/// Timer state for one child.
///
/// Serialized as-is into snapshots: only raw anchors are stored, never a
/// derived remaining value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildTimerState {
    child_id: ChildId,
    #[serde(default)]
    child_name: String,
    mode: TimerMode,
    #[serde(default)]
    category: Option<CategoryRef>,
    total_duration_ms: u64,
    started_at_epoch_ms: u64,
    accumulated_paused_ms: u64,
    /// Set only while paused; freezes remaining time across restarts.
    #[serde(default)]
    paused_at_epoch_ms: Option<u64>,
    state: TimerState,
    #[serde(default)]
    visualization: VisualizationMode,
    #[serde(default)]
    completed_at_epoch_ms: Option<u64>,
}

impl ChildTimerState {
    pub fn idle(child_id: ChildId, child_name: impl Into<String>) -> Self {
        Self {
            child_id,
            child_name: child_name.into(),
            mode: TimerMode::Countdown,
            category: None,
            total_duration_ms: 0,
            started_at_epoch_ms: 0,
            accumulated_paused_ms: 0,
            paused_at_epoch_ms: None,
            state: TimerState::Idle,
            visualization: VisualizationMode::default(),
            completed_at_epoch_ms: None,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn child_id(&self) -> ChildId {
        self.child_id
    }

    pub fn child_name(&self) -> &str {
        &self.child_name
    }

    pub fn mode(&self) -> TimerMode {
        self.mode
    }

    pub fn category(&self) -> Option<&CategoryRef> {
        self.category.as_ref()
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.total_duration_ms
    }

    pub fn started_at_epoch_ms(&self) -> u64 {
        self.started_at_epoch_ms
    }

    pub fn accumulated_paused_ms(&self) -> u64 {
        self.accumulated_paused_ms
    }

    pub fn paused_at_epoch_ms(&self) -> Option<u64> {
        self.paused_at_epoch_ms
    }

    pub fn completed_at_epoch_ms(&self) -> Option<u64> {
        self.completed_at_epoch_ms
    }

    pub fn visualization(&self) -> VisualizationMode {
        self.visualization
    }

    /// Running or paused.
    pub fn is_active(&self) -> bool {
        matches!(self.state, TimerState::Running | TimerState::Paused)
    }

    /// Active (unpaused) time since start.
    ///
    /// A clock that moved backwards yields zero rather than a negative value;
    /// countdowns are capped at their total duration.
    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        let anchor = match self.state {
            TimerState::Idle => return 0,
            TimerState::Completed => return self.total_duration_ms,
            TimerState::Paused => self.paused_at_epoch_ms.unwrap_or(self.started_at_epoch_ms),
            TimerState::Running => now_ms,
        };
        let elapsed = anchor
            .saturating_sub(self.started_at_epoch_ms)
            .saturating_sub(self.accumulated_paused_ms);
        match self.mode {
            TimerMode::Countdown => elapsed.min(self.total_duration_ms),
            TimerMode::Stopwatch => elapsed,
        }
    }

    /// Remaining countdown time, always within `0..=total_duration_ms`.
    /// `None` for stopwatches.
    pub fn remaining_ms(&self, now_ms: u64) -> Option<u64> {
        match self.mode {
            TimerMode::Countdown => {
                Some(self.total_duration_ms - self.elapsed_ms(now_ms))
            }
            TimerMode::Stopwatch => None,
        }
    }

    /// Fraction of the countdown still remaining, 1.0 at start and 0.0 at
    /// completion.
    pub fn progress(&self, now_ms: u64) -> f64 {
        match self.remaining_ms(now_ms) {
            Some(remaining) if self.total_duration_ms > 0 => {
                remaining as f64 / self.total_duration_ms as f64
            }
            _ => 0.0,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(
        &mut self,
        now_ms: u64,
        mode: TimerMode,
        duration_ms: u64,
        category: CategoryRef,
    ) -> Result<(), TransitionError> {
        if !matches!(self.state, TimerState::Idle | TimerState::Completed) {
            return Err(self.invalid("start"));
        }
        let total_duration_ms = match mode {
            TimerMode::Countdown if duration_ms == 0 => {
                return Err(TransitionError::InvalidDuration)
            }
            TimerMode::Countdown => duration_ms,
            TimerMode::Stopwatch => 0,
        };

        self.mode = mode;
        self.category = Some(category);
        self.total_duration_ms = total_duration_ms;
        self.started_at_epoch_ms = now_ms;
        self.accumulated_paused_ms = 0;
        self.paused_at_epoch_ms = None;
        self.completed_at_epoch_ms = None;
        self.state = TimerState::Running;
        Ok(())
    }

    pub fn pause(&mut self, now_ms: u64) -> Result<(), TransitionError> {
        if self.state != TimerState::Running {
            return Err(self.invalid("pause"));
        }
        self.paused_at_epoch_ms = Some(now_ms);
        self.state = TimerState::Paused;
        Ok(())
    }

    pub fn resume(&mut self, now_ms: u64) -> Result<(), TransitionError> {
        if self.state != TimerState::Paused {
            return Err(self.invalid("resume"));
        }
        if let Some(paused_at) = self.paused_at_epoch_ms.take() {
            self.accumulated_paused_ms = self
                .accumulated_paused_ms
                .saturating_add(now_ms.saturating_sub(paused_at));
        }
        self.state = TimerState::Running;
        Ok(())
    }

    /// Extend (or shorten, with a negative delta) a countdown.
    ///
    /// The new total never drops below the time already elapsed, so
    /// remaining time never goes negative. Returns the new total.
    pub fn add_time(&mut self, now_ms: u64, delta_ms: i64) -> Result<u64, TransitionError> {
        if !self.is_active() {
            return Err(self.invalid("add time to"));
        }
        if self.mode == TimerMode::Stopwatch {
            return Err(TransitionError::UnsupportedForMode {
                command: "add time",
            });
        }
        let elapsed = self.elapsed_ms(now_ms);
        self.total_duration_ms = self
            .total_duration_ms
            .saturating_add_signed(delta_ms)
            .max(elapsed);
        Ok(self.total_duration_ms)
    }

    /// A paused entry written without its pause anchor freezes at `at`
    /// instead of reading as never started.
    pub(crate) fn repair_pause_anchor(&mut self, at: u64) {
        if self.state == TimerState::Paused && self.paused_at_epoch_ms.is_none() {
            self.paused_at_epoch_ms = Some(at.max(self.started_at_epoch_ms));
        }
    }

    /// Reset to idle from any state. Returns the state it left.
    pub fn stop(&mut self) -> TimerState {
        let previous = self.state;
        *self = Self::idle(self.child_id, std::mem::take(&mut self.child_name));
        previous
    }

    pub fn set_visualization(&mut self, mode: VisualizationMode) {
        self.visualization = mode;
    }

    /// Recompute from anchors. Returns `Some` exactly once, on the
    /// transition from running to completed.
    pub fn tick(&mut self, now_ms: u64) -> Option<Completion> {
        if self.state != TimerState::Running || self.mode != TimerMode::Countdown {
            return None;
        }
        if self.remaining_ms(now_ms) != Some(0) {
            return None;
        }
        let completed_at = self
            .started_at_epoch_ms
            .saturating_add(self.accumulated_paused_ms)
            .saturating_add(self.total_duration_ms);
        self.state = TimerState::Completed;
        self.completed_at_epoch_ms = Some(completed_at);
        Some(Completion {
            actual_duration_ms: self.total_duration_ms,
            completed_at_epoch_ms: completed_at,
        })
    }

    fn invalid(&self, command: &'static str) -> TransitionError {
        TransitionError::InvalidTransition {
            from: self.state,
            command,
        }
    }
}
