mod clock;
mod machine;
mod preset;

pub use clock::{Clock, ManualClock, SystemClock};
pub use machine::{
    CategoryId, CategoryRef, ChildId, ChildTimerState, Completion, TimerMode, TimerState,
    VisualizationMode,
};
pub use preset::TimerPreset;
