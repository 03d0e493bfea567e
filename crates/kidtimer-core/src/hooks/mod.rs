//! Narrow interfaces to the collaborators around the timer core.
//!
//! The orchestrator never talks to a notification center, a points ledger or
//! a profile database directly. It is handed implementations of these traits
//! at construction, so the same core runs against the platform services, the
//! log-only hooks the CLI uses, or the recording hooks the tests inspect.

mod directory;
mod logging;
mod recording;
mod traits;

pub use directory::StaticDirectory;
pub use logging::{TracingCompletionSink, TracingNotifier};
pub use recording::{NotificationCall, RecordingNotifier, RecordingSink};
pub use traits::{CompletionEvent, CompletionSink, NotificationHook, ProfileDirectory};
