//! Core error types for kidtimer-core.
//!
//! Timer commands never panic and never propagate failures into the tick
//! loop: the orchestrator maps these errors to `bool`/`Option` outcomes and
//! logs them. They remain typed so the state machine and the stores can be
//! tested precisely.

use std::path::PathBuf;
use thiserror::Error;

use crate::timer::TimerState;

/// Core error type for kidtimer-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// State machine rejected a command.
    #[error("Transition error: {0}")]
    Transition(#[from] TransitionError),

    /// Snapshot persistence failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// A command that is not valid for the timer's current state or mode.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("cannot {command} a timer that is {from:?}")]
    InvalidTransition {
        from: TimerState,
        command: &'static str,
    },

    /// Countdown timers need a positive duration.
    #[error("countdown duration must be greater than zero")]
    InvalidDuration,

    #[error("{command} is not supported for stopwatch timers")]
    UnsupportedForMode { command: &'static str },
}

/// Snapshot store errors.
///
/// Only writes surface these; a failed or undecodable read is a cold start.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The store's lock was poisoned by a panicking writer.
    #[error("Snapshot store lock poisoned")]
    Poisoned,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
