//! Error types for process and supervisor operations.
//!
//! Errors local to one managed process never abort the supervisor's other
//! duties. Only configuration errors are fatal, and only at construction.

use thiserror::Error;

use crate::config::ConfigError;
use crate::paths::PathError;
use crate::ports::{CommandError, PortError};
use crate::properties::PropertiesError;

/// Errors raised while launching a single process.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The program is missing or the OS refused to create the process.
    /// Never retried automatically.
    #[error("Failed to start {name}: {reason}")]
    SpawnFailed { name: String, reason: String },
}

impl ProcessError {
    pub fn spawn_failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SpawnFailed {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised by supervisor operations.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// Invalid configuration, detected at construction.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The supervisor does not manage a process with this name.
    #[error("Unknown managed process: {0}")]
    UnknownProcess(String),

    /// A start was requested while the named process is not idle.
    #[error("{0} is already running")]
    AlreadyRunning(String),

    /// The supervisor has been shut down.
    #[error("Supervisor is shut down")]
    ShutDown,
}

/// Core error type aggregating every domain error.
///
/// Adapters map this to their own error types (CLI exit codes, etc.).
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Properties(#[from] PropertiesError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Port(#[from] PortError),
}
