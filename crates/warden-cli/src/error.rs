//! CLI-specific error types and mappings.
//!
//! Maps domain errors to exit codes and user-facing messages.

use thiserror::Error;
use warden_core::{CommandError, ConfigError, CoreError, PathError, PropertiesError, SupervisorError};

/// CLI-specific error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Core domain error.
    #[error("{0}")]
    Core(String),

    /// Argument error (unknown server name, missing key, ...).
    #[error("Invalid arguments: {0}")]
    Arguments(String),

    /// IO error (file not found, permission denied, etc.).
    #[error("IO error: {0}")]
    Io(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Process execution error.
    #[error("Process error: {0}")]
    Process(String),

    /// Servers from an earlier `run` are still alive.
    #[error("Servers already running: {}", .0.join(", "))]
    AlreadyRunning(Vec<String>),

    /// A check or command finished but reported failure.
    #[error("{0}")]
    Failed(String),
}

impl CliError {
    /// Map error to appropriate exit code.
    ///
    /// Exit codes follow sysexits.h where one fits.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Core(_) | Self::Failed(_) => 1,
            Self::Arguments(_) => 2,     // EX_USAGE
            Self::Io(_) => 74,           // EX_IOERR
            Self::Config(_) => 78,       // EX_CONFIG
            Self::Process(_) => 71,      // EX_OSERR
            Self::AlreadyRunning(_) => 75, // EX_TEMPFAIL
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Config(e) => e.into(),
            CoreError::Path(e) => e.into(),
            CoreError::Properties(e) => e.into(),
            CoreError::Command(e) => e.into(),
            CoreError::Supervisor(e) => e.into(),
            CoreError::Process(e) => Self::Process(e.to_string()),
            CoreError::Port(e) => Self::Core(e.to_string()),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<PathError> for CliError {
    fn from(err: PathError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<PropertiesError> for CliError {
    fn from(err: PropertiesError) -> Self {
        match err {
            PropertiesError::EmptyKey => Self::Arguments(err.to_string()),
            PropertiesError::Read { .. } | PropertiesError::Write { .. } => Self::Io(err.to_string()),
        }
    }
}

impl From<CommandError> for CliError {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::NotFound(_) => Self::Arguments(err.to_string()),
            CommandError::Spawn { .. } | CommandError::Io { .. } => Self::Process(err.to_string()),
        }
    }
}

impl From<SupervisorError> for CliError {
    fn from(err: SupervisorError) -> Self {
        match err {
            SupervisorError::Config(e) => e.into(),
            SupervisorError::UnknownProcess(_) => Self::Arguments(err.to_string()),
            SupervisorError::AlreadyRunning(name) => Self::AlreadyRunning(vec![name]),
            SupervisorError::ShutDown => Self::Core(err.to_string()),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
