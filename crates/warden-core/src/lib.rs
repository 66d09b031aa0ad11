//! Core domain types and port definitions for warden.
//!
//! This crate holds everything the supervisor, the log tailer and the
//! control surfaces agree on: launch specifications, lifecycle states,
//! events, log chunks, configuration, error types and the port traits
//! implemented by `warden-runtime`. It performs no process management of
//! its own.

pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod logs;
pub mod paths;
pub mod ports;
pub mod properties;

// Re-export commonly used types for convenience
pub use config::{
    ConfigError, DEFAULT_GRACE_PERIOD_SECS, DEFAULT_KILL_PERIOD_SECS, DEFAULT_KNOWN_PORTS,
    DEFAULT_LOG_POLL_INTERVAL_MS, DEFAULT_REAP_DELAY_MS, DEFAULT_RECONCILE_INTERVAL_MS,
    DEFAULT_SETTLE_DELAY_MS, DEFAULT_STOP_PAUSE_MS, ServerEntry, WardenConfig,
};
pub use domain::{LaunchSpec, LifecycleState, ProcessStatus, StopOutcome};
pub use error::{CoreError, ProcessError, SupervisorError};
pub use events::{EventKind, SupervisorEvent};
pub use logs::LogChunk;
pub use ports::{
    CommandError, CommandOutcome, CommandRequest, CommandRunner, EventEmitter, KillResult,
    ListenerSource, ListeningProcess, NoopEmitter, NoopSink, OutputSink, PidKiller, PortError,
};
pub use properties::PropertiesError;

// Re-export path utilities
pub use paths::{CONFIG_FILE_NAME, PathError, data_root, default_config_path, pids_dir};
