//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces the supervisor core expects from the
//! operating system and from its observers. They contain no implementation
//! details; `warden-runtime` provides the real implementations and tests
//! substitute fakes.
//!
//! # Design Rules
//!
//! - Express intent, not mechanism (no `netstat`, `kill`, channel types)
//! - Object-safe so implementations can be shared as `Arc<dyn Trait>`

pub mod command_runner;
pub mod event_emitter;
pub mod port_control;

pub use command_runner::{
    CommandError, CommandOutcome, CommandRequest, CommandRunner, NoopSink, OutputSink,
};
pub use event_emitter::{EventEmitter, NoopEmitter};
pub use port_control::{KillResult, ListenerSource, ListeningProcess, PidKiller, PortError};
