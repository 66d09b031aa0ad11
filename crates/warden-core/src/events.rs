//! Supervisor lifecycle events.
//!
//! Every state transition and every error the supervisor or the port reaper
//! runs into is emitted as a [`SupervisorEvent`]. Control surfaces append
//! the `Display` form to a visible log; the serialized form is tagged for
//! consumers that want structure.

use std::fmt;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::StopOutcome;

/// A timestamped lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisorEvent {
    /// When the event occurred.
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// A launch is about to be attempted.
    Starting { name: String },
    /// The process was launched.
    Started { name: String, pid: u32 },
    /// The launch failed; nothing was started for this name.
    SpawnFailed { name: String, reason: String },
    /// Not started because an earlier process in the order failed to launch.
    StartSkipped { name: String, blocked_by: String },
    /// A stop sequence began.
    Stopping { name: String, pid: Option<u32> },
    /// A stop sequence finished.
    Stopped {
        name: String,
        outcome: StopOutcome,
        exit_code: Option<i32>,
    },
    /// The process died without being asked to.
    UnexpectedExit { name: String, exit_code: Option<i32> },
    /// Every managed process is idle.
    AllStopped,
    /// Nothing listens on the port.
    PortFree { port: u16 },
    /// A lingering listener was killed.
    ListenerKilled { port: u16, pid: u32, process: String },
    /// A listener disappeared before it could be killed.
    ListenerGone { port: u16, pid: u32 },
    /// A lingering listener could not be killed.
    ListenerKillFailed { port: u16, pid: u32, reason: String },
    /// Listing the listeners of a port failed.
    PortQueryFailed { port: u16, reason: String },
    /// This platform cannot list port listeners.
    PortQueryUnsupported,
}

impl SupervisorEvent {
    /// Stamp an event with the current time.
    pub fn new(kind: EventKind) -> Self {
        Self {
            at: Utc::now(),
            kind,
        }
    }

    pub fn starting(name: impl Into<String>) -> Self {
        Self::new(EventKind::Starting { name: name.into() })
    }

    pub fn started(name: impl Into<String>, pid: u32) -> Self {
        Self::new(EventKind::Started {
            name: name.into(),
            pid,
        })
    }

    pub fn spawn_failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(EventKind::SpawnFailed {
            name: name.into(),
            reason: reason.into(),
        })
    }

    pub fn start_skipped(name: impl Into<String>, blocked_by: impl Into<String>) -> Self {
        Self::new(EventKind::StartSkipped {
            name: name.into(),
            blocked_by: blocked_by.into(),
        })
    }

    pub fn stopping(name: impl Into<String>, pid: Option<u32>) -> Self {
        Self::new(EventKind::Stopping {
            name: name.into(),
            pid,
        })
    }

    pub fn stopped(name: impl Into<String>, outcome: StopOutcome, exit_code: Option<i32>) -> Self {
        Self::new(EventKind::Stopped {
            name: name.into(),
            outcome,
            exit_code,
        })
    }

    pub fn unexpected_exit(name: impl Into<String>, exit_code: Option<i32>) -> Self {
        Self::new(EventKind::UnexpectedExit {
            name: name.into(),
            exit_code,
        })
    }

    pub fn all_stopped() -> Self {
        Self::new(EventKind::AllStopped)
    }

    /// Name of the managed process this event is about, if any.
    pub fn process_name(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Starting { name }
            | EventKind::Started { name, .. }
            | EventKind::SpawnFailed { name, .. }
            | EventKind::StartSkipped { name, .. }
            | EventKind::Stopping { name, .. }
            | EventKind::Stopped { name, .. }
            | EventKind::UnexpectedExit { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Whether the event reports a failure the operator should look at.
    pub fn is_error(&self) -> bool {
        match &self.kind {
            EventKind::SpawnFailed { .. }
            | EventKind::UnexpectedExit { .. }
            | EventKind::ListenerKillFailed { .. }
            | EventKind::PortQueryFailed { .. } => true,
            EventKind::Stopped { outcome, .. } => !outcome.is_stopped(),
            _ => false,
        }
    }
}

fn exit_code_text(code: Option<i32>) -> String {
    code.map_or_else(|| "n/a".to_string(), |c| c.to_string())
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Starting { name } => write!(f, "{name}: starting"),
            Self::Started { name, pid } => write!(f, "{name}: started with pid {pid}"),
            Self::SpawnFailed { name, reason } => write!(f, "{name}: failed to start: {reason}"),
            Self::StartSkipped { name, blocked_by } => {
                write!(f, "{name}: not started because {blocked_by} failed to start")
            }
            Self::Stopping { name, pid: Some(pid) } => write!(f, "{name}: stopping pid {pid}"),
            Self::Stopping { name, pid: None } => write!(f, "{name}: stopping"),
            Self::Stopped {
                name,
                outcome,
                exit_code,
            } => write!(
                f,
                "{name}: {outcome} (exit code {})",
                exit_code_text(*exit_code)
            ),
            Self::UnexpectedExit { name, exit_code } => write!(
                f,
                "{name}: exited unexpectedly (exit code {})",
                exit_code_text(*exit_code)
            ),
            Self::AllStopped => f.write_str("all servers are stopped"),
            Self::PortFree { port } => write!(f, "port {port} is free"),
            Self::ListenerKilled { port, pid, process } => {
                write!(f, "port {port}: killed lingering {process} (pid {pid})")
            }
            Self::ListenerGone { port, pid } => {
                write!(f, "port {port}: pid {pid} was already gone")
            }
            Self::ListenerKillFailed { port, pid, reason } => {
                write!(f, "port {port}: failed to kill pid {pid}: {reason}")
            }
            Self::PortQueryFailed { port, reason } => {
                write!(f, "port {port}: could not list listeners: {reason}")
            }
            Self::PortQueryUnsupported => {
                f.write_str("port reaping is not supported on this platform")
            }
        }
    }
}

impl fmt::Display for SupervisorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let local = self.at.with_timezone(&Local);
        write!(f, "[{}] {}", local.format("%H:%M:%S"), self.kind)
    }
}
