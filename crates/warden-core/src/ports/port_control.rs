//! Ports for finding and killing processes that listen on TCP ports.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A process observed listening on a port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListeningProcess {
    pub pid: u32,
    /// Executable name as reported by the OS; may be empty.
    pub name: String,
}

/// Errors from querying port listeners.
#[derive(Debug, Error)]
pub enum PortError {
    /// The platform offers no way to enumerate listeners.
    #[error("listing port listeners is not supported on this platform")]
    Unsupported,

    #[error("failed to list port listeners: {0}")]
    QueryFailed(String),
}

/// Lists the processes currently listening on a TCP port.
pub trait ListenerSource: Send + Sync {
    /// May block; callers run it off the async executor.
    fn listening_processes(&self, port: u16) -> Result<Vec<ListeningProcess>, PortError>;
}

/// Outcome of a forced kill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", content = "reason", rename_all = "snake_case")]
pub enum KillResult {
    Killed,
    /// The process was already gone. Counts as success.
    NotFound,
    Failed(String),
}

impl KillResult {
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Killed | Self::NotFound)
    }
}

/// Forcibly kills a process by pid.
pub trait PidKiller: Send + Sync {
    fn force_kill(&self, pid: u32) -> KillResult;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_counts_as_success() {
        assert!(KillResult::Killed.is_success());
        assert!(KillResult::NotFound.is_success());
        assert!(!KillResult::Failed("access denied".into()).is_success());
    }
}
