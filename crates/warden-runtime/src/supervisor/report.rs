//! Results of `start_all` and `stop_all`.

use serde::Serialize;
use warden_core::StopOutcome;

use crate::reaper::ReapReport;

/// A launch that failed and stopped the start sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartFailure {
    pub name: String,
    pub reason: String,
}

/// What `start_all` did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StartReport {
    /// Launched processes, in start order.
    pub started: Vec<String>,
    pub failed: Option<StartFailure>,
    /// Not attempted because of the failure or the interruption.
    pub skipped: Vec<String>,
    /// The sequence was aborted between two launches.
    pub interrupted: bool,
}

impl StartReport {
    pub const fn is_success(&self) -> bool {
        self.failed.is_none() && !self.interrupted
    }
}

/// How one process was stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoppedProcess {
    pub name: String,
    pub outcome: StopOutcome,
    pub exit_code: Option<i32>,
}

/// What `stop_all` did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StopReport {
    /// Per-process outcomes, in stop order.
    pub stopped: Vec<StoppedProcess>,
    pub reap: ReapReport,
}

impl StopReport {
    /// Names in the order they were stopped.
    pub fn order(&self) -> Vec<&str> {
        self.stopped.iter().map(|s| s.name.as_str()).collect()
    }

    /// Whether every process is known to be gone.
    pub fn all_stopped(&self) -> bool {
        self.stopped.iter().all(|s| s.outcome.is_stopped())
    }
}
