//! Managed process types: launch specs, lifecycle states and stop outcomes.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Everything needed to launch one managed process.
///
/// The name is the process identity inside a supervisor. The environment map
/// holds overrides layered on top of the supervisor's own environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchSpec {
    /// Logical name, unique within a supervisor (e.g. "login", "game").
    pub name: String,
    /// Executable or script to run.
    pub program: PathBuf,
    /// Arguments passed to the program.
    pub args: Vec<String>,
    /// Working directory (inherits the supervisor's when `None`).
    pub working_dir: Option<PathBuf>,
    /// Environment variables added to or overriding the inherited environment.
    pub env: BTreeMap<String, String>,
    /// Grace period overriding the one passed to `stop_all`.
    pub grace_period: Option<Duration>,
}

impl LaunchSpec {
    /// Create a launch spec with no arguments and no overrides.
    pub fn new(name: impl Into<String>, program: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            env: BTreeMap::new(),
            grace_period: None,
        }
    }

    /// Set the program arguments.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the working directory.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Add or override one environment variable.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set a per-process grace period.
    #[must_use]
    pub const fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace_period = Some(grace);
        self
    }
}

/// Lifecycle state of a managed process.
///
/// `Idle -> Starting -> Running -> Stopping -> Idle`, plus `Running -> Idle`
/// when the process exits without being asked to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    #[default]
    Idle,
    Starting,
    Running,
    Stopping,
}

impl LifecycleState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one managed process, safe to hand to other tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessStatus {
    pub name: String,
    pub state: LifecycleState,
    /// OS process id while launched.
    pub pid: Option<u32>,
    /// Exit code recorded the last time the process exited.
    pub exit_code: Option<i32>,
}

impl ProcessStatus {
    /// A process that has never been launched.
    pub fn idle(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: LifecycleState::Idle,
            pid: None,
            exit_code: None,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state == LifecycleState::Idle
    }
}

/// Result of a graceful-then-forceful stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopOutcome {
    /// Exited within the grace period after the polite signal.
    Terminated,
    /// Needed the forceful kill, then exited within the kill period.
    KilledAfterGrace,
    /// Had already exited before the stop was requested.
    AlreadyExited,
    /// Still alive after both periods elapsed.
    StillRunning,
}

impl StopOutcome {
    /// Whether the process is gone after the stop.
    pub const fn is_stopped(self) -> bool {
        !matches!(self, Self::StillRunning)
    }
}

impl fmt::Display for StopOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Terminated => "terminated",
            Self::KilledAfterGrace => "killed after grace period",
            Self::AlreadyExited => "already exited",
            Self::StillRunning => "still running",
        };
        f.write_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_spec_builder() {
        let spec = LaunchSpec::new("login", "/opt/l2/startLoginServer.sh")
            .with_args(["--nogui"])
            .with_working_dir("/opt/l2")
            .with_env("JAVA_OPTS", "-Xmx512m")
            .with_grace_period(Duration::from_secs(10));

        assert_eq!(spec.name, "login");
        assert_eq!(spec.args, vec!["--nogui".to_string()]);
        assert_eq!(spec.working_dir, Some(PathBuf::from("/opt/l2")));
        assert_eq!(spec.env.get("JAVA_OPTS").map(String::as_str), Some("-Xmx512m"));
        assert_eq!(spec.grace_period, Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_lifecycle_state_serializes_lowercase() {
        let json = serde_json::to_string(&LifecycleState::Running).unwrap();
        assert_eq!(json, "\"running\"");
        assert_eq!(LifecycleState::default(), LifecycleState::Idle);
    }

    #[test]
    fn test_stop_outcome_is_stopped() {
        assert!(StopOutcome::Terminated.is_stopped());
        assert!(StopOutcome::KilledAfterGrace.is_stopped());
        assert!(StopOutcome::AlreadyExited.is_stopped());
        assert!(!StopOutcome::StillRunning.is_stopped());
    }
}
