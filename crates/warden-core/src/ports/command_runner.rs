//! External command runner abstraction.
//!
//! Used by diagnostics (dependency checks) and the `exec` command. The
//! supervisor itself launches long-lived processes through its own handle
//! type and never goes through this port.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A one-shot command to run to completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandRequest {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    /// Overrides applied on top of the inherited environment.
    pub env: BTreeMap<String, String>,
}

impl CommandRequest {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// `program arg1 arg2` for log lines.
    pub fn display_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Result of a command that ran to completion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutcome {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    /// Merged stdout and stderr lines, in arrival order.
    pub lines: Vec<String>,
}

impl CommandOutcome {
    pub const fn success(&self) -> bool {
        matches!(self.exit_code, Some(0))
    }

    /// All captured output joined with newlines.
    pub fn output(&self) -> String {
        self.lines.join("\n")
    }
}

/// Receives output lines as they are produced.
pub trait OutputSink: Send + Sync {
    fn line(&self, line: &str);
}

/// Sink that drops every line.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl OutputSink for NoopSink {
    fn line(&self, _line: &str) {}
}

/// Errors from running an external command.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Command not found: {0}")]
    NotFound(String),

    #[error("Failed to spawn {program}: {reason}")]
    Spawn { program: String, reason: String },

    #[error("I/O error while running {program}: {reason}")]
    Io { program: String, reason: String },
}

/// Runs an external command with environment overrides, streaming merged
/// output to a sink and returning the exit code.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(
        &self,
        request: &CommandRequest,
        sink: &dyn OutputSink,
    ) -> Result<CommandOutcome, CommandError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = CommandRequest::new("java")
            .with_args(["-version"])
            .with_env("JAVA_HOME", "/opt/jdk-21")
            .with_working_dir("/srv");

        assert_eq!(request.display_line(), "java -version");
        assert_eq!(request.env.get("JAVA_HOME").map(String::as_str), Some("/opt/jdk-21"));
        assert_eq!(request.working_dir, Some(PathBuf::from("/srv")));
    }

    #[test]
    fn test_outcome_success() {
        let ok = CommandOutcome {
            exit_code: Some(0),
            lines: vec!["a".into(), "b".into()],
        };
        assert!(ok.success());
        assert_eq!(ok.output(), "a\nb");

        let signalled = CommandOutcome::default();
        assert!(!signalled.success());
    }
}
