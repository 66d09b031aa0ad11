//! Runs one external command to completion with merged output.

use std::io;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::debug;
use warden_core::{CommandError, CommandOutcome, CommandRequest, CommandRunner, OutputSink};

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// `CommandRunner` backed by `tokio::process`.
///
/// stdout and stderr are read line by line (lossy UTF-8) and merged in
/// arrival order; every line goes to the sink as soon as it is read.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

impl SystemCommandRunner {
    pub const fn new() -> Self {
        Self
    }
}

fn forward_lines(stream: impl AsyncRead + Unpin + Send + 'static, tx: mpsc::UnboundedSender<String>) {
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::with_capacity(256);
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    while matches!(buf.last(), Some(b'\n' | b'\r')) {
                        buf.pop();
                    }
                    if tx.send(String::from_utf8_lossy(&buf).into_owned()).is_err() {
                        break;
                    }
                }
            }
        }
    });
}

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(
        &self,
        request: &CommandRequest,
        sink: &dyn OutputSink,
    ) -> Result<CommandOutcome, CommandError> {
        let mut cmd = Command::new(&request.program);
        cmd.args(&request.args)
            .envs(&request.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &request.working_dir {
            cmd.current_dir(dir);
        }
        #[cfg(windows)]
        cmd.creation_flags(CREATE_NO_WINDOW);

        debug!(command = %request.display_line(), "Running external command");

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                CommandError::NotFound(request.program.clone())
            } else {
                CommandError::Spawn {
                    program: request.program.clone(),
                    reason: e.to_string(),
                }
            }
        })?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            forward_lines(stdout, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            forward_lines(stderr, tx.clone());
        }
        drop(tx);

        // Channel closes once both pipes reach EOF.
        let mut lines = Vec::new();
        while let Some(line) = rx.recv().await {
            sink.line(&line);
            lines.push(line);
        }

        let status = child.wait().await.map_err(|e| CommandError::Io {
            program: request.program.clone(),
            reason: e.to_string(),
        })?;

        debug!(command = %request.display_line(), code = ?status.code(), "External command finished");

        Ok(CommandOutcome {
            exit_code: status.code(),
            lines,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CollectingSink(Mutex<Vec<String>>);

    impl OutputSink for CollectingSink {
        fn line(&self, line: &str) {
            self.0.lock().unwrap().push(line.to_string());
        }
    }

    #[tokio::test]
    async fn merges_stdout_and_stderr() {
        let sink = CollectingSink::default();
        let request = CommandRequest::new("sh").with_args(["-c", "echo out; echo err 1>&2; exit 4"]);

        let outcome = SystemCommandRunner::new().run(&request, &sink).await.unwrap();

        assert_eq!(outcome.exit_code, Some(4));
        assert!(!outcome.success());
        let mut lines = outcome.lines.clone();
        lines.sort();
        assert_eq!(lines, vec!["err".to_string(), "out".to_string()]);
        assert_eq!(*sink.0.lock().unwrap(), outcome.lines);
    }

    #[tokio::test]
    async fn applies_env_and_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        let request = CommandRequest::new("sh")
            .with_args(["-c", "echo \"$WARDEN_GREETING\"; pwd"])
            .with_env("WARDEN_GREETING", "hello")
            .with_working_dir(dir.path());

        let outcome = SystemCommandRunner::new()
            .run(&request, &warden_core::NoopSink)
            .await
            .unwrap();

        assert!(outcome.success());
        assert_eq!(outcome.lines[0], "hello");
        let reported = std::path::PathBuf::from(&outcome.lines[1]);
        assert_eq!(
            reported.canonicalize().unwrap(),
            dir.path().canonicalize().unwrap()
        );
    }

    #[tokio::test]
    async fn missing_program_is_not_found() {
        let request = CommandRequest::new("warden-no-such-command");
        let err = SystemCommandRunner::new()
            .run(&request, &warden_core::NoopSink)
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::NotFound(name) if name == "warden-no-such-command"));
    }
}
