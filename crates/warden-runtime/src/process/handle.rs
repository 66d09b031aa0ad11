//! One launched child process.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, info, warn};
use warden_core::{LaunchSpec, ProcessError, StopOutcome};

#[cfg(unix)]
use nix::errno::Errno;
#[cfg(unix)]
use nix::sys::signal::Signal;

#[cfg(unix)]
use super::shutdown::signal_group;
use super::stream::spawn_stream_reader;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// A launched OS process owned by the supervisor.
///
/// The PID is known as soon as `launch` returns. Exit status is recorded the
/// first time the process is observed dead, by `is_alive` or `stop`.
#[derive(Debug)]
pub struct ProcessHandle {
    name: String,
    pid: u32,
    child: Child,
    exited: bool,
    exit_code: Option<i32>,
}

/// Locate the program the way the OS will: paths with directory components
/// must exist, bare names are looked up on `PATH`.
fn resolve_program(spec: &LaunchSpec) -> Result<PathBuf, String> {
    let program = spec.program.as_path();
    if program.as_os_str().is_empty() {
        return Err("program path is empty".to_string());
    }

    if program.components().count() > 1 || program.is_absolute() {
        let candidate = match &spec.working_dir {
            Some(dir) if program.is_relative() => dir.join(program),
            _ => program.to_path_buf(),
        };
        // Relative to our own working directory, not the child's.
        let candidate = std::path::absolute(&candidate)
            .map_err(|e| format!("cannot resolve {}: {e}", candidate.display()))?;
        return if candidate.is_file() {
            Ok(candidate)
        } else {
            Err(format!("program not found: {}", candidate.display()))
        };
    }

    which::which(program).map_err(|_| format!("program not found on PATH: {}", program.display()))
}

fn check_working_dir(dir: &Path) -> Result<(), String> {
    if dir.is_dir() {
        Ok(())
    } else {
        Err(format!("working directory not found: {}", dir.display()))
    }
}

impl ProcessHandle {
    /// Launch the process described by `spec`.
    ///
    /// Must be called from within a tokio runtime. The child gets a null
    /// stdin and its output is drained into `tracing` at debug level.
    pub fn launch(spec: &LaunchSpec) -> Result<Self, ProcessError> {
        let program = resolve_program(spec).map_err(|reason| ProcessError::spawn_failed(&spec.name, reason))?;
        if let Some(dir) = &spec.working_dir {
            check_working_dir(dir).map_err(|reason| ProcessError::spawn_failed(&spec.name, reason))?;
        }

        let mut cmd = Command::new(&program);
        cmd.args(&spec.args)
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &spec.working_dir {
            cmd.current_dir(dir);
        }

        // Own process group: a terminal Ctrl-C reaches only the supervisor.
        #[cfg(unix)]
        cmd.process_group(0);
        #[cfg(windows)]
        cmd.creation_flags(CREATE_NO_WINDOW);

        debug!(
            process = %spec.name,
            program = %program.display(),
            args = ?spec.args,
            "Spawning process"
        );

        let mut child = cmd
            .spawn()
            .map_err(|e| ProcessError::spawn_failed(&spec.name, e.to_string()))?;

        let Some(pid) = child.id() else {
            return Err(ProcessError::spawn_failed(
                &spec.name,
                "process exited before its PID could be read",
            ));
        };

        if let Some(stdout) = child.stdout.take() {
            spawn_stream_reader(stdout, spec.name.clone(), "stdout");
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_stream_reader(stderr, spec.name.clone(), "stderr");
        }

        info!(process = %spec.name, pid, "Process launched");

        Ok(Self {
            name: spec.name.clone(),
            pid,
            child,
            exited: false,
            exit_code: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn pid(&self) -> u32 {
        self.pid
    }

    /// Exit code, once the process has been observed dead.
    ///
    /// `None` while running, and also after death by signal.
    pub const fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    fn record_exit(&mut self, status: ExitStatus) {
        self.exited = true;
        self.exit_code = status.code();
    }

    /// Non-blocking liveness check.
    ///
    /// If the OS cannot report the status the process is treated as exited
    /// with no code.
    pub fn is_alive(&mut self) -> bool {
        if self.exited {
            return false;
        }
        match self.child.try_wait() {
            Ok(Some(status)) => {
                self.record_exit(status);
                false
            }
            Ok(None) => true,
            Err(e) => {
                warn!(process = %self.name, pid = self.pid, error = %e, "Cannot query process status");
                self.exited = true;
                self.exit_code = None;
                false
            }
        }
    }

    /// Wait up to `limit` for the process to exit.
    async fn wait_for(&mut self, limit: Duration) -> bool {
        match timeout(limit, self.child.wait()).await {
            Ok(Ok(status)) => {
                self.record_exit(status);
                true
            }
            Ok(Err(e)) => {
                warn!(process = %self.name, pid = self.pid, error = %e, "Waiting for process failed");
                !self.is_alive()
            }
            Err(_) => false,
        }
    }

    /// Polite signal, wait up to `grace`, forceful kill, wait up to `kill`.
    ///
    /// Takes at most `grace + kill`. A process that survives both phases is
    /// reported as `StillRunning`; this is never an error.
    pub async fn stop(&mut self, grace: Duration, kill: Duration) -> StopOutcome {
        if !self.is_alive() {
            return StopOutcome::AlreadyExited;
        }

        #[cfg(unix)]
        {
            match signal_group(self.pid, Signal::SIGTERM) {
                Ok(()) => {
                    if self.wait_for(grace).await {
                        debug!(process = %self.name, pid = self.pid, "Process exited after SIGTERM");
                        return StopOutcome::Terminated;
                    }
                    debug!(process = %self.name, pid = self.pid, "Grace period elapsed, escalating to SIGKILL");
                }
                Err(Errno::ESRCH) => {
                    // Gone between the liveness check and the signal.
                    return if self.wait_for(kill).await {
                        StopOutcome::AlreadyExited
                    } else {
                        StopOutcome::StillRunning
                    };
                }
                Err(e) => {
                    warn!(process = %self.name, pid = self.pid, error = %e, "SIGTERM failed, escalating to SIGKILL");
                }
            }

            if let Err(e) = signal_group(self.pid, Signal::SIGKILL) {
                if e != Errno::ESRCH {
                    warn!(process = %self.name, pid = self.pid, error = %e, "SIGKILL to process group failed");
                }
            }
        }

        #[cfg(not(unix))]
        let _ = grace;

        if let Err(e) = self.child.start_kill() {
            debug!(process = %self.name, pid = self.pid, error = %e, "Forced kill reported an error");
        }

        if self.wait_for(kill).await {
            StopOutcome::KilledAfterGrace
        } else {
            warn!(process = %self.name, pid = self.pid, "Process survived forced kill");
            StopOutcome::StillRunning
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tokio::time::{Instant, sleep};

    fn sleep_spec(secs: &str) -> LaunchSpec {
        LaunchSpec::new("sleeper", "sleep").with_args([secs])
    }

    #[tokio::test]
    async fn launch_then_alive() {
        let mut handle = ProcessHandle::launch(&sleep_spec("30")).unwrap();
        assert!(handle.pid() > 0);
        assert!(handle.is_alive());

        let outcome = handle.stop(Duration::from_secs(5), Duration::from_secs(5)).await;
        assert_eq!(outcome, StopOutcome::Terminated);
        assert!(!handle.is_alive());
    }

    #[tokio::test]
    async fn launch_missing_program_fails() {
        let spec = LaunchSpec::new("ghost", "/definitely/not/here/start.sh");
        let err = ProcessHandle::launch(&spec).unwrap_err();
        assert!(matches!(err, ProcessError::SpawnFailed { ref name, .. } if name == "ghost"));

        let bare = LaunchSpec::new("ghost", "warden-no-such-binary-on-path");
        assert!(ProcessHandle::launch(&bare).is_err());
    }

    #[tokio::test]
    async fn exit_code_is_recorded() {
        let spec = LaunchSpec::new("failing", "sh").with_args(["-c", "exit 3"]);
        let mut handle = ProcessHandle::launch(&spec).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while handle.is_alive() && Instant::now() < deadline {
            sleep(Duration::from_millis(20)).await;
        }
        assert!(!handle.is_alive());
        assert_eq!(handle.exit_code(), Some(3));

        let outcome = handle.stop(Duration::from_secs(1), Duration::from_secs(1)).await;
        assert_eq!(outcome, StopOutcome::AlreadyExited);
    }

    #[tokio::test]
    async fn stop_escalates_when_term_is_ignored() {
        let spec = LaunchSpec::new("stubborn", "sh").with_args(["-c", "trap '' TERM; sleep 30"]);
        let mut handle = ProcessHandle::launch(&spec).unwrap();
        // Give the shell time to install the trap.
        sleep(Duration::from_millis(200)).await;

        let started = Instant::now();
        let outcome = handle
            .stop(Duration::from_millis(300), Duration::from_secs(5))
            .await;
        assert_eq!(outcome, StopOutcome::KilledAfterGrace);
        assert!(started.elapsed() < Duration::from_secs(6));
        assert!(!handle.is_alive());
    }

    #[tokio::test]
    async fn env_and_working_dir_are_applied() {
        let dir = tempfile::tempdir().unwrap();
        let spec = LaunchSpec::new("writer", "sh")
            .with_args(["-c", "printf '%s' \"$WARDEN_TEST_VALUE\" > out.txt"])
            .with_working_dir(dir.path())
            .with_env("WARDEN_TEST_VALUE", "hello");
        let mut handle = ProcessHandle::launch(&spec).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while handle.is_alive() && Instant::now() < deadline {
            sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(handle.exit_code(), Some(0));
        let written = std::fs::read_to_string(dir.path().join("out.txt")).unwrap();
        assert_eq!(written, "hello");
    }

    async fn wait_for_exit(handle: &mut ProcessHandle) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while handle.is_alive() && Instant::now() < deadline {
            sleep(Duration::from_millis(20)).await;
        }
    }

    #[tokio::test]
    async fn relative_program_in_relative_working_dir_launches() {
        let dir = tempfile::tempdir_in(".").unwrap();
        assert!(dir.path().is_relative());
        std::os::unix::fs::symlink("/bin/sh", dir.path().join("start.sh")).unwrap();

        let spec = LaunchSpec::new("login", "./start.sh")
            .with_args(["-c", "exit 0"])
            .with_working_dir(dir.path());
        let mut handle = ProcessHandle::launch(&spec).unwrap();
        wait_for_exit(&mut handle).await;
        assert_eq!(handle.exit_code(), Some(0));
    }

    #[tokio::test]
    async fn config_loaded_through_relative_path_launches() {
        let dir = tempfile::tempdir_in(".").unwrap();
        let server_dir = dir.path().join("build/login");
        std::fs::create_dir_all(&server_dir).unwrap();
        std::os::unix::fs::symlink("/bin/sh", server_dir.join("start.sh")).unwrap();
        let config_path = dir.path().join("warden.json");
        std::fs::write(
            &config_path,
            r#"{ "servers": [ { "name": "login", "program": "build/login/start.sh",
                                "args": ["-c", "exit 0"] } ] }"#,
        )
        .unwrap();

        let config = warden_core::WardenConfig::load(&config_path).unwrap();
        let spec = config.launch_specs().remove(0);
        let mut handle = ProcessHandle::launch(&spec).unwrap();
        wait_for_exit(&mut handle).await;
        assert_eq!(handle.exit_code(), Some(0));
    }
}
