//! Terminate processes by PID (no Child handle available).

use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::{debug, warn};
use warden_core::{KillResult, StopOutcome};

#[cfg(unix)]
use nix::errno::Errno;
#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

#[cfg(unix)]
use super::group::signal_group;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Check if a PID exists (without verifying what it is).
#[cfg(unix)]
pub fn pid_exists(pid: u32) -> bool {
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    // The null signal only checks whether we could signal the process
    match signal::kill(Pid::from_raw(raw), None) {
        Ok(()) => true,
        Err(Errno::ESRCH) => false,
        Err(_) => true, // exists but we lack permission
    }
}

#[cfg(not(unix))]
pub fn pid_exists(pid: u32) -> bool {
    use sysinfo::{Pid, ProcessesToUpdate, System};

    let target = Pid::from_u32(pid);
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::Some(&[target]), true);
    sys.process(target).is_some()
}

/// Forcibly kill one process. A process that is already gone is `NotFound`.
#[cfg(unix)]
pub fn force_kill_pid(pid: u32) -> KillResult {
    let Ok(raw) = i32::try_from(pid) else {
        return KillResult::Failed(format!("invalid pid {pid}"));
    };
    match signal::kill(Pid::from_raw(raw), Signal::SIGKILL) {
        Ok(()) => KillResult::Killed,
        Err(Errno::ESRCH) => KillResult::NotFound,
        Err(e) => KillResult::Failed(e.desc().to_string()),
    }
}

#[cfg(not(unix))]
pub fn force_kill_pid(pid: u32) -> KillResult {
    use sysinfo::{Pid, ProcessesToUpdate, System};

    let target = Pid::from_u32(pid);
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::Some(&[target]), true);
    match sys.process(target) {
        None => KillResult::NotFound,
        Some(process) if process.kill() => KillResult::Killed,
        Some(_) => KillResult::Failed("the OS refused to terminate the process".to_string()),
    }
}

/// Poll until `pid` disappears or `limit` elapses.
async fn wait_for_exit(pid: u32, limit: Duration) -> bool {
    let deadline = Instant::now() + limit;
    loop {
        if !pid_exists(pid) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        sleep(POLL_INTERVAL).await;
    }
}

/// Stop a process we hold no handle for, with polite-then-forceful escalation.
///
/// Used for servers launched by an earlier invocation and tracked through
/// PID records. The caller must have verified that the PID is ours.
pub async fn terminate_pid(pid: u32, grace: Duration, kill: Duration) -> StopOutcome {
    if !pid_exists(pid) {
        return StopOutcome::AlreadyExited;
    }

    #[cfg(unix)]
    {
        match signal_group(pid, Signal::SIGTERM) {
            Ok(()) => {
                if wait_for_exit(pid, grace).await {
                    return StopOutcome::Terminated;
                }
                debug!(pid, "Grace period elapsed, escalating to SIGKILL");
            }
            Err(Errno::ESRCH) => return StopOutcome::AlreadyExited,
            Err(e) => warn!(pid, error = %e, "SIGTERM failed, escalating to SIGKILL"),
        }

        match signal_group(pid, Signal::SIGKILL) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => warn!(pid, error = %e, "SIGKILL failed"),
        }
    }

    #[cfg(not(unix))]
    {
        let _ = grace;
        if let KillResult::Failed(reason) = force_kill_pid(pid) {
            warn!(pid, %reason, "Forced termination failed");
        }
    }

    if wait_for_exit(pid, kill).await {
        StopOutcome::KilledAfterGrace
    } else {
        StopOutcome::StillRunning
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pid_exists_for_self() {
        assert!(pid_exists(std::process::id()));
    }

    #[test]
    #[cfg(unix)]
    fn pid_exists_false_for_impossible_pid() {
        assert!(!pid_exists(999_999));
    }

    #[test]
    #[cfg(unix)]
    fn force_kill_missing_pid_is_not_found() {
        assert_eq!(force_kill_pid(999_999), KillResult::NotFound);
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn terminate_pid_handles_already_gone() {
        let outcome = terminate_pid(999_999, Duration::from_millis(100), Duration::from_millis(100)).await;
        assert_eq!(outcome, StopOutcome::AlreadyExited);
    }
}
