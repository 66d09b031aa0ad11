//! Process termination.
//!
//! Two strategies:
//! - `signal_group`: polite/forceful signals to a child we own (its whole
//!   process group on Unix)
//! - `terminate_pid` / `force_kill_pid`: PID-only termination for processes
//!   launched by an earlier invocation or found holding a port

#[cfg(unix)]
mod group;
mod pid;

#[cfg(unix)]
pub use group::signal_group;
pub use pid::{force_kill_pid, pid_exists, terminate_pid};
