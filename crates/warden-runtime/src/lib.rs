//! Process runtime and OS-level concerns for warden.
//!
//! This crate implements the supervision core on top of tokio: process
//! handles with graceful-then-forceful termination, the server supervisor
//! with its reconciliation loop, the polling log tailer, the port reaper,
//! the external command runner, PID records and dependency checks.

#![deny(unsafe_code)]

pub mod broadcaster;
pub mod logs;
pub mod pidfile;
pub mod process;
pub mod reaper;
pub mod supervisor;
pub mod system;

pub use broadcaster::EventBroadcaster;
pub use logs::{LogSubscription, LogTailer};
pub use process::ProcessHandle;
pub use reaper::{ListenerKill, ListenersSource, PortReap, PortReaper, ReapReport, SystemKiller};
pub use supervisor::{ServerSupervisor, StartFailure, StartReport, StopReport, StoppedProcess, SupervisorOptions};
pub use system::{SystemCommandRunner, deps};
