//! PID records for servers launched by the supervisor.
//!
//! A record lets a later invocation report on and stop servers started by
//! an earlier `run`.
//!
//! # Safety guarantees
//! - Atomic writes via temp file + rename
//! - A record only counts as live when both the PID and the process start
//!   time match, so a reused PID is never mistaken for a managed server
//! - Conservative cleanup (stale records are deleted, never acted upon)

mod io;
mod sweep;
mod verify;

pub use io::{PidRecord, delete_record, list_records, read_record, record_path, write_record};
pub use sweep::sweep_stale_records;
pub use verify::{is_live, process_start_time, record_for};
