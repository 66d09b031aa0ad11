//! Process verification so a reused PID is never mistaken for a server.

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

use super::io::PidRecord;
use crate::process::shutdown::pid_exists;

/// Start time of a running process in seconds since the epoch.
pub fn process_start_time(pid: u32) -> Option<u64> {
    let target = Pid::from_u32(pid);
    let mut sys = System::new();
    sys.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[target]),
        true,
        ProcessRefreshKind::nothing(),
    );
    sys.process(target).map(sysinfo::Process::start_time)
}

/// Build the record for a freshly launched process.
pub fn record_for(pid: u32) -> Option<PidRecord> {
    process_start_time(pid).map(|start_time| PidRecord { pid, start_time })
}

/// Whether the recorded process is still the one that was launched.
pub fn is_live(record: &PidRecord) -> bool {
    pid_exists(record.pid) && process_start_time(record.pid) == Some(record.start_time)
}
