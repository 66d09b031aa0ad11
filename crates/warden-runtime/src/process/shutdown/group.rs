//! Signal delivery to a child's process group.

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;

/// Send `sig` to the process group led by `pid`.
///
/// Children are launched as group leaders so that helper processes started
/// by launch scripts receive the signal too. Falls back to signalling `pid`
/// alone when no such group exists.
pub fn signal_group(pid: u32, sig: Signal) -> Result<(), Errno> {
    let raw = i32::try_from(pid).map_err(|_| Errno::EINVAL)?;
    match signal::killpg(Pid::from_raw(raw), sig) {
        Err(Errno::ESRCH) => signal::kill(Pid::from_raw(raw), sig),
        other => other,
    }
}
