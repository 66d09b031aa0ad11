//! Startup cleanup of stale PID records.

use std::io;
use std::path::Path;

use tracing::{debug, info};

use super::io::{delete_record, list_records};
use super::verify::is_live;

/// Delete every record whose process is gone or whose PID was reused.
///
/// Live records are left alone; stopping them is an explicit operator
/// action. Returns the number of records removed.
pub fn sweep_stale_records(dir: &Path) -> io::Result<usize> {
    let records = list_records(dir)?;
    if records.is_empty() {
        debug!(dir = %dir.display(), "No PID records found");
        return Ok(0);
    }

    let mut removed = 0;
    for (name, record) in records {
        if is_live(&record) {
            debug!(server = %name, pid = record.pid, "PID record is live");
            continue;
        }
        debug!(server = %name, pid = record.pid, "Removing stale PID record");
        delete_record(dir, &name)?;
        removed += 1;
    }

    if removed > 0 {
        info!("Removed {removed} stale PID records");
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pidfile::{PidRecord, record_for, write_record};
    use tempfile::tempdir;

    #[test]
    fn sweep_removes_only_stale_records() {
        let dir = tempdir().unwrap();
        let own = record_for(std::process::id()).expect("own start time");
        write_record(dir.path(), "live", own).unwrap();
        write_record(
            dir.path(),
            "dead",
            PidRecord {
                pid: 999_999,
                start_time: 1,
            },
        )
        .unwrap();

        assert_eq!(sweep_stale_records(dir.path()).unwrap(), 1);
        let left: Vec<_> = list_records(dir.path()).unwrap().into_iter().map(|(n, _)| n).collect();
        assert_eq!(left, vec!["live"]);
    }
}
