//! Atomic PID record I/O.
//!
//! Format: two-line text file named `<server>.pid`
//! ```text
//! <pid>
//! <start time, seconds since the epoch>
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// PID record content parsed from disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PidRecord {
    pub pid: u32,
    pub start_time: u64,
}

pub fn record_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.pid"))
}

/// Write a record atomically using temp file + rename.
pub fn write_record(dir: &Path, name: &str, record: PidRecord) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;

    let final_path = record_path(dir, name);
    let temp_path = dir.join(format!("{name}.pid.tmp"));

    fs::write(&temp_path, format!("{}\n{}\n", record.pid, record.start_time))?;
    fs::rename(&temp_path, &final_path)?;

    Ok(final_path)
}

pub fn read_record(dir: &Path, name: &str) -> io::Result<PidRecord> {
    let content = fs::read_to_string(record_path(dir, name))?;
    parse_record(&content)
}

/// Delete a record (idempotent - no error if missing).
pub fn delete_record(dir: &Path, name: &str) -> io::Result<()> {
    match fs::remove_file(record_path(dir, name)) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// List all records in the directory as `(server name, record)` pairs.
///
/// Silently ignores malformed files.
pub fn list_records(dir: &Path) -> io::Result<Vec<(String, PidRecord)>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut results = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();

        if path.extension().and_then(|s| s.to_str()) != Some("pid") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };

        if let Ok(content) = fs::read_to_string(&path)
            && let Ok(record) = parse_record(&content)
        {
            results.push((stem.to_string(), record));
        }
    }

    results.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(results)
}

fn parse_record(content: &str) -> io::Result<PidRecord> {
    let mut lines = content.lines();

    let pid = lines
        .next()
        .and_then(|s| s.trim().parse::<u32>().ok())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "missing or invalid PID"))?;

    let start_time = lines
        .next()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "missing or invalid start time"))?;

    Ok(PidRecord { pid, start_time })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_read_delete() {
        let dir = tempdir().unwrap();
        let record = PidRecord {
            pid: 98765,
            start_time: 1_700_000_000,
        };

        let path = write_record(dir.path(), "login", record).unwrap();
        assert!(path.exists());
        assert!(!dir.path().join("login.pid.tmp").exists());
        assert_eq!(read_record(dir.path(), "login").unwrap(), record);

        delete_record(dir.path(), "login").unwrap();
        assert!(!path.exists());
        // Second delete should be idempotent
        delete_record(dir.path(), "login").unwrap();
    }

    #[test]
    fn list_skips_foreign_and_malformed_files() {
        let dir = tempdir().unwrap();
        write_record(dir.path(), "login", PidRecord { pid: 1, start_time: 2 }).unwrap();
        write_record(dir.path(), "game", PidRecord { pid: 3, start_time: 4 }).unwrap();
        fs::write(dir.path().join("notes.txt"), "garbage").unwrap();
        fs::write(dir.path().join("broken.pid"), "abc\n").unwrap();

        let names: Vec<_> = list_records(dir.path())
            .unwrap()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["game", "login"]);
    }

    #[test]
    fn list_missing_dir_is_empty() {
        let dir = tempdir().unwrap();
        assert!(list_records(&dir.path().join("nope")).unwrap().is_empty());
    }
}
