//! Line-preserving access to `key=value` server configuration files.
//!
//! The managed servers read Java-style properties files. Edits made through
//! warden touch only the lines holding the key; comments, blank lines, key
//! order, line endings and unrelated formatting are kept as they are.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors from reading or writing a properties file.
#[derive(Debug, Error)]
pub enum PropertiesError {
    #[error("Failed to read {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Failed to write {path}: {reason}")]
    Write { path: PathBuf, reason: String },

    #[error("Property key cannot be empty")]
    EmptyKey,
}

fn is_comment(trimmed: &str) -> bool {
    trimmed.starts_with('#') || trimmed.starts_with('!')
}

/// Split a non-comment line into `(key, value)` at the first `=` or `:`.
fn split_entry(line: &str) -> Option<(&str, &str)> {
    let trimmed = line.trim_start();
    if trimmed.is_empty() || is_comment(trimmed) {
        return None;
    }
    let idx = trimmed.find(['=', ':'])?;
    Some((trimmed[..idx].trim(), trimmed[idx + 1..].trim()))
}

/// Value of `key` in properties text. The last occurrence wins.
pub fn get_property(text: &str, key: &str) -> Option<String> {
    text.lines()
        .filter_map(split_entry)
        .filter(|(k, _)| *k == key)
        .last()
        .map(|(_, v)| v.to_string())
}

/// All entries in file order.
pub fn entries(text: &str) -> Vec<(String, String)> {
    text.lines()
        .filter_map(split_entry)
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Return `text` with `key` set to `value`.
///
/// Every line defining the key gets the new value after its own separator
/// and spacing, so duplicates keep agreeing with each other. All other
/// bytes, including `\r\n` line endings, are kept as they are. A missing
/// key is appended using the file's line ending.
pub fn set_property(text: &str, key: &str, value: &str) -> Result<String, PropertiesError> {
    let key = key.trim();
    if key.is_empty() {
        return Err(PropertiesError::EmptyKey);
    }

    let newline = if text.contains("\r\n") { "\r\n" } else { "\n" };
    let mut updated = false;
    let mut output = String::with_capacity(text.len() + value.len() + key.len() + 2);

    for line in text.split_inclusive('\n') {
        let body = line.trim_end_matches(['\r', '\n']);
        let ending = &line[body.len()..];
        match split_entry(body) {
            Some((k, _)) if k == key => {
                output.push_str(&body[..value_start(body)]);
                output.push_str(value);
                output.push_str(ending);
                updated = true;
            }
            _ => output.push_str(line),
        }
    }

    if !updated {
        if !output.is_empty() && !output.ends_with('\n') {
            output.push_str(newline);
        }
        output.push_str(key);
        output.push('=');
        output.push_str(value);
        output.push_str(newline);
    }
    Ok(output)
}

/// Byte offset where the value of an entry line begins: after the first
/// separator and any whitespace following it.
fn value_start(line: &str) -> usize {
    let Some(sep) = line.find(['=', ':']) else {
        return line.len();
    };
    let after = &line[sep + 1..];
    sep + 1 + (after.len() - after.trim_start().len())
}

/// Read a whole properties file.
pub fn read_file(path: &Path) -> Result<String, PropertiesError> {
    fs::read_to_string(path).map_err(|e| PropertiesError::Read {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Replace a file's contents through a temp file and a rename.
pub fn write_file_atomic(path: &Path, contents: &str) -> Result<(), PropertiesError> {
    let write_err = |e: std::io::Error| PropertiesError::Write {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    let tmp_path = path.with_extension("warden-tmp");
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&tmp_path)
        .map_err(write_err)?;
    file.write_all(contents.as_bytes()).map_err(write_err)?;
    file.sync_all().map_err(write_err)?;
    drop(file);

    fs::rename(&tmp_path, path).map_err(write_err)
}

/// Set one property in a file on disk, creating the file if needed.
pub fn update_file(path: &Path, key: &str, value: &str) -> Result<(), PropertiesError> {
    let current = if path.exists() {
        read_file(path)?
    } else {
        String::new()
    };
    let next = set_property(&current, key, value)?;
    write_file_atomic(path, &next)?;
    tracing::debug!(path = %path.display(), key, "Updated property");
    Ok(())
}
