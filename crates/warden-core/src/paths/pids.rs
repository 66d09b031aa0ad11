//! PID record directory path resolution.

use std::path::PathBuf;

use super::PathError;
use super::platform::data_root;

/// Returns the default directory where PID records are stored.
///
/// Location: `<data root>/pids`. A `state_dir` in the config file takes
/// precedence; callers decide.
pub fn pids_dir() -> Result<PathBuf, PathError> {
    Ok(data_root()?.join("pids"))
}
