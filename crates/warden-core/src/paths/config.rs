//! Config file location.

use std::env;
use std::path::{Path, PathBuf};

use super::error::PathError;
use super::platform::data_root;

/// File name looked up in the working directory and the data root.
pub const CONFIG_FILE_NAME: &str = "warden.json";

const CONFIG_ENV: &str = "WARDEN_CONFIG";

/// Location of the config file when `--config` is not given.
///
/// Resolution order:
/// 1. `WARDEN_CONFIG` environment variable
/// 2. `./warden.json` if it exists
/// 3. `<data root>/warden.json`
pub fn default_config_path() -> Result<PathBuf, PathError> {
    if let Ok(path) = env::var(CONFIG_ENV) {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }

    let cwd = env::current_dir().map_err(|e| PathError::CurrentDirError(e.to_string()))?;
    resolve_config_path(&cwd, data_root)
}

fn resolve_config_path(
    cwd: &Path,
    data_root: impl FnOnce() -> Result<PathBuf, PathError>,
) -> Result<PathBuf, PathError> {
    let local = cwd.join(CONFIG_FILE_NAME);
    if local.is_file() {
        return Ok(local);
    }
    Ok(data_root()?.join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn prefers_config_in_working_directory() {
        let cwd = tempdir().unwrap();
        fs::write(cwd.path().join(CONFIG_FILE_NAME), "{}").unwrap();

        let path = resolve_config_path(cwd.path(), || Ok(PathBuf::from("/unused"))).unwrap();
        assert_eq!(path, cwd.path().join(CONFIG_FILE_NAME));
    }

    #[test]
    fn falls_back_to_data_root() {
        let cwd = tempdir().unwrap();
        let root = tempdir().unwrap();
        let root_path = root.path().to_path_buf();

        let path = resolve_config_path(cwd.path(), || Ok(root_path)).unwrap();
        assert_eq!(path, root.path().join(CONFIG_FILE_NAME));
    }
}
