//! CLI bootstrap - the composition root.
//!
//! This module is the only place where the CLI decides which config file
//! to read, where PID records live and how logging is set up. Command
//! handlers receive a [`CliContext`] and build the runtime pieces they need
//! from it.

use std::path::{Path, PathBuf};

use tracing::debug;
use tracing_subscriber::EnvFilter;
use warden_core::{WardenConfig, default_config_path, pids_dir};

use crate::error::CliError;

/// Initialise logging once.
///
/// `RUST_LOG` wins when set; otherwise `--verbose` selects debug output and
/// the default is warnings only, so lifecycle output on stdout stays
/// readable.
pub fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Bootstrap configuration for the CLI.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// `--config` override.
    pub config_path: Option<PathBuf>,
}

/// Resolved locations shared by every command.
#[derive(Debug, Clone)]
pub struct CliContext {
    config_path: PathBuf,
}

impl CliContext {
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Read and validate the config file.
    pub fn load_config(&self) -> Result<WardenConfig, CliError> {
        debug!(path = %self.config_path.display(), "Loading config");
        Ok(WardenConfig::load(&self.config_path)?)
    }

    /// Config file contents, or `None` when the file does not exist.
    pub fn load_config_if_present(&self) -> Result<Option<WardenConfig>, CliError> {
        if self.config_path.exists() {
            self.load_config().map(Some)
        } else {
            debug!(path = %self.config_path.display(), "No config file, using defaults");
            Ok(None)
        }
    }

    /// Where PID records live for `config`.
    pub fn state_dir(config: &WardenConfig) -> Result<PathBuf, CliError> {
        match &config.state_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(pids_dir()?),
        }
    }
}

/// Resolve the config file location.
pub fn bootstrap(config: CliConfig) -> Result<CliContext, CliError> {
    let path = match config.config_path {
        Some(path) => path,
        None => default_config_path()?,
    };
    debug!(path = %path.display(), "Resolved config path");
    Ok(CliContext::new(path))
}
