//! Path utilities for warden data directories and the config file.
//!
//! # Design
//!
//! - Returns `PathBuf` and `PathError` for clear error handling
//! - No interactive/terminal I/O
//! - OS-specific logic is kept private in `platform`

mod config;
mod error;
mod pids;
mod platform;

pub use config::{CONFIG_FILE_NAME, default_config_path};
pub use error::PathError;
pub use pids::pids_dir;
pub use platform::data_root;
