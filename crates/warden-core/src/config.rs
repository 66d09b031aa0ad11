//! Supervisor configuration file.
//!
//! A `WardenConfig` is a JSON document listing the managed servers in start
//! order plus the timing knobs of the supervisor, the reaper and the log
//! tailer. Relative paths are resolved against the directory holding the
//! config file when it is loaded.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::LaunchSpec;

/// Ports reaped after a full stop (game, database bridge, login).
pub const DEFAULT_KNOWN_PORTS: [u16; 3] = [2106, 7777, 9014];
/// Pause between two consecutive launches in `start_all`.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 5000;
/// Pause between two consecutive stops in `stop_all`.
pub const DEFAULT_STOP_PAUSE_MS: u64 = 1000;
/// Wait after the last stop before reaping known ports.
pub const DEFAULT_REAP_DELAY_MS: u64 = 2000;
pub const DEFAULT_GRACE_PERIOD_SECS: u64 = 15;
pub const DEFAULT_KILL_PERIOD_SECS: u64 = 5;
pub const DEFAULT_RECONCILE_INTERVAL_MS: u64 = 5000;
pub const DEFAULT_LOG_POLL_INTERVAL_MS: u64 = 500;

/// Errors from loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Invalid config file: {0}")]
    Parse(String),

    #[error("Config lists no servers")]
    NoServers,

    #[error("Server entry #{0} has an empty name")]
    EmptyName(usize),

    #[error("Server name {0:?} is used more than once")]
    DuplicateName(String),

    #[error("{0} must be greater than zero")]
    InvalidInterval(&'static str),
}

/// One managed server as written in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEntry {
    pub name: String,
    pub program: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
    /// Defaults to the directory holding `program`.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    /// `key=value` properties file edited through `warden config`.
    #[serde(default)]
    pub config_file: Option<PathBuf>,
    /// Overrides the global grace period for this server only.
    #[serde(default)]
    pub grace_period_secs: Option<u64>,
}

impl ServerEntry {
    /// Build the launch spec for this entry.
    pub fn launch_spec(&self) -> LaunchSpec {
        let working_dir = self.working_dir.clone().or_else(|| {
            self.program
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
        });

        LaunchSpec {
            name: self.name.clone(),
            program: self.program.clone(),
            args: self.args.clone(),
            working_dir,
            env: self.env.clone(),
            grace_period: self.grace_period_secs.map(Duration::from_secs),
        }
    }

    fn resolve_paths(&mut self, base: &Path) {
        // Bare names ("java") are looked up on PATH at launch, not joined.
        if self.program.components().count() > 1 || self.program.is_absolute() {
            self.program = resolve(base, &self.program);
        }
        for path in [&mut self.working_dir, &mut self.log_file, &mut self.config_file]
            .into_iter()
            .flatten()
        {
            *path = resolve(base, path);
        }
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    /// Managed servers, in start order.
    pub servers: Vec<ServerEntry>,
    pub known_ports: Vec<u16>,
    pub settle_delay_ms: u64,
    pub stop_pause_ms: u64,
    pub reap_delay_ms: u64,
    pub grace_period_secs: u64,
    pub kill_period_secs: u64,
    pub reconcile_interval_ms: u64,
    pub log_poll_interval_ms: u64,
    /// Where PID records live; the data root's `pids` directory when unset.
    pub state_dir: Option<PathBuf>,
}

impl Default for WardenConfig {
    fn default() -> Self {
        Self {
            servers: Vec::new(),
            known_ports: DEFAULT_KNOWN_PORTS.to_vec(),
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            stop_pause_ms: DEFAULT_STOP_PAUSE_MS,
            reap_delay_ms: DEFAULT_REAP_DELAY_MS,
            grace_period_secs: DEFAULT_GRACE_PERIOD_SECS,
            kill_period_secs: DEFAULT_KILL_PERIOD_SECS,
            reconcile_interval_ms: DEFAULT_RECONCILE_INTERVAL_MS,
            log_poll_interval_ms: DEFAULT_LOG_POLL_INTERVAL_MS,
            state_dir: None,
        }
    }
}

impl WardenConfig {
    /// Read, resolve and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let base = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        // Resolved paths must not depend on the working directory later on.
        let base = std::path::absolute(&base).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_json_str(&text, &base)
    }

    /// Parse a config document, resolving relative paths against `base_dir`.
    pub fn from_json_str(text: &str, base_dir: &Path) -> Result<Self, ConfigError> {
        let mut config: Self =
            serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        for server in &mut config.servers {
            server.resolve_paths(base_dir);
        }
        if let Some(dir) = config.state_dir.as_mut() {
            *dir = resolve(base_dir, dir);
        }
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants the supervisor relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.servers.is_empty() {
            return Err(ConfigError::NoServers);
        }

        let mut seen = HashSet::new();
        for (index, server) in self.servers.iter().enumerate() {
            if server.name.trim().is_empty() {
                return Err(ConfigError::EmptyName(index));
            }
            if !seen.insert(server.name.as_str()) {
                return Err(ConfigError::DuplicateName(server.name.clone()));
            }
        }

        if self.reconcile_interval_ms == 0 {
            return Err(ConfigError::InvalidInterval("reconcile_interval_ms"));
        }
        if self.log_poll_interval_ms == 0 {
            return Err(ConfigError::InvalidInterval("log_poll_interval_ms"));
        }
        Ok(())
    }

    pub fn server(&self, name: &str) -> Option<&ServerEntry> {
        self.servers.iter().find(|s| s.name == name)
    }

    /// Launch specs in start order.
    pub fn launch_specs(&self) -> Vec<LaunchSpec> {
        self.servers.iter().map(ServerEntry::launch_spec).collect()
    }

    pub const fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub const fn stop_pause(&self) -> Duration {
        Duration::from_millis(self.stop_pause_ms)
    }

    pub const fn reap_delay(&self) -> Duration {
        Duration::from_millis(self.reap_delay_ms)
    }

    pub const fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }

    pub const fn kill_period(&self) -> Duration {
        Duration::from_secs(self.kill_period_secs)
    }

    pub const fn reconcile_interval(&self) -> Duration {
        Duration::from_millis(self.reconcile_interval_ms)
    }

    pub const fn log_poll_interval(&self) -> Duration {
        Duration::from_millis(self.log_poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "servers": [
            { "name": "login", "program": "login/start.sh",
              "log_file": "login/log/login.log",
              "config_file": "login/config/login.properties",
              "grace_period_secs": 10 },
            { "name": "game", "program": "/opt/game/start.sh",
              "args": ["--nogui"], "env": { "JAVA_OPTS": "-Xmx2g" } }
        ]
    }"#;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = WardenConfig::from_json_str(SAMPLE, Path::new("/srv")).unwrap();
        assert_eq!(config.known_ports, vec![2106, 7777, 9014]);
        assert_eq!(config.settle_delay(), Duration::from_secs(5));
        assert_eq!(config.stop_pause(), Duration::from_secs(1));
        assert_eq!(config.reap_delay(), Duration::from_secs(2));
        assert_eq!(config.grace_period(), Duration::from_secs(15));
        assert_eq!(config.kill_period(), Duration::from_secs(5));
        assert_eq!(config.reconcile_interval(), Duration::from_secs(5));
        assert_eq!(config.log_poll_interval(), Duration::from_millis(500));
        assert!(config.state_dir.is_none());
    }

    #[test]
    fn test_relative_paths_resolve_against_base() {
        let config = WardenConfig::from_json_str(SAMPLE, Path::new("/srv")).unwrap();
        let login = config.server("login").unwrap();
        assert_eq!(login.program, PathBuf::from("/srv/login/start.sh"));
        assert_eq!(login.log_file, Some(PathBuf::from("/srv/login/log/login.log")));

        let spec = login.launch_spec();
        assert_eq!(spec.working_dir, Some(PathBuf::from("/srv/login")));
        assert_eq!(spec.grace_period, Some(Duration::from_secs(10)));

        let game = config.server("game").unwrap().launch_spec();
        assert_eq!(game.program, PathBuf::from("/opt/game/start.sh"));
        assert_eq!(game.args, vec!["--nogui".to_string()]);
        assert_eq!(game.grace_period, None);
    }

    #[test]
    fn test_bare_program_name_is_not_joined() {
        let json = r#"{ "servers": [ { "name": "x", "program": "java" } ] }"#;
        let config = WardenConfig::from_json_str(json, Path::new("/srv")).unwrap();
        let spec = config.launch_specs().remove(0);
        assert_eq!(spec.program, PathBuf::from("java"));
        assert_eq!(spec.working_dir, None);
    }

    #[test]
    fn test_launch_specs_keep_order() {
        let config = WardenConfig::from_json_str(SAMPLE, Path::new("/srv")).unwrap();
        let names: Vec<_> = config.launch_specs().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["login", "game"]);
    }

    #[test]
    fn test_validation_rejects_bad_configs() {
        let base = Path::new("/srv");
        assert!(matches!(
            WardenConfig::from_json_str(r#"{ "servers": [] }"#, base),
            Err(ConfigError::NoServers)
        ));
        assert!(matches!(
            WardenConfig::from_json_str(r#"{ "servers": [ { "name": " ", "program": "a" } ] }"#, base),
            Err(ConfigError::EmptyName(0))
        ));
        assert!(matches!(
            WardenConfig::from_json_str(
                r#"{ "servers": [ { "name": "a", "program": "a" }, { "name": "a", "program": "b" } ] }"#,
                base
            ),
            Err(ConfigError::DuplicateName(name)) if name == "a"
        ));
        assert!(matches!(
            WardenConfig::from_json_str(
                r#"{ "servers": [ { "name": "a", "program": "a" } ], "log_poll_interval_ms": 0 }"#,
                base
            ),
            Err(ConfigError::InvalidInterval("log_poll_interval_ms"))
        ));
        assert!(matches!(
            WardenConfig::from_json_str("not json", base),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warden.json");
        fs::write(&path, SAMPLE).unwrap();

        let config = WardenConfig::load(&path).unwrap();
        assert_eq!(
            config.server("login").unwrap().program,
            dir.path().join("login/start.sh")
        );

        let missing = WardenConfig::load(&dir.path().join("nope.json"));
        assert!(matches!(missing, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_load_through_relative_path_gives_absolute_paths() {
        // `tempdir_in(".")` yields a path relative to the working directory.
        let dir = tempfile::tempdir_in(".").unwrap();
        assert!(dir.path().is_relative());
        let path = dir.path().join("warden.json");
        fs::write(&path, SAMPLE).unwrap();

        let config = WardenConfig::load(&path).unwrap();
        let expected_dir = std::path::absolute(dir.path()).unwrap();
        let login = config.server("login").unwrap().launch_spec();
        assert!(login.program.is_absolute());
        assert!(login.program.ends_with("login/start.sh"));
        assert!(login.program.starts_with(&expected_dir));
        assert_eq!(login.working_dir, Some(expected_dir.join("login")));
    }
}
