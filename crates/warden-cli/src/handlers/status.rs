//! `warden status`: report servers from their PID records.

use std::path::Path;

use serde_json::json;
use warden_core::WardenConfig;
use warden_runtime::pidfile::{self, PidRecord};

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::presentation::{BOLD, GREEN, RESET, YELLOW, format_start_time};

/// What a server's PID record says about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    Running(PidRecord),
    /// A record exists but its process is gone or the PID was reused.
    Stale(PidRecord),
    Stopped,
}

impl RecordState {
    const fn label(self) -> &'static str {
        match self {
            Self::Running(_) => "running",
            Self::Stale(_) => "stale",
            Self::Stopped => "stopped",
        }
    }
}

/// State of every configured server, in config order.
pub fn collect(config: &WardenConfig, state_dir: &Path) -> Vec<(String, RecordState)> {
    config
        .servers
        .iter()
        .map(|server| {
            let state = match pidfile::read_record(state_dir, &server.name) {
                Ok(record) if pidfile::is_live(&record) => RecordState::Running(record),
                Ok(record) => RecordState::Stale(record),
                Err(_) => RecordState::Stopped,
            };
            (server.name.clone(), state)
        })
        .collect()
}

pub fn execute(ctx: &CliContext, as_json: bool) -> Result<(), CliError> {
    let config = ctx.load_config()?;
    let state_dir = CliContext::state_dir(&config)?;
    let states = collect(&config, &state_dir);

    if as_json {
        let rows: Vec<_> = states
            .iter()
            .map(|(name, state)| {
                let pid = match state {
                    RecordState::Running(r) | RecordState::Stale(r) => Some(r.pid),
                    RecordState::Stopped => None,
                };
                json!({ "name": name, "state": state.label(), "pid": pid })
            })
            .collect();
        let text = serde_json::to_string_pretty(&rows)
            .map_err(|e| CliError::Core(format!("failed to encode status: {e}")))?;
        println!("{text}");
        return Ok(());
    }

    println!("{BOLD}{:<16} {:<10} {:<8} {}{RESET}", "SERVER", "STATE", "PID", "STARTED");
    for (name, state) in &states {
        match state {
            RecordState::Running(record) => println!(
                "{name:<16} {GREEN}{:<10}{RESET} {:<8} {}",
                state.label(),
                record.pid,
                format_start_time(record.start_time)
            ),
            RecordState::Stale(record) => println!(
                "{name:<16} {YELLOW}{:<10}{RESET} {:<8} -",
                state.label(),
                record.pid
            ),
            RecordState::Stopped => println!("{name:<16} {:<10} {:<8} -", state.label(), "-"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn config(names: &[&str]) -> WardenConfig {
        let servers = names
            .iter()
            .map(|name| {
                serde_json::json!({ "name": name, "program": format!("/srv/{name}.sh") })
            })
            .collect::<Vec<_>>();
        let text = serde_json::json!({ "servers": servers }).to_string();
        WardenConfig::from_json_str(&text, &PathBuf::from("/srv")).unwrap()
    }

    #[test]
    fn test_states_follow_config_order() {
        let dir = tempdir().unwrap();
        let me = pidfile::record_for(std::process::id()).unwrap();
        pidfile::write_record(dir.path(), "game", me).unwrap();
        let gone = PidRecord {
            pid: me.pid,
            start_time: me.start_time + 1,
        };
        pidfile::write_record(dir.path(), "login", gone).unwrap();

        let states = collect(&config(&["login", "game", "npc"]), dir.path());
        assert_eq!(
            states,
            vec![
                ("login".to_string(), RecordState::Stale(gone)),
                ("game".to_string(), RecordState::Running(me)),
                ("npc".to_string(), RecordState::Stopped),
            ]
        );
    }
}
