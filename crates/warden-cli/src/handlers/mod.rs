//! Command handlers.
//!
//! Handlers follow one pattern:
//! - Signature: `pub async fn execute(ctx: &CliContext, ...) -> Result<(), CliError>`
//! - Thin wrappers that:
//!   1. Load the config and resolve the state directory
//!   2. Build the runtime pieces they need (supervisor, tailer, reaper)
//!   3. Format output for the terminal

pub mod check_deps;
pub mod config;
pub mod exec;
pub mod reap;
pub mod run;
pub mod status;
pub mod stop;
pub mod tail;

use std::path::Path;

use warden_runtime::pidfile::{self, PidRecord};

use crate::error::CliError;

/// Live PID records in `dir`, in the order of `names`.
///
/// Records for names not in `names` come last, sorted by name.
pub(crate) fn live_records(dir: &Path, names: &[&str]) -> Result<Vec<(String, PidRecord)>, CliError> {
    let mut records: Vec<(String, PidRecord)> = pidfile::list_records(dir)?
        .into_iter()
        .filter(|(_, record)| pidfile::is_live(record))
        .collect();
    records.sort_by_key(|(name, _)| names.iter().position(|n| n == name).unwrap_or(names.len()));
    Ok(records)
}

/// Wait for Ctrl-C. Never returns if the handler cannot be installed.
pub(crate) async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
