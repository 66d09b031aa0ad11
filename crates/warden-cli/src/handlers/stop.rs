//! `warden stop`: stop servers started by an earlier `warden run`.

use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;
use warden_core::{StopOutcome, SupervisorEvent};
use warden_runtime::PortReaper;
use warden_runtime::pidfile;
use warden_runtime::process::shutdown::terminate_pid;

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::handlers::live_records;
use crate::presentation::{print_event, print_reap_report};

pub async fn execute(ctx: &CliContext, grace_override: Option<u64>) -> Result<(), CliError> {
    let config = ctx.load_config()?;
    let state_dir = CliContext::state_dir(&config)?;

    pidfile::sweep_stale_records(&state_dir)?;
    let names: Vec<&str> = config.servers.iter().map(|s| s.name.as_str()).collect();
    let mut records = live_records(&state_dir, &names)?;
    records.reverse();

    if records.is_empty() {
        println!("No running servers.");
    }

    let mut stuck = Vec::new();
    for (index, (name, record)) in records.iter().enumerate() {
        if index > 0 {
            sleep(config.stop_pause()).await;
        }

        let grace = grace_override
            .map(Duration::from_secs)
            .or_else(|| {
                config
                    .server(name)
                    .and_then(|s| s.grace_period_secs)
                    .map(Duration::from_secs)
            })
            .unwrap_or_else(|| config.grace_period());

        print_event(&SupervisorEvent::stopping(name.as_str(), Some(record.pid)));
        let outcome = terminate_pid(record.pid, grace, config.kill_period()).await;
        print_event(&SupervisorEvent::stopped(name.as_str(), outcome, None));

        if outcome == StopOutcome::StillRunning {
            stuck.push(name.clone());
        } else if let Err(e) = pidfile::delete_record(&state_dir, name) {
            warn!(server = %name, error = %e, "Failed to delete PID record");
        }
    }

    if !records.is_empty() && stuck.is_empty() {
        print_event(&SupervisorEvent::all_stopped());
    }

    sleep(config.reap_delay()).await;
    let report = PortReaper::system()
        .reap_known_ports(&config.known_ports)
        .await;
    print_reap_report(&report);

    if stuck.is_empty() {
        Ok(())
    } else {
        Err(CliError::Process(format!(
            "still running after stop: {}",
            stuck.join(", ")
        )))
    }
}
