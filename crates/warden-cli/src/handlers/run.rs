//! `warden run`: start every server and follow it until interrupted.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use warden_core::{EventEmitter, SupervisorError, WardenConfig};
use warden_runtime::{
    EventBroadcaster, LogTailer, PortReaper, ServerSupervisor, StartReport, SupervisorOptions,
    pidfile,
};

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::handlers::{ctrl_c, live_records};
use crate::presentation::{LogPrinter, print_event};

/// How long the event printer may take to drain after shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

pub async fn execute(ctx: &CliContext, show_logs: bool) -> Result<(), CliError> {
    let config = ctx.load_config()?;
    let state_dir = CliContext::state_dir(&config)?;

    pidfile::sweep_stale_records(&state_dir)?;
    let names: Vec<&str> = config.servers.iter().map(|s| s.name.as_str()).collect();
    let live = live_records(&state_dir, &names)?;
    if !live.is_empty() {
        return Err(CliError::AlreadyRunning(
            live.into_iter().map(|(name, _)| name).collect(),
        ));
    }

    let broadcaster = Arc::new(EventBroadcaster::new());
    let printer = spawn_event_printer(&broadcaster);

    let options = SupervisorOptions {
        state_dir: Some(state_dir),
        ..SupervisorOptions::from_config(&config)
    };
    let emitter: Arc<dyn EventEmitter> = broadcaster.clone();
    let supervisor = ServerSupervisor::new(
        config.launch_specs(),
        options,
        emitter,
        Arc::new(PortReaper::system()),
    )?;

    let log_tasks = if show_logs {
        spawn_log_followers(&config)
    } else {
        Vec::new()
    };

    // Polled from here on, so Ctrl-C during the start sequence is caught
    // instead of killing warden and orphaning what already started.
    let interrupted = ctrl_c();
    tokio::pin!(interrupted);
    let abort = CancellationToken::new();

    let started = start_until_interrupted(&supervisor, &abort, interrupted.as_mut()).await?;
    if let Some(failure) = &started.failed {
        warn!(server = %failure.name, reason = %failure.reason, "Start sequence aborted");
    }

    if !started.started.is_empty() && !abort.is_cancelled() {
        wait_for_exit_or_interrupt(&supervisor, config.reconcile_interval(), interrupted).await;
    }

    let report = supervisor
        .stop_all(config.grace_period(), config.kill_period())
        .await;
    supervisor.shutdown().await;
    drop(supervisor);

    for task in log_tasks {
        task.abort();
    }

    // The printer ends once the last sender is gone.
    drop(broadcaster);
    if timeout(DRAIN_TIMEOUT, printer).await.is_err() {
        debug!("Event printer did not drain in time");
    }

    if let Some(failure) = started.failed {
        return Err(CliError::Process(format!(
            "{} failed to start: {}",
            failure.name, failure.reason
        )));
    }
    if !report.all_stopped() {
        let stuck: Vec<&str> = report
            .stopped
            .iter()
            .filter(|s| !s.outcome.is_stopped())
            .map(|s| s.name.as_str())
            .collect();
        return Err(CliError::Process(format!(
            "still running after stop: {}",
            stuck.join(", ")
        )));
    }
    Ok(())
}

/// Run the start sequence, aborting it between launches once `interrupted`
/// completes. `abort` is cancelled if that happened.
async fn start_until_interrupted(
    supervisor: &ServerSupervisor,
    abort: &CancellationToken,
    mut interrupted: Pin<&mut impl Future<Output = ()>>,
) -> Result<StartReport, SupervisorError> {
    let start = supervisor.start_all_until(abort);
    tokio::pin!(start);
    loop {
        tokio::select! {
            report = &mut start => return report,
            () = &mut interrupted, if !abort.is_cancelled() => {
                info!("Interrupted during start, stopping servers");
                abort.cancel();
            }
        }
    }
}

async fn wait_for_exit_or_interrupt(
    supervisor: &ServerSupervisor,
    interval: Duration,
    mut interrupted: Pin<&mut impl Future<Output = ()>>,
) {
    loop {
        tokio::select! {
            () = &mut interrupted => {
                info!("Interrupted, stopping servers");
                return;
            }
            () = sleep(interval) => {
                if supervisor.all_idle().await {
                    info!("All servers have exited");
                    return;
                }
            }
        }
    }
}

fn spawn_event_printer(broadcaster: &EventBroadcaster) -> JoinHandle<()> {
    let mut events = broadcaster.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => print_event(&event),
                Err(RecvError::Lagged(missed)) => warn!(missed, "Event printer fell behind"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn spawn_log_followers(config: &WardenConfig) -> Vec<JoinHandle<()>> {
    let tailer = LogTailer::new(config.log_poll_interval());
    config
        .servers
        .iter()
        .filter_map(|server| {
            let path = server.log_file.clone()?;
            let tailer = tailer.clone();
            let label = server.name.clone();
            Some(tokio::spawn(async move {
                let mut subscription = tailer.subscribe(path).await;
                let mut printer = LogPrinter::new(Some(label));
                while let Some(chunk) = subscription.recv().await {
                    printer.print(&chunk);
                }
            }))
        })
        .collect()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tokio::time::Instant;
    use warden_core::{LaunchSpec, NoopEmitter};

    fn supervisor(settle: Duration) -> ServerSupervisor {
        let specs = ["login", "game"]
            .into_iter()
            .map(|name| LaunchSpec::new(name, "sleep").with_args(["30"]))
            .collect();
        let options = SupervisorOptions {
            settle_delay: settle,
            stop_pause: Duration::ZERO,
            reap_delay: Duration::ZERO,
            known_ports: Vec::new(),
            ..SupervisorOptions::default()
        };
        ServerSupervisor::new(
            specs,
            options,
            Arc::new(NoopEmitter::new()),
            Arc::new(PortReaper::system()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn interrupt_during_settle_delay_stops_what_started() {
        let sup = supervisor(Duration::from_secs(30));
        let abort = CancellationToken::new();
        let interrupted = sleep(Duration::from_millis(100));
        tokio::pin!(interrupted);

        let begun = Instant::now();
        let report = start_until_interrupted(&sup, &abort, interrupted.as_mut())
            .await
            .unwrap();
        assert!(begun.elapsed() < Duration::from_secs(5));
        assert!(abort.is_cancelled());
        assert_eq!(report.started, vec!["login"]);
        assert_eq!(report.skipped, vec!["game"]);

        let stop = sup
            .stop_all(Duration::from_secs(5), Duration::from_secs(5))
            .await;
        assert_eq!(stop.order(), vec!["login"]);
        assert!(sup.all_idle().await);
        sup.shutdown().await;
    }

    #[tokio::test]
    async fn start_without_interrupt_runs_to_completion() {
        let sup = supervisor(Duration::from_millis(20));
        let abort = CancellationToken::new();
        let interrupted = std::future::pending::<()>();
        tokio::pin!(interrupted);

        let report = start_until_interrupted(&sup, &abort, interrupted.as_mut())
            .await
            .unwrap();
        assert!(report.is_success());
        assert!(!abort.is_cancelled());
        assert_eq!(report.started, vec!["login", "game"]);

        sup.stop_all(Duration::from_secs(5), Duration::from_secs(5))
            .await;
        sup.shutdown().await;
    }
}
