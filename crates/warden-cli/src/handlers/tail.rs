//! `warden tail`: follow one log file until Ctrl-C.

use std::path::PathBuf;
use std::time::Duration;

use warden_core::{DEFAULT_LOG_POLL_INTERVAL_MS, WardenConfig};
use warden_runtime::LogTailer;

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::handlers::ctrl_c;
use crate::presentation::LogPrinter;

/// Resolve `target` as a server name first, then as a file path.
pub fn resolve_target(config: Option<&WardenConfig>, target: &str) -> Result<PathBuf, CliError> {
    if let Some(server) = config.and_then(|c| c.server(target)) {
        return server.log_file.clone().ok_or_else(|| {
            CliError::Arguments(format!("server {target} has no log_file configured"))
        });
    }
    Ok(PathBuf::from(target))
}

pub async fn execute(ctx: &CliContext, target: &str) -> Result<(), CliError> {
    let config = ctx.load_config_if_present()?;
    let path = resolve_target(config.as_ref(), target)?;
    let poll = config.as_ref().map_or(
        Duration::from_millis(DEFAULT_LOG_POLL_INTERVAL_MS),
        WardenConfig::log_poll_interval,
    );

    let tailer = LogTailer::new(poll);
    let mut subscription = tailer.subscribe(path).await;
    let mut printer = LogPrinter::new(None);

    let interrupted = ctrl_c();
    tokio::pin!(interrupted);
    loop {
        tokio::select! {
            () = &mut interrupted => break,
            chunk = subscription.recv() => match chunk {
                Some(chunk) => printer.print(&chunk),
                None => break,
            },
        }
    }

    subscription.unsubscribe();
    Ok(())
}
