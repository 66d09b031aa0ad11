//! `warden reap`: free the known server ports now.

use warden_core::DEFAULT_KNOWN_PORTS;
use warden_runtime::PortReaper;

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::presentation::print_reap_report;

pub async fn execute(ctx: &CliContext) -> Result<(), CliError> {
    let ports = ctx
        .load_config_if_present()?
        .map_or_else(|| DEFAULT_KNOWN_PORTS.to_vec(), |config| config.known_ports);

    let report = PortReaper::system().reap_known_ports(&ports).await;
    print_reap_report(&report);

    if report.is_success() {
        Ok(())
    } else {
        Err(CliError::Failed("some ports could not be freed".to_string()))
    }
}
