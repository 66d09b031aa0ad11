//! `warden` binary entry point.

use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use warden_cli::{Cli, CliConfig, bootstrap, dispatch, init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Load .env before parsing so WARDEN_CONFIG can come from it
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(ExitCode::SUCCESS);
    };

    let result = match bootstrap(CliConfig {
        config_path: cli.config,
    }) {
        Ok(ctx) => dispatch(&ctx, command).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            eprintln!("Error: {e}");
            let code = u8::try_from(e.exit_code()).unwrap_or(1);
            Ok(ExitCode::from(code))
        }
    }
}
