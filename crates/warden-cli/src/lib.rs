//! Command-line control surface for warden.
//!
//! The binary in `main.rs` is a thin dispatcher; parsing, bootstrap,
//! handlers and terminal rendering live here so they can be tested.

#![deny(unsafe_code)]

// Dev-dependency kept for async handler tests
#[cfg(test)]
use tokio_test as _;

pub mod bootstrap;
pub mod commands;
pub mod config_commands;
pub mod error;
pub mod handlers;
pub mod parser;
pub mod presentation;

// Re-export primary types for convenient access
pub use bootstrap::{CliConfig, CliContext, bootstrap, init_tracing};
pub use commands::Commands;
pub use config_commands::ConfigCommand;
pub use error::CliError;
pub use parser::Cli;

/// Run one parsed command.
pub async fn dispatch(ctx: &CliContext, command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Run { no_logs } => handlers::run::execute(ctx, !no_logs).await,
        Commands::Status { json } => handlers::status::execute(ctx, json),
        Commands::Stop { grace } => handlers::stop::execute(ctx, grace).await,
        Commands::Tail { target } => handlers::tail::execute(ctx, &target).await,
        Commands::Reap => handlers::reap::execute(ctx).await,
        Commands::CheckDeps => handlers::check_deps::execute().await,
        Commands::Config { command } => handlers::config::execute(ctx, command),
        Commands::Exec { program, args } => handlers::exec::execute(&program, &args).await,
    }
}
