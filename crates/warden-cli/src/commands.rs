//! Top-level subcommands.

use clap::Subcommand;

use crate::config_commands::ConfigCommand;

/// Available CLI commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start every configured server and follow it until Ctrl-C
    Run {
        /// Do not print server log files, only lifecycle events
        #[arg(long)]
        no_logs: bool,
    },
    /// Show the servers started by `warden run`
    Status {
        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },
    /// Stop the servers started by `warden run`, then free the known ports
    Stop {
        /// Seconds to wait after the polite stop request (default from config)
        #[arg(long)]
        grace: Option<u64>,
    },
    /// Follow a server's log file, or any file, until Ctrl-C
    Tail {
        /// Server name from the config file, or a path to a file
        target: String,
    },
    /// Kill whatever still listens on the known server ports
    Reap,
    /// Check that Java and the database client are installed
    CheckDeps,
    /// Read or change a server's properties file
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Run an external command and stream its output
    Exec {
        program: String,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}
