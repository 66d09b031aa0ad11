//! Main CLI parser and top-level argument handling.
//!
//! This module defines the root CLI structure with global options.

use std::path::PathBuf;

use clap::Parser;

use crate::commands::Commands;

/// Command-line interface for supervising game server processes.
///
/// This is the top-level parser that handles global options and dispatches
/// to subcommands.
#[derive(Debug, Parser)]
#[command(name = "warden")]
#[command(about = "Start, stop and watch game server processes")]
#[command(version)]
pub struct Cli {
    /// Config file to use instead of the default lookup
    #[arg(long = "config", global = true, env = "WARDEN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_commands::ConfigCommand;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parser_builds() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_args() {
        let cli = Cli::parse_from(["warden", "--verbose", "--config", "/srv/warden.json", "status"]);
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/srv/warden.json")));
        assert!(matches!(cli.command, Some(Commands::Status { json: false })));
    }

    #[test]
    fn test_global_args_after_subcommand() {
        let cli = Cli::parse_from(["warden", "stop", "-v"]);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Some(Commands::Stop { grace: None })));
    }

    #[test]
    fn test_tail_takes_name_or_path() {
        let cli = Cli::parse_from(["warden", "tail", "logs/game.log"]);
        assert!(matches!(cli.command, Some(Commands::Tail { target }) if target == "logs/game.log"));
    }

    #[test]
    fn test_config_set() {
        let cli = Cli::parse_from(["warden", "config", "set", "game", "MaxOnlineUsers", "500"]);
        let Some(Commands::Config { command }) = cli.command else {
            panic!("expected config command");
        };
        assert!(matches!(
            command,
            ConfigCommand::Set { server, key, value }
                if server == "game" && key == "MaxOnlineUsers" && value == "500"
        ));
    }

    #[test]
    fn test_exec_passes_hyphenated_args_through() {
        let cli = Cli::parse_from(["warden", "exec", "java", "-version"]);
        let Some(Commands::Exec { program, args }) = cli.command else {
            panic!("expected exec command");
        };
        assert_eq!(program, "java");
        assert_eq!(args, vec!["-version"]);
    }

    #[test]
    fn test_no_command_is_allowed() {
        let cli = Cli::parse_from(["warden"]);
        assert!(cli.command.is_none());
    }
}
