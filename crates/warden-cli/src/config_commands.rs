//! Server properties file subcommands.

use clap::Subcommand;

/// Commands for a server's `key=value` properties file.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path, or a server's properties file path
    Path {
        /// Server name (omit for warden's own config file)
        server: Option<String>,
    },
    /// Print every property of a server
    Show { server: String },
    /// Print one property
    Get { server: String, key: String },
    /// Set one property, keeping the rest of the file as it is
    Set {
        server: String,
        key: String,
        value: String,
    },
}
