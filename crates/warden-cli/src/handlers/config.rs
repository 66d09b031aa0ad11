//! `warden config`: read and edit a server's properties file.

use std::path::PathBuf;

use warden_core::WardenConfig;
use warden_core::properties;

use crate::bootstrap::CliContext;
use crate::config_commands::ConfigCommand;
use crate::error::CliError;

/// Properties file of `server`.
pub fn properties_path(config: &WardenConfig, server: &str) -> Result<PathBuf, CliError> {
    let entry = config
        .server(server)
        .ok_or_else(|| CliError::Arguments(format!("unknown server: {server}")))?;
    entry
        .config_file
        .clone()
        .ok_or_else(|| CliError::Arguments(format!("server {server} has no config_file configured")))
}

pub fn execute(ctx: &CliContext, command: ConfigCommand) -> Result<(), CliError> {
    match command {
        ConfigCommand::Path { server: None } => {
            println!("{}", ctx.config_path().display());
        }
        ConfigCommand::Path {
            server: Some(server),
        } => {
            let config = ctx.load_config()?;
            println!("{}", properties_path(&config, &server)?.display());
        }
        ConfigCommand::Show { server } => {
            let config = ctx.load_config()?;
            let text = properties::read_file(&properties_path(&config, &server)?)?;
            for (key, value) in properties::entries(&text) {
                println!("{key}={value}");
            }
        }
        ConfigCommand::Get { server, key } => {
            let config = ctx.load_config()?;
            let text = properties::read_file(&properties_path(&config, &server)?)?;
            let value = properties::get_property(&text, &key)
                .ok_or_else(|| CliError::Arguments(format!("{key} is not set for {server}")))?;
            println!("{value}");
        }
        ConfigCommand::Set { server, key, value } => {
            let config = ctx.load_config()?;
            let path = properties_path(&config, &server)?;
            properties::update_file(&path, &key, &value)?;
            println!("{server}: {key}={value}");
        }
    }
    Ok(())
}
