//! Configuration CLI commands.
//!
//! Provides `config list` and `config path`.

use clap::Subcommand;
use stacmosaic::config::{config_file_path, ConfigFile};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// List all configuration settings
    List,

    /// Show the configuration file path
    Path,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::List => run_list(),
        ConfigCommands::Path => run_path(),
    }
}

/// List all configuration settings, grouped by section.
fn run_list() -> Result<(), CliError> {
    let config = ConfigFile::load()?;

    println!("Configuration Settings");
    println!("======================");
    println!();

    let mut current_section = String::new();
    for (key, value) in config.entries() {
        let (section, name) = key.split_once('.').unwrap_or(("", key.as_str()));

        if section != current_section {
            if !current_section.is_empty() {
                println!();
            }
            println!("[{}]", section);
            current_section = section.to_string();
        }

        if value.is_empty() {
            println!("  {} = (not set)", name);
        } else {
            println!("  {} = {}", name, value);
        }
    }

    Ok(())
}

/// Show the configuration file path.
fn run_path() -> Result<(), CliError> {
    println!("{}", config_file_path().display());
    Ok(())
}
