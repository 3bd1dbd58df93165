//! Init and Config commands.

use anyhow::{Context, Result};

use crate::config::Settings;

/// Run init command - create configuration file in the current directory.
pub fn run_init(force: bool) -> Result<()> {
    let root = std::env::current_dir().context("cannot determine current directory")?;
    let path = Settings::init_config_file(&root, force)?;

    println!("Created configuration file at: {}", path.display());
    println!("Edit this file to customize your settings.");
    Ok(())
}

/// Run config command - display current configuration.
pub fn run_config(config: &Settings) -> Result<()> {
    println!("Current Configuration:");
    println!("{}", "=".repeat(50));
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}
