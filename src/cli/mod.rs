//! Command-line front end.
//!
//! Provides argument parsing and command dispatch.

pub mod args;
pub mod commands;

pub use args::{Cli, Commands};

use anyhow::Result;

use crate::config::Settings;
use commands::{ask::AskArgs, index::IndexArgs, retrieve::RetrieveArgs};

/// Load settings for `cli`, preferring an explicit `--config` file.
pub fn load_settings(cli: &Cli) -> Result<Settings> {
    let settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };
    Ok(settings)
}

/// Execute the parsed command.
pub async fn run(cli: Cli, settings: Settings) -> Result<()> {
    match cli.command {
        Commands::Init { force } => commands::init::run_init(force),
        Commands::Config => commands::init::run_config(&settings),
        Commands::Index {
            source,
            output,
            threads,
            no_progress,
            json,
        } => {
            let args = IndexArgs {
                source,
                output,
                threads,
                no_progress,
                json,
            };
            // Indexing is CPU bound and blocks on the embedding model.
            tokio::task::spawn_blocking(move || commands::index::run(args, &settings)).await?
        }
        Commands::Retrieve {
            query,
            top_k,
            index,
            json,
        } => {
            let args = RetrieveArgs {
                query,
                top_k,
                index,
                json,
            };
            tokio::task::spawn_blocking(move || commands::retrieve::run(args, &settings)).await?
        }
        Commands::Ask {
            question,
            top_k,
            index,
            json,
        } => {
            let args = AskArgs {
                question,
                top_k,
                index,
                json,
            };
            commands::ask::run(args, &settings).await
        }
    }
}
