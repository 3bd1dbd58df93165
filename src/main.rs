use clap::Parser;

use ragcore::cli::{self, Cli, Commands};
use ragcore::config::Settings;
use ragcore::logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // init must work before any settings file exists
    let settings = match &cli.command {
        Commands::Init { .. } => Settings::default(),
        _ => match cli::load_settings(&cli) {
            Ok(settings) => settings,
            Err(e) => {
                eprintln!("Error: {e:#}");
                std::process::exit(2);
            }
        },
    };

    logging::init_with_config(&settings.logging);
    tracing::debug!(target: "cli", "running {:?}", cli.command);

    if let Err(e) = cli::run(cli, settings).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
