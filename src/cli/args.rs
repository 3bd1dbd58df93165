//! CLI argument parsing using clap.

use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

const AFTER_HELP: &str = "Quick Start:
  $ ragcore init                          # Create .ragcore/settings.toml
  $ ragcore index ./papers                # Chunk, embed and index a directory
  $ ragcore retrieve \"what is attention\"  # Show the closest chunks
  $ ragcore ask \"what is attention\"       # Answer with numbered citations";

/// Retrieval-augmented question answering over local documents
#[derive(Parser, Debug)]
#[command(
    name = "ragcore",
    version = env!("CARGO_PKG_VERSION"),
    about = "Chunk, embed and index documents, then answer questions with citations",
    next_line_help = true,
    styles = clap_cargo_style(),
    after_help = AFTER_HELP
)]
pub struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Set up .ragcore directory with default configuration
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Build the index from a directory of text documents
    Index {
        /// Directory holding the source documents
        #[arg(value_name = "DIR")]
        source: PathBuf,

        /// Snapshot path (defaults to index_path from settings)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Number of threads to use (overrides config)
        #[arg(short, long)]
        threads: Option<usize>,

        /// Disable progress bars
        #[arg(long)]
        no_progress: bool,

        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the chunks closest to a query
    Retrieve {
        /// Free-text query
        query: String,

        /// Number of chunks to return (defaults to retrieval.top_k)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Snapshot path (defaults to index_path from settings)
        #[arg(short, long)]
        index: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Answer a question from the indexed documents
    Ask {
        /// The question
        question: String,

        /// Number of context chunks (defaults to retrieval.top_k)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Snapshot path (defaults to index_path from settings)
        #[arg(short, long)]
        index: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Display active settings
    Config,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_retrieve() {
        let cli = Cli::parse_from([
            "ragcore",
            "retrieve",
            "what is attention",
            "-k",
            "3",
            "--json",
        ]);
        match cli.command {
            Commands::Retrieve {
                query, top_k, json, ..
            } => {
                assert_eq!(query, "what is attention");
                assert_eq!(top_k, Some(3));
                assert!(json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::parse_from(["ragcore", "index", "docs", "--config", "custom.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        assert!(matches!(cli.command, Commands::Index { .. }));
    }
}
