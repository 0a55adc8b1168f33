//! Pagelens CLI - analyze rasterized PDF pages with vision LLMs.
//!
//! Each input is a directory of page images (one document) or a single image.
//! Pages are sent to Gemini, OpenAI, or an OpenAI-compatible endpoint and the
//! per-page analyses are written as JSON, JSON Lines, or Markdown.
//!
//! # Usage
//!
//! ```bash
//! # Analyze one document's pages with the default provider
//! pagelens analyze ./report_pages/
//!
//! # Use Volcano Engine with an explicit model, export Markdown files
//! pagelens analyze ./a/ ./b/ --provider volcano --model doubao-vision-pro \
//!     --format markdown --output ./exports/
//!
//! # List models a key can access
//! pagelens models gemini
//!
//! # View configuration
//! pagelens config show
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;
mod logging;

/// Pagelens - analyze rasterized PDF pages with vision LLMs.
#[derive(Parser, Debug)]
#[command(name = "pagelens")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file to use instead of the platform default
    #[arg(long, global = true, env = "PAGELENS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze page images with a vision LLM
    Analyze(cli::analyze::AnalyzeArgs),

    /// List the models a provider credential can access
    Models(cli::models::ModelsArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .as_ref()
        .map(|p| PathBuf::from(shellexpand::tilde(&p.to_string_lossy()).into_owned()))
        .unwrap_or_else(pagelens_core::Config::default_path);

    // Logging isn't initialized yet, so use eprintln for config warnings.
    let config = match pagelens_core::Config::load_at(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `pagelens config path`."
            );
            let mut config = pagelens_core::Config::default();
            config.apply_env(|key| std::env::var(key).ok());
            config
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Pagelens v{}", pagelens_core::VERSION);

    match cli.command {
        Commands::Analyze(args) => cli::analyze::execute(args, config).await,
        Commands::Models(args) => cli::models::execute(args, config).await,
        Commands::Config(args) => cli::config::execute(args, config, &config_path).await,
    }
}
