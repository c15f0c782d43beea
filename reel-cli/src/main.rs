//! Reel CLI
//!
//! Command-line interface for submitting animation jobs and fetching videos.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;

#[derive(Parser)]
#[command(name = "reel")]
#[command(about = "Reel animation CLI", long_about = None)]
struct Cli {
    /// Orchestrator URL
    #[arg(long, env = "REEL_URL", default_value = "http://localhost:3000")]
    url: String,

    /// User to act as (sent as X-User-Id)
    #[arg(long, env = "REEL_USER")]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config {
        orchestrator_url: cli.url,
        user_id: cli.user,
    };

    handle_command(cli.command, &config).await
}
