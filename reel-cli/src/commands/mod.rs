//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod job;
mod video;

pub use job::JobCommands;
pub use video::VideoCommands;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Animation jobs
    Job {
        #[command(subcommand)]
        command: JobCommands,
    },
    /// Finished videos
    Video {
        #[command(subcommand)]
        command: VideoCommands,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Job { command } => job::handle_job_command(command, config).await,
        Commands::Video { command } => video::handle_video_command(command, config).await,
    }
}
