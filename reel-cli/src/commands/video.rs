//! Video command handlers

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use reel_client::ReelClient;
use reel_core::dto::video::PageQuery;

use crate::config::Config;

/// Video subcommands
#[derive(Subcommand)]
pub enum VideoCommands {
    /// List your videos, newest first
    List {
        #[arg(long, default_value_t = 10)]
        limit: i64,

        #[arg(long, default_value_t = 0)]
        offset: i64,
    },
    /// Get a download URL for a video
    Download {
        /// Video ID
        id: i64,
    },
}

/// Handle video commands
pub async fn handle_video_command(command: VideoCommands, config: &Config) -> Result<()> {
    let client = config.client()?;

    match command {
        VideoCommands::List { limit, offset } => list_videos(&client, limit, offset).await,
        VideoCommands::Download { id } => download_url(&client, id).await,
    }
}

async fn list_videos(client: &ReelClient, limit: i64, offset: i64) -> Result<()> {
    let page = client.list_videos(PageQuery { limit, offset }).await?;

    if page.videos.is_empty() {
        println!("{}", "No videos found.".yellow());
        return Ok(());
    }

    println!(
        "{}",
        format!(
            "Showing {} of {} video(s):",
            page.videos.len(),
            page.pagination.total
        )
        .bold()
    );
    println!();

    for video in &page.videos {
        println!(
            "  {} {}",
            format!("#{}", video.id).cyan(),
            video.title.bold()
        );
        println!("    Job:      {}", video.job_id.to_string().dimmed());
        println!(
            "    Created:  {}",
            video
                .created_at
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
                .dimmed()
        );
        println!();
    }

    if page.pagination.has_more {
        println!(
            "{}",
            format!(
                "More available: --offset {}",
                page.pagination.offset + page.pagination.limit
            )
            .dimmed()
        );
    }

    Ok(())
}

async fn download_url(client: &ReelClient, id: i64) -> Result<()> {
    let download = client.download_url(id).await?;

    println!("{}", download.title.bold());
    println!("{}", download.presigned_url);
    println!(
        "{}",
        format!("Expires in {}s", download.expires_in).dimmed()
    );

    Ok(())
}
