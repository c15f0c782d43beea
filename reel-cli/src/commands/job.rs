//! Job command handlers
//!
//! Submitting prompts and following jobs until they finish.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use reel_client::ReelClient;
use reel_core::domain::job::JobStatus;
use reel_core::domain::render::{Backend, Quality, RenderConfig, Resolution};
use reel_core::dto::job::{CreateJob, JobStatusResponse};
use std::time::Duration;
use uuid::Uuid;

use crate::config::Config;

/// Job subcommands
#[derive(Subcommand)]
pub enum JobCommands {
    /// Submit a prompt for animation
    Submit {
        /// What to animate
        prompt: String,

        /// Generation backend (openai, gemini)
        #[arg(long)]
        backend: Option<Backend>,

        /// Render quality (low, medium, high)
        #[arg(long)]
        quality: Option<Quality>,

        /// Target length in seconds
        #[arg(long)]
        duration: Option<u32>,

        /// Output resolution (720p, 1080p, 4k)
        #[arg(long)]
        resolution: Option<Resolution>,

        /// Wait for the job to finish
        #[arg(short, long)]
        wait: bool,
    },
    /// Show the status of a job
    Status {
        /// Job UUID
        id: Uuid,

        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },
    /// Wait until a job completes or fails
    Wait {
        /// Job UUID
        id: Uuid,

        /// Seconds between polls
        #[arg(long, default_value_t = 3)]
        interval: u64,

        /// Give up after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
}

/// Handle job commands
pub async fn handle_job_command(command: JobCommands, config: &Config) -> Result<()> {
    let client = config.client()?;

    match command {
        JobCommands::Submit {
            prompt,
            backend,
            quality,
            duration,
            resolution,
            wait,
        } => {
            let config = RenderConfig {
                quality,
                duration,
                resolution,
            };
            let req = CreateJob {
                prompt,
                backend,
                config: (config != RenderConfig::default()).then_some(config),
            };
            submit_job(&client, req, wait).await
        }
        JobCommands::Status { id, json } => show_status(&client, id, json).await,
        JobCommands::Wait {
            id,
            interval,
            timeout,
        } => wait_for_job(&client, id, interval, timeout).await,
    }
}

async fn submit_job(client: &ReelClient, req: CreateJob, wait: bool) -> Result<()> {
    let job_uuid = client
        .submit_job(&req)
        .await
        .context("Failed to submit job")?;

    println!("{}", "✓ Job submitted".green().bold());
    println!("  ID: {}", job_uuid.to_string().cyan());

    if wait {
        println!();
        wait_for_job(client, job_uuid, 3, None).await?;
    } else {
        println!(
            "{}",
            format!("  Follow it with: reel job wait {}", job_uuid).dimmed()
        );
    }

    Ok(())
}

async fn show_status(client: &ReelClient, id: Uuid, json: bool) -> Result<()> {
    let status = client.job_status(id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print_status(&status);
    }

    Ok(())
}

async fn wait_for_job(
    client: &ReelClient,
    id: Uuid,
    interval: u64,
    timeout: Option<u64>,
) -> Result<()> {
    println!("{}", format!("Waiting for job {}...", id).dimmed());

    let status = client
        .wait_for_job(
            id,
            Duration::from_secs(interval.max(1)),
            timeout.map(Duration::from_secs),
        )
        .await?;

    print_status(&status);

    if status.status == JobStatus::Failed {
        anyhow::bail!("job {} failed", id);
    }
    Ok(())
}

/// Print job status information
fn print_status(status: &JobStatusResponse) {
    println!("{}", "Job Status:".bold());
    println!("  ID:        {}", status.job_uuid.to_string().cyan());
    println!("  Status:    {}", colorize_status(status.status));
    println!("  Progress:  {}%", status.progress);
    println!(
        "  Created:   {}",
        status.created_at.format("%Y-%m-%d %H:%M:%S")
    );

    if let Some(completed) = status.completed_at {
        println!("  Completed: {}", completed.format("%Y-%m-%d %H:%M:%S"));
        let seconds = completed
            .signed_duration_since(status.created_at)
            .num_seconds();
        println!("  Duration:  {}s", seconds);
    }

    if let Some(video_id) = status.video_id {
        println!("  Video:     {}", video_id.to_string().green());
        println!(
            "{}",
            format!("  Download with: reel video download {}", video_id).dimmed()
        );
    }

    if let Some(error) = &status.error_message {
        println!("\n{}", "Error:".bold());
        println!("{}", error.red());
    }

    if let Some(code) = &status.code_text {
        println!("\n{}", "Code:".bold());
        println!("{}", "─".repeat(80).dimmed());
        println!("{}", code);
        println!("{}", "─".repeat(80).dimmed());
    }
}

/// Colorize job status for display
fn colorize_status(status: JobStatus) -> ColoredString {
    let status_str = status.as_str();
    match status {
        JobStatus::Pending => status_str.yellow(),
        JobStatus::Processing => status_str.cyan(),
        JobStatus::Completed => status_str.green(),
        JobStatus::Failed => status_str.red(),
    }
}
