//! Job DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::job::{Job, JobStatus};
use crate::domain::render::{Backend, RenderConfig};
use crate::domain::video::Video;

/// Request to create a new animation job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJob {
    pub prompt: String,
    #[serde(default, alias = "llm", skip_serializing_if = "Option::is_none")]
    pub backend: Option<Backend>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<RenderConfig>,
}

/// Response to job creation: only the identifier, callers poll for status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJobResponse {
    pub job_uuid: Uuid,
}

/// Status of a job as seen by its owner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub status: JobStatus,
    pub job_uuid: Uuid,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_text: Option<String>,
}

impl JobStatusResponse {
    /// Build the status view of a job and, once completed, its video
    pub fn new(job: &Job, video: Option<&Video>) -> Self {
        Self {
            status: job.status,
            job_uuid: job.uuid,
            created_at: job.created_at,
            completed_at: job.completed_at,
            error_message: job.error_message.clone(),
            progress: job.status.progress(),
            video_id: video.map(|v| v.id),
            code_text: video.map(|v| v.associated_code.clone()),
        }
    }
}

/// Out-of-band render outcome reported by the render service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionReport {
    pub job_uuid: Uuid,
    /// "completed" on success, anything else is a failure
    pub status: String,
    #[serde(
        default,
        alias = "artifact_locator",
        skip_serializing_if = "Option::is_none"
    )]
    pub video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(default, alias = "error_reason", skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Attempt the report refers to, echoed from the dispatch payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt: Option<i32>,
}

/// Interpreted outcome of a completion report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    Completed { locator: String },
    Failed { reason: String },
}

impl CompletionReport {
    pub fn completed(job_uuid: Uuid, locator: impl Into<String>) -> Self {
        Self {
            job_uuid,
            status: "completed".to_string(),
            video_url: Some(locator.into()),
            file_size: None,
            error_message: None,
            attempt: None,
        }
    }

    pub fn failed(job_uuid: Uuid, reason: impl Into<String>) -> Self {
        Self {
            job_uuid,
            status: "failed".to_string(),
            video_url: None,
            file_size: None,
            error_message: Some(reason.into()),
            attempt: None,
        }
    }

    pub fn for_attempt(mut self, attempt: i32) -> Self {
        self.attempt = Some(attempt);
        self
    }

    /// A report only counts as success when it says "completed" and carries
    /// a locator; everything else is a render failure.
    pub fn outcome(&self) -> RenderOutcome {
        match (&self.status[..], &self.video_url) {
            ("completed", Some(locator)) if !locator.trim().is_empty() => {
                RenderOutcome::Completed {
                    locator: locator.clone(),
                }
            }
            _ => RenderOutcome::Failed {
                reason: self
                    .error_message
                    .clone()
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| "Unknown error".to_string()),
            },
        }
    }
}

/// Acknowledgment returned to the render service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionAck {
    pub success: bool,
}
