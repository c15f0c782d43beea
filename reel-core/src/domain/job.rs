//! Job domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::render::{Backend, RenderConfig};

/// Animation job record
///
/// One job tracks a single user request across every generation and render
/// attempt. Retries re-enter `Processing` on the same record; the `uuid` is
/// the identity callers and the render service refer to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Internal numeric key
    pub id: i64,
    /// Externally visible identifier
    pub uuid: Uuid,
    /// Principal that submitted the job
    pub owner_id: String,
    /// Prompt as submitted by the caller
    pub original_prompt: String,
    /// Prompt used for the next generation attempt; rewritten on retry
    pub prompt: String,
    pub status: JobStatus,
    /// Backend requested by the caller, if any
    pub backend: Option<Backend>,
    pub config: RenderConfig,
    pub generated_code: Option<String>,
    pub retries_remaining: i32,
    /// Number of generation attempts started so far
    pub attempt: i32,
    /// The current attempt was handed to the render service and its outcome
    /// has not been applied yet
    pub render_pending: bool,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub dispatched_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub video_id: Option<i64>,
}

/// Job lifecycle status
///
/// `Pending -> Processing -> {Completed, Failed}`; `Processing` may loop on
/// itself for retries. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Processing => "PROCESSING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Coarse progress estimate reported to callers
    pub fn progress(&self) -> u8 {
        match self {
            JobStatus::Pending => 10,
            JobStatus::Processing => 50,
            JobStatus::Completed => 100,
            JobStatus::Failed => 0,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(JobStatus::Pending),
            "PROCESSING" => Ok(JobStatus::Processing),
            "COMPLETED" => Ok(JobStatus::Completed),
            "FAILED" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_outcomes_are_terminal() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_progress_by_status() {
        assert_eq!(JobStatus::Pending.progress(), 10);
        assert_eq!(JobStatus::Processing.progress(), 50);
        assert_eq!(JobStatus::Completed.progress(), 100);
        assert_eq!(JobStatus::Failed.progress(), 0);
    }

    #[test]
    fn test_status_string_forms_agree() {
        let status: JobStatus = "PROCESSING".parse().unwrap();
        assert_eq!(status, JobStatus::Processing);
        assert_eq!(
            serde_json::to_string(&JobStatus::Completed).unwrap(),
            "\"COMPLETED\""
        );
        assert!("Running".parse::<JobStatus>().is_err());
    }
}
