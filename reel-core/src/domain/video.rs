//! Video domain model
//!
//! A video is the artifact of a job that reached `Completed`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A rendered animation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Video {
    /// Numeric key, never reused
    pub id: i64,

    /// Owner of the job that produced this video
    pub owner_id: String,

    /// Job that produced this video (1:1)
    pub job_uuid: Uuid,

    pub title: String,

    /// Code the video was rendered from, captured at completion time
    pub associated_code: String,

    /// Opaque storage locator reported by the render service.
    /// Not directly fetchable; resolved into a signed URL on demand.
    pub storage_locator: String,

    pub created_at: DateTime<Utc>,
}

/// Title given to a video, derived from the job's prompt
pub fn video_title(prompt: &str) -> String {
    let head: String = prompt.chars().take(30).collect();
    format!("Video for {}...", head)
}
