//! Render service DTOs
//!
//! Payload sent to the external render service and its immediate
//! acknowledgment.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::render::RenderConfig;

/// Work handed to the render service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderRequest {
    pub job_uuid: Uuid,
    pub attempt: i32,
    pub code: String,
    pub config: RenderConfig,
}

/// Immediate acknowledgment from the render service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderAck {
    pub status: String,
    #[serde(default)]
    pub queue_position: Option<u32>,
    #[serde(default)]
    pub estimated_wait_seconds: Option<u64>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl RenderAck {
    pub fn is_queued(&self) -> bool {
        self.status == "queued"
    }
}
