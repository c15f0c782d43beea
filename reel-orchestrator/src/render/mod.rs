//! Render service dispatch
//!
//! Hands generated code to the external render service. Dispatch only
//! enqueues work; the render outcome arrives later as a completion report.

mod http;

pub use http::HttpRenderDispatcher;

use async_trait::async_trait;
use reel_core::dto::render::{RenderAck, RenderRequest};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("render service unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("render service returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// The render service's answer to a dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchAck {
    pub accepted: bool,
    pub queue_position: Option<u32>,
    pub estimated_wait_seconds: Option<u64>,
    /// Set when the service refused the request
    pub rejection_reason: Option<String>,
}

impl DispatchAck {
    pub fn queued(queue_position: u32) -> Self {
        Self {
            accepted: true,
            queue_position: Some(queue_position),
            estimated_wait_seconds: None,
            rejection_reason: None,
        }
    }

    pub fn rejected(reason: &str) -> Self {
        Self {
            accepted: false,
            queue_position: None,
            estimated_wait_seconds: None,
            rejection_reason: Some(reason.to_string()),
        }
    }
}

impl From<RenderAck> for DispatchAck {
    fn from(ack: RenderAck) -> Self {
        if ack.is_queued() {
            Self {
                accepted: true,
                queue_position: ack.queue_position,
                estimated_wait_seconds: ack.estimated_wait_seconds,
                rejection_reason: None,
            }
        } else {
            Self {
                accepted: false,
                queue_position: None,
                estimated_wait_seconds: None,
                rejection_reason: Some(
                    ack.error_message
                        .filter(|m| !m.is_empty())
                        .unwrap_or_else(|| "Video generation failed".to_string()),
                ),
            }
        }
    }
}

/// Sends render requests to the render service
#[async_trait]
pub trait RenderDispatcher: Send + Sync {
    async fn dispatch(&self, request: &RenderRequest) -> Result<DispatchAck, DispatchError>;
}
