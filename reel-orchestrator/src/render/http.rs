use async_trait::async_trait;
use reel_core::dto::render::{RenderAck, RenderRequest};
use reqwest::Client;
use std::time::Duration;

use super::{DispatchAck, DispatchError, RenderDispatcher};

const DISPATCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Dispatches to the render service over HTTP (`POST {base}/render`)
pub struct HttpRenderDispatcher {
    client: Client,
    render_service_url: String,
}

impl HttpRenderDispatcher {
    /// # Arguments
    /// * `render_service_url` - Base URL of the render service (e.g., "http://localhost:8000")
    pub fn new(client: Client, render_service_url: String) -> Self {
        Self {
            client,
            render_service_url: render_service_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl RenderDispatcher for HttpRenderDispatcher {
    async fn dispatch(&self, request: &RenderRequest) -> Result<DispatchAck, DispatchError> {
        let url = format!("{}/render", self.render_service_url);

        let response = self
            .client
            .post(&url)
            .timeout(DISPATCH_TIMEOUT)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(DispatchError::Status { status, body });
        }

        let ack = response.json::<RenderAck>().await?;
        tracing::debug!(
            "Render service answered '{}' for job {} attempt {}",
            ack.status,
            request.job_uuid,
            request.attempt
        );

        Ok(ack.into())
    }
}
