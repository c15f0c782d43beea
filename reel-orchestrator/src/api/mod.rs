//! API Module
//!
//! HTTP API layer for the orchestrator.
//! Each submodule handles endpoints for a specific domain.

pub mod auth;
pub mod error;
pub mod health;
pub mod job;
pub mod video;
pub mod webhook;

use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method, header},
    routing::{get, post},
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::service::{CompletionNotifier, JobOrchestrator};
use crate::storage::UrlSigner;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: JobOrchestrator,
    pub notifier: CompletionNotifier,
    pub signer: Arc<dyn UrlSigner>,
    /// Shared secret of the render service; `None` refuses every callback
    pub webhook_key: Option<String>,
    pub download_ttl: Duration,
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Job endpoints
        .route("/api/generate", post(job::create_job))
        .route("/api/status/{job_uuid}", get(job::get_status))
        // Video endpoints
        .route("/api/videos", get(video::list_videos))
        .route("/api/video/{video_id}/download", get(video::download_url))
        // Render service callbacks
        .route("/webhooks/job-completion", post(webhook::job_completion))
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// CORS policy admitting only the given browser origins
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static("x-user-id"),
        ])
        .allow_credentials(true)
}
