//! Render service callbacks

use axum::{Json, extract::State};
use reel_core::dto::job::{CompletionAck, CompletionReport};

use crate::api::AppState;
use crate::api::auth::WebhookAuth;
use crate::api::error::ApiResult;

/// POST /webhooks/job-completion
/// Applies a render outcome before acknowledging it, so a failure is
/// answered with an error and the render service can deliver it again
pub async fn job_completion(
    State(state): State<AppState>,
    _auth: WebhookAuth,
    Json(report): Json<CompletionReport>,
) -> ApiResult<Json<CompletionAck>> {
    tracing::info!(
        "Webhook received for job {}: {}",
        report.job_uuid,
        report.status
    );

    let outcome = state.notifier.notify(report).await?;
    tracing::debug!("Webhook report outcome: {:?}", outcome);
    Ok(Json(CompletionAck { success: true }))
}
