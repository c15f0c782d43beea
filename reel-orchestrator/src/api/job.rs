//! Job API Handlers
//!
//! Submission and status polling for the caller's animation jobs.

use axum::{
    Json,
    extract::{Path, State},
};
use reel_core::dto::job::{CreateJob, CreateJobResponse, JobStatusResponse};
use uuid::Uuid;

use crate::api::AppState;
use crate::api::auth::Caller;
use crate::api::error::{ApiError, ApiResult};

/// POST /api/generate
/// Create a job; generation and rendering continue in the background
pub async fn create_job(
    State(state): State<AppState>,
    Caller(owner): Caller,
    Json(req): Json<CreateJob>,
) -> ApiResult<Json<CreateJobResponse>> {
    let job_uuid = state.orchestrator.submit(&owner, req).await?;
    Ok(Json(CreateJobResponse { job_uuid }))
}

/// GET /api/status/{job_uuid}
pub async fn get_status(
    State(state): State<AppState>,
    Caller(owner): Caller,
    Path(job_uuid): Path<String>,
) -> ApiResult<Json<JobStatusResponse>> {
    let job_uuid = Uuid::parse_str(&job_uuid)
        .map_err(|_| ApiError::BadRequest(format!("Invalid job id '{}'", job_uuid)))?;

    tracing::debug!("Getting status of job {}", job_uuid);

    let status = state.orchestrator.status(&owner, job_uuid).await?;
    Ok(Json(status))
}
