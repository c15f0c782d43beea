//! Video API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
};
use reel_core::dto::video::{DownloadUrl, PageQuery, VideoPage};

use crate::api::AppState;
use crate::api::auth::Caller;
use crate::api::error::{ApiError, ApiResult};
use crate::service::video_service;

/// GET /api/videos?limit&offset
/// The caller's videos, newest first
pub async fn list_videos(
    State(state): State<AppState>,
    Caller(owner): Caller,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<VideoPage>> {
    let page = video_service::list_videos(state.orchestrator.store().as_ref(), &owner, query).await?;
    Ok(Json(page))
}

/// GET /api/video/{video_id}/download
/// Signed, time-limited download URL for one of the caller's videos
pub async fn download_url(
    State(state): State<AppState>,
    Caller(owner): Caller,
    Path(video_id): Path<String>,
) -> ApiResult<Json<DownloadUrl>> {
    let video_id: i64 = video_id
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid video id '{}'", video_id)))?;
    let url = video_service::download_url(
        state.orchestrator.store().as_ref(),
        state.signer.as_ref(),
        &owner,
        video_id,
        state.download_ttl,
    )
    .await?;
    Ok(Json(url))
}
