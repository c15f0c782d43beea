//! Video Service
//!
//! Owner-scoped listing of finished videos and download URL minting.

use reel_core::dto::video::{DownloadUrl, PageQuery, Pagination, VideoPage, VideoSummary};
use std::time::Duration;
use thiserror::Error;

use crate::repository::{JobStore, StoreError};
use crate::storage::{SigningError, UrlSigner};

pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Error)]
pub enum VideoError {
    #[error("video {0} not found")]
    NotFound(i64),

    #[error(transparent)]
    Signing(#[from] SigningError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One page of the owner's videos, newest first
///
/// `limit` is clamped to 1..=100 and a negative `offset` reads as 0.
pub async fn list_videos(
    store: &dyn JobStore,
    owner_id: &str,
    query: PageQuery,
) -> Result<VideoPage, VideoError> {
    let limit = query.limit.clamp(1, MAX_PAGE_SIZE);
    let offset = query.offset.max(0);

    let videos = store.list_videos(owner_id, limit, offset).await?;
    let total = store.count_videos(owner_id).await?;

    Ok(VideoPage {
        videos: videos.into_iter().map(VideoSummary::from).collect(),
        pagination: Pagination::new(total, limit, offset),
    })
}

/// Time-limited download URL for one of the owner's videos
pub async fn download_url(
    store: &dyn JobStore,
    signer: &dyn UrlSigner,
    owner_id: &str,
    video_id: i64,
    ttl: Duration,
) -> Result<DownloadUrl, VideoError> {
    let video = store
        .find_video(video_id, owner_id)
        .await?
        .ok_or(VideoError::NotFound(video_id))?;

    let presigned_url = signer.sign(&video.storage_locator, ttl).await?;
    tracing::debug!("Signed download URL for video {}", video.id);

    Ok(DownloadUrl {
        presigned_url,
        expires_in: ttl.as_secs(),
        video_id: video.id,
        title: video.title,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::job::tests::Harness;
    use crate::storage::tests::presigner;
    use reel_core::dto::job::CompletionReport;

    async fn finished_video(h: &Harness, prompt: &str) -> i64 {
        let uuid = h.submit(prompt).await;
        h.orchestrator
            .handle_report(CompletionReport::completed(
                uuid,
                "http://localhost:9000/bucket/videos/a.mp4",
            ))
            .await
            .unwrap();
        h.job(uuid).await.video_id.unwrap()
    }

    #[tokio::test]
    async fn test_listing_clamps_paging() {
        let h = Harness::new(3);
        for i in 0..3 {
            finished_video(&h, &format!("scene {}", i)).await;
        }

        let page = list_videos(
            h.store.as_ref(),
            "alice",
            PageQuery {
                limit: 500,
                offset: -4,
            },
        )
        .await
        .unwrap();
        assert_eq!(page.videos.len(), 3);
        assert_eq!(page.pagination.limit, 100);
        assert_eq!(page.pagination.offset, 0);
        assert!(!page.pagination.has_more);

        let page = list_videos(h.store.as_ref(), "alice", PageQuery { limit: 0, offset: 1 })
            .await
            .unwrap();
        assert_eq!(page.videos.len(), 1);
        assert_eq!(page.pagination.total, 3);
        assert!(page.pagination.has_more);

        let page = list_videos(h.store.as_ref(), "bob", PageQuery { limit: 10, offset: 0 })
            .await
            .unwrap();
        assert!(page.videos.is_empty());
        assert_eq!(page.pagination.total, 0);
    }

    #[tokio::test]
    async fn test_download_url_is_owner_scoped() {
        let h = Harness::new(3);
        let video_id = finished_video(&h, "draw a circle").await;
        let signer = presigner(Some("http://localhost:9000"));
        let ttl = Duration::from_secs(3600);

        let url = download_url(h.store.as_ref(), &signer, "alice", video_id, ttl)
            .await
            .unwrap();
        assert_eq!(url.video_id, video_id);
        assert_eq!(url.expires_in, 3600);
        assert_eq!(url.title, "Video for draw a circle...");
        assert!(
            url.presigned_url
                .starts_with("http://localhost:9000/bucket/videos/a.mp4?")
        );

        let err = download_url(h.store.as_ref(), &signer, "mallory", video_id, ttl)
            .await
            .unwrap_err();
        assert!(matches!(err, VideoError::NotFound(_)));
    }
}
