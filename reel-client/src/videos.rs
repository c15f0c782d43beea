//! Video-related API endpoints

use crate::ReelClient;
use crate::error::Result;
use reel_core::dto::video::{DownloadUrl, PageQuery, VideoPage};

impl ReelClient {
    /// List the caller's videos, newest first
    pub async fn list_videos(&self, page: PageQuery) -> Result<VideoPage> {
        let request = self.as_user(self.client.get(self.url("/api/videos")))?;
        let response = request
            .query(&[("limit", page.limit), ("offset", page.offset)])
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Get a signed, time-limited download URL for a video
    pub async fn download_url(&self, video_id: i64) -> Result<DownloadUrl> {
        let url = self.url(&format!("/api/video/{}/download", video_id));
        let response = self.as_user(self.client.get(&url))?.send().await?;

        self.handle_response(response).await
    }
}
