//! Video DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::video::Video;

/// Summary of a video in a listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoSummary {
    pub id: i64,
    pub job_id: Uuid,
    pub title: String,
    pub associated_code: String,
    pub created_at: DateTime<Utc>,
}

impl From<Video> for VideoSummary {
    fn from(video: Video) -> Self {
        VideoSummary {
            id: video.id,
            job_id: video.job_uuid,
            title: video.title,
            associated_code: video.associated_code,
            created_at: video.created_at,
        }
    }
}

/// Query parameters for video listings
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    10
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            offset: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub has_more: bool,
}

impl Pagination {
    pub fn new(total: i64, limit: i64, offset: i64) -> Self {
        Self {
            total,
            limit,
            offset,
            has_more: offset + limit < total,
        }
    }
}

/// One page of a caller's videos
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoPage {
    pub videos: Vec<VideoSummary>,
    pub pagination: Pagination,
}

/// Time-limited download location for a video
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadUrl {
    pub presigned_url: String,
    pub expires_in: u64,
    pub video_id: i64,
    pub title: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_has_more() {
        assert!(Pagination::new(25, 10, 0).has_more);
        assert!(Pagination::new(25, 10, 10).has_more);
        assert!(!Pagination::new(25, 10, 20).has_more);
        assert!(!Pagination::new(0, 10, 0).has_more);
    }

    #[test]
    fn test_page_query_defaults() {
        let q: PageQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(q.limit, 10);
        assert_eq!(q.offset, 0);
    }

    #[test]
    fn test_pagination_wire_format() {
        let json = serde_json::to_value(Pagination::new(3, 2, 0)).unwrap();
        assert_eq!(json["hasMore"], true);
        assert_eq!(json["total"], 3);
    }
}
