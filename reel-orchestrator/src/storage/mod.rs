//! Artifact download URLs
//!
//! Videos are stored by locator, never by a fetchable URL. A download URL
//! is minted on demand: the object key is taken from the locator and a
//! SigV4 presigned `GetObject` request is built for it.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum SigningError {
    #[error("invalid storage locator '{0}'")]
    InvalidLocator(String),

    #[error("invalid url lifetime: {0}")]
    InvalidTtl(String),

    #[error("failed to presign download: {0}")]
    Presign(String),
}

/// Mints time-limited download URLs for stored artifacts
#[async_trait]
pub trait UrlSigner: Send + Sync {
    async fn sign(&self, locator: &str, ttl: Duration) -> Result<String, SigningError>;
}

/// Bucket and credentials of the artifact store
#[derive(Debug, Clone)]
pub struct S3Settings {
    pub bucket: String,
    pub region: String,
    /// S3-compatible endpoint such as MinIO; `None` addresses AWS itself
    pub endpoint_url: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// Presigns `GetObject` requests against S3 or an S3-compatible store
pub struct S3Presigner {
    client: Client,
    bucket: String,
    /// Locators carry the bucket as their first path segment
    path_style: bool,
}

impl S3Presigner {
    /// A custom endpoint switches to path-style addressing, which is what
    /// MinIO serves and what its locators look like.
    pub fn new(settings: S3Settings) -> Self {
        let credentials = Credentials::new(
            settings.access_key_id,
            settings.secret_access_key,
            None,
            None,
            "reel-config",
        );

        let mut config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(settings.region))
            .credentials_provider(credentials);

        let path_style = settings.endpoint_url.is_some();
        if let Some(endpoint) = settings.endpoint_url {
            config = config.endpoint_url(endpoint).force_path_style(true);
        }

        Self {
            client: Client::from_conf(config.build()),
            bucket: settings.bucket,
            path_style,
        }
    }

    /// Object key addressed by a locator
    ///
    /// Accepts `s3://bucket/key`, full http(s) URLs and bare keys.
    pub fn object_key(&self, locator: &str) -> Result<String, SigningError> {
        let invalid = || SigningError::InvalidLocator(locator.to_string());
        let locator = locator.trim();

        let key = match Url::parse(locator) {
            Ok(url) if url.scheme() == "s3" => url.path().trim_start_matches('/').to_string(),
            Ok(url) if matches!(url.scheme(), "http" | "https") => {
                let segments: Vec<&str> = url
                    .path_segments()
                    .map(|segments| segments.filter(|s| !s.is_empty()).collect())
                    .unwrap_or_default();
                let skip = usize::from(self.path_style);
                segments.get(skip..).map(|rest| rest.join("/")).unwrap_or_default()
            }
            Ok(_) => return Err(invalid()),
            Err(_) => locator.trim_start_matches('/').to_string(),
        };

        if key.is_empty() || key.split('/').any(|segment| segment == "..") {
            return Err(invalid());
        }
        Ok(key)
    }
}

#[async_trait]
impl UrlSigner for S3Presigner {
    async fn sign(&self, locator: &str, ttl: Duration) -> Result<String, SigningError> {
        let key = self.object_key(locator)?;
        let presigning =
            PresigningConfig::expires_in(ttl).map_err(|e| SigningError::InvalidTtl(e.to_string()))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .presigned(presigning)
            .await
            .map_err(|e| SigningError::Presign(DisplayErrorContext(&e).to_string()))?;

        Ok(request.uri().to_string())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn presigner(endpoint: Option<&str>) -> S3Presigner {
        S3Presigner::new(S3Settings {
            bucket: "bucket".to_string(),
            region: "us-east-1".to_string(),
            endpoint_url: endpoint.map(str::to_string),
            access_key_id: "AKIDEXAMPLE".to_string(),
            secret_access_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".to_string(),
        })
    }

    fn query(url: &Url, name: &str) -> Option<String> {
        url.query_pairs()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value.into_owned())
    }

    #[test]
    fn test_path_style_drops_bucket() {
        let key = presigner(Some("http://localhost:9000"))
            .object_key("http://localhost:9000/videos-bucket/videos/abc.mp4")
            .unwrap();
        assert_eq!(key, "videos/abc.mp4");
    }

    #[test]
    fn test_virtual_host_keeps_full_path() {
        let key = presigner(None)
            .object_key("https://bucket.s3.us-east-1.amazonaws.com/videos/abc.mp4")
            .unwrap();
        assert_eq!(key, "videos/abc.mp4");
    }

    #[test]
    fn test_s3_and_bare_locators() {
        let signer = presigner(Some("http://localhost:9000"));
        assert_eq!(signer.object_key("s3://bucket/videos/a.mp4").unwrap(), "videos/a.mp4");
        assert_eq!(signer.object_key("videos/a.mp4").unwrap(), "videos/a.mp4");
    }

    #[test]
    fn test_unusable_locators_are_refused() {
        let signer = presigner(Some("http://localhost:9000"));
        for locator in ["", "http://localhost:9000/bucket", "ftp://host/a.mp4", "../etc/passwd"] {
            assert!(
                matches!(signer.object_key(locator), Err(SigningError::InvalidLocator(_))),
                "accepted: {}",
                locator
            );
        }
    }

    #[tokio::test]
    async fn test_minio_url_is_presigned() {
        let url = presigner(Some("http://localhost:9000"))
            .sign("http://localhost:9000/bucket/videos/a.mp4", Duration::from_secs(3600))
            .await
            .unwrap();
        let url = Url::parse(&url).unwrap();

        assert_eq!(url.host_str(), Some("localhost"));
        assert_eq!(url.port(), Some(9000));
        assert_eq!(url.path(), "/bucket/videos/a.mp4");
        assert_eq!(query(&url, "X-Amz-Algorithm").as_deref(), Some("AWS4-HMAC-SHA256"));
        assert_eq!(query(&url, "X-Amz-Expires").as_deref(), Some("3600"));
        assert!(query(&url, "X-Amz-Credential").unwrap().starts_with("AKIDEXAMPLE/"));
        assert!(query(&url, "X-Amz-Signature").is_some_and(|s| !s.is_empty()));
        assert!(!url.as_str().contains("wJalrXUtnFEMI"));
    }

    #[tokio::test]
    async fn test_aws_url_uses_virtual_host() {
        let url = presigner(None)
            .sign("s3://bucket/videos/a.mp4", Duration::from_secs(600))
            .await
            .unwrap();
        let url = Url::parse(&url).unwrap();

        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host_str(), Some("bucket.s3.us-east-1.amazonaws.com"));
        assert_eq!(url.path(), "/videos/a.mp4");
        assert_eq!(query(&url, "X-Amz-Expires").as_deref(), Some("600"));
    }

    #[tokio::test]
    async fn test_lifetime_over_a_week_is_refused() {
        let err = presigner(None)
            .sign("videos/a.mp4", Duration::from_secs(8 * 24 * 3600))
            .await
            .unwrap_err();
        assert!(matches!(err, SigningError::InvalidTtl(_)));
    }
}
