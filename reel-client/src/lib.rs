//! Reel HTTP Client
//!
//! A typed HTTP client for the Reel orchestrator API, used by the CLI and
//! by render services reporting outcomes back.
//!
//! # Example
//!
//! ```no_run
//! use reel_client::ReelClient;
//! use reel_core::dto::job::CreateJob;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = ReelClient::new("http://localhost:3000").with_user("alice");
//!
//!     let job_uuid = client.submit_job(&CreateJob {
//!         prompt: "draw a circle turning into a square".to_string(),
//!         backend: None,
//!         config: None,
//!     }).await?;
//!
//!     println!("Submitted job: {}", job_uuid);
//!     Ok(())
//! }
//! ```

pub mod error;
mod jobs;
mod videos;
mod webhooks;

// Re-export commonly used types
pub use error::{ClientError, Result};

use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;

const USER_HEADER: &str = "X-User-Id";
const WEBHOOK_KEY_HEADER: &str = "X-Webhook-Key";

/// HTTP client for the Reel orchestrator API
///
/// Methods are grouped by concern:
/// - Jobs (submit, status, wait)
/// - Videos (list, download URL)
/// - Render callbacks (completion reports)
#[derive(Debug, Clone)]
pub struct ReelClient {
    /// Base URL of the orchestrator (e.g., "http://localhost:3000")
    base_url: String,
    /// Identity sent as `X-User-Id`
    user_id: Option<String>,
    /// HTTP client instance
    client: Client,
}

impl ReelClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the orchestrator API (e.g., "http://localhost:3000")
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            user_id: None,
            client,
        }
    }

    /// Act on behalf of a user
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Get the base URL of the orchestrator
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Attach the caller identity, failing early when none is set
    fn as_user(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let user_id = self.user_id.as_deref().ok_or_else(|| {
            ClientError::InvalidRequest("a user id is required for this call".to_string())
        })?;
        Ok(request.header(USER_HEADER, user_id))
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Check the status code and deserialize the JSON body
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(
                status.as_u16(),
                error_message(&error_text),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// The `error` field of a JSON error body, or the raw text
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_else(|_| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = ReelClient::new("http://localhost:3000");
        assert_eq!(client.base_url(), "http://localhost:3000");
        assert_eq!(client.user_id(), None);
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = ReelClient::new("http://localhost:3000/");
        assert_eq!(client.base_url(), "http://localhost:3000");
        assert_eq!(client.url("/api/videos"), "http://localhost:3000/api/videos");
    }

    #[test]
    fn test_client_with_user() {
        let client = ReelClient::with_client("http://localhost:3000", Client::new()).with_user("alice");
        assert_eq!(client.user_id(), Some("alice"));
    }

    #[test]
    fn test_user_required_for_user_calls() {
        let client = ReelClient::new("http://localhost:3000");
        let err = client
            .as_user(client.client.get(client.url("/api/videos")))
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidRequest(_)));
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(error_message(r#"{"error":"Job x not found"}"#), "Job x not found");
        assert_eq!(error_message("Bad Gateway"), "Bad Gateway");
    }
}
