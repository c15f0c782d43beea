//! Caller identification
//!
//! Users are identified by the `X-User-Id` header set by the fronting
//! gateway; the render service authenticates with a shared key in
//! `X-Webhook-Key`.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use subtle::ConstantTimeEq;

use crate::api::AppState;
use crate::api::error::ApiError;

pub const USER_HEADER: &str = "x-user-id";
pub const WEBHOOK_KEY_HEADER: &str = "x-webhook-key";

/// Identity of the user making a request
#[derive(Debug, Clone)]
pub struct Caller(pub String);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| Caller(id.to_string()))
            .ok_or_else(|| ApiError::Unauthorized("User not authenticated".to_string()))
    }
}

/// Proof that a request carries the render service's shared key
#[derive(Debug, Clone, Copy)]
pub struct WebhookAuth;

impl FromRequestParts<AppState> for WebhookAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let provided = parts
            .headers
            .get(WEBHOOK_KEY_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Missing webhook key".to_string()))?;

        let Some(expected) = state.webhook_key.as_deref() else {
            return Err(ApiError::InternalError(
                "Webhook authentication not configured".to_string(),
            ));
        };

        if keys_match(provided, expected) {
            Ok(WebhookAuth)
        } else {
            tracing::warn!("Rejected webhook call with an invalid key");
            Err(ApiError::Unauthorized("Invalid webhook key".to_string()))
        }
    }
}

fn keys_match(provided: &str, expected: &str) -> bool {
    provided.as_bytes().ct_eq(expected.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_match() {
        assert!(keys_match("s3cret", "s3cret"));
        assert!(!keys_match("s3cret", "s3creT"));
        assert!(!keys_match("s3c", "s3cret"));
        assert!(!keys_match("", "s3cret"));
    }
}
