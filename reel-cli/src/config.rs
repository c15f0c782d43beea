//! Configuration module
//!
//! Handles CLI configuration: where the orchestrator lives and who is asking.

use anyhow::{Result, bail};
use reel_client::ReelClient;

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// URL of the orchestrator service
    pub orchestrator_url: String,

    /// Identity sent with every user-scoped request
    pub user_id: Option<String>,
}

impl Config {
    /// Client acting as the configured user
    pub fn client(&self) -> Result<ReelClient> {
        let Some(user_id) = self.user_id.as_deref().filter(|u| !u.trim().is_empty()) else {
            bail!("No user set; pass --user or set REEL_USER");
        };
        Ok(ReelClient::new(&self.orchestrator_url).with_user(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_requires_user() {
        let config = Config {
            orchestrator_url: "http://localhost:3000".to_string(),
            user_id: None,
        };
        assert!(config.client().is_err());

        let config = Config {
            user_id: Some("alice".to_string()),
            ..config
        };
        let client = config.client().unwrap();
        assert_eq!(client.user_id(), Some("alice"));
    }
}
