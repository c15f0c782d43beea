//! Render service callbacks

use crate::error::Result;
use crate::{ReelClient, WEBHOOK_KEY_HEADER};
use reel_core::dto::job::{CompletionAck, CompletionReport};

impl ReelClient {
    /// Report the outcome of a render attempt
    ///
    /// # Arguments
    /// * `webhook_key` - Shared secret configured on the orchestrator
    pub async fn report_completion(
        &self,
        webhook_key: &str,
        report: &CompletionReport,
    ) -> Result<CompletionAck> {
        let response = self
            .client
            .post(self.url("/webhooks/job-completion"))
            .header(WEBHOOK_KEY_HEADER, webhook_key)
            .json(report)
            .send()
            .await?;

        self.handle_response(response).await
    }
}
