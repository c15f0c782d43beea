//! Job-related API endpoints

use crate::ReelClient;
use crate::error::{ClientError, Result};
use reel_core::dto::job::{CreateJob, CreateJobResponse, JobStatusResponse};
use std::time::{Duration, Instant};
use uuid::Uuid;

impl ReelClient {
    /// Submit a prompt for animation
    ///
    /// # Returns
    /// The job UUID; poll `job_status` for progress
    pub async fn submit_job(&self, req: &CreateJob) -> Result<Uuid> {
        let request = self.as_user(self.client.post(self.url("/api/generate")))?;
        let response = request.json(req).send().await?;

        let created: CreateJobResponse = self.handle_response(response).await?;
        Ok(created.job_uuid)
    }

    /// Get the status of one of the caller's jobs
    pub async fn job_status(&self, job_uuid: Uuid) -> Result<JobStatusResponse> {
        let url = self.url(&format!("/api/status/{}", job_uuid));
        let response = self.as_user(self.client.get(&url))?.send().await?;

        self.handle_response(response).await
    }

    /// Poll a job until it completes or fails
    ///
    /// # Arguments
    /// * `interval` - Delay between polls
    /// * `timeout` - Give up after this long; `None` waits indefinitely
    pub async fn wait_for_job(
        &self,
        job_uuid: Uuid,
        interval: Duration,
        timeout: Option<Duration>,
    ) -> Result<JobStatusResponse> {
        let started = Instant::now();

        loop {
            let status = self.job_status(job_uuid).await?;
            if status.status.is_terminal() {
                return Ok(status);
            }

            if let Some(timeout) = timeout.filter(|t| started.elapsed() >= *t) {
                return Err(ClientError::Timeout(format!(
                    "job {} still {} after {:?}",
                    job_uuid, status.status, timeout
                )));
            }

            tracing::debug!("Job {} is {}, polling again", job_uuid, status.status);
            tokio::time::sleep(interval).await;
        }
    }
}
