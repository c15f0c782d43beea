//! Stale render sweeper
//!
//! Optional watchdog for renders that never report back. A timed-out
//! attempt is fed into the completion inbox as an ordinary failure report,
//! so it goes through the same idempotent path and spends retry budget.
//!
//! Only dispatched attempts are swept. Generation is bounded by its own
//! timeout, and attempts interrupted by a restart are picked up by
//! `JobOrchestrator::resume_unfinished`.

use chrono::Utc;
use reel_core::dto::job::CompletionReport;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::repository::JobStore;
use crate::service::job::JobError;
use crate::service::notifier::CompletionNotifier;

/// Reports every attempt dispatched longer than `timeout` ago that has no
/// outcome yet. Returns the number of reports posted.
pub async fn sweep_once(
    store: &dyn JobStore,
    notifier: &CompletionNotifier,
    timeout: Duration,
) -> Result<usize, JobError> {
    let timeout_secs = timeout.as_secs();
    let cutoff = Utc::now() - chrono::Duration::seconds(timeout_secs as i64);
    let stale = store.find_pending_renders(cutoff).await?;

    let mut posted = 0;
    for pending in stale {
        warn!(
            "Job {} attempt {} has not reported back since {}",
            pending.job_uuid, pending.attempt, pending.dispatched_at
        );
        let report = CompletionReport::failed(
            pending.job_uuid,
            format!("render timed out after {}s", timeout_secs),
        )
        .for_attempt(pending.attempt);

        match notifier.notify(report).await {
            Ok(outcome) => {
                debug!("Stale job {} settled: {:?}", pending.job_uuid, outcome);
                posted += 1;
            }
            Err(e) => error!("Failed to report stale job {}: {}", pending.job_uuid, e),
        }
    }
    Ok(posted)
}

/// Runs `sweep_once` every `interval` until the task is aborted
pub fn spawn_sweeper(
    store: Arc<dyn JobStore>,
    notifier: CompletionNotifier,
    timeout: Duration,
    interval: Duration,
) -> JoinHandle<()> {
    info!(
        "Starting stale render sweeper (timeout: {:?}, interval: {:?})",
        timeout, interval
    );

    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        loop {
            ticker.tick().await;
            debug!("Sweeping for stale renders");

            match sweep_once(store.as_ref(), &notifier, timeout).await {
                Ok(0) => {}
                Ok(posted) => info!("Timed out {} stale render(s)", posted),
                Err(e) => error!("Error during sweep: {}", e),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::job::tests::Harness;
    use crate::service::notifier::spawn_consumer;
    use reel_core::domain::job::JobStatus;

    #[tokio::test]
    async fn test_fresh_renders_are_left_alone() {
        let h = Harness::new(3);
        h.submit("draw a circle").await;
        let (notifier, _receiver) = CompletionNotifier::new();

        let posted = sweep_once(h.store.as_ref(), &notifier, Duration::from_secs(600))
            .await
            .unwrap();
        assert_eq!(posted, 0);
    }

    #[tokio::test]
    async fn test_stale_render_spends_budget() {
        let h = Harness::new(3);
        let uuid = h.submit("draw a circle").await;
        let (notifier, receiver) = CompletionNotifier::new();
        let consumer = spawn_consumer(h.orchestrator.clone(), receiver);

        let posted = sweep_once(h.store.as_ref(), &notifier, Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(posted, 1);

        drop(notifier);
        consumer.await.unwrap();
        h.settle().await;

        let job = h.job(uuid).await;
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.attempt, 2);
        assert_eq!(job.retries_remaining, 2);
        let requests = h.generator.requests.lock().unwrap();
        assert!(requests[1].prompt.contains("render timed out after 0s"));
    }
}
