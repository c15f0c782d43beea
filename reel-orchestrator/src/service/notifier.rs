//! Completion Notifier
//!
//! Inbox between the render service's callbacks and the orchestrator.
//! Reports are applied in arrival order by a single consumer task, and the
//! sender waits for the result so a report that could not be applied is
//! never acknowledged.

use reel_core::dto::job::CompletionReport;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::service::job::{JobError, JobOrchestrator, ReportOutcome};

const INBOX_CAPACITY: usize = 1024;

/// A report waiting in the inbox together with the channel for its result
pub struct QueuedReport {
    report: CompletionReport,
    reply: oneshot::Sender<Result<ReportOutcome, JobError>>,
}

#[derive(Clone)]
pub struct CompletionNotifier {
    sender: mpsc::Sender<QueuedReport>,
}

impl CompletionNotifier {
    /// Creates the notifier and the receiving end of its inbox
    pub fn new() -> (Self, mpsc::Receiver<QueuedReport>) {
        let (sender, receiver) = mpsc::channel(INBOX_CAPACITY);
        (Self { sender }, receiver)
    }

    /// Queues a report and waits until the consumer has applied it
    ///
    /// Errors from applying the report (unknown job, store failure) come
    /// back to the caller so the report can be delivered again. Duplicates
    /// are harmless.
    pub async fn notify(&self, report: CompletionReport) -> Result<ReportOutcome, JobError> {
        let uuid = report.job_uuid;
        debug!("Queued {} report for job {}", report.status, uuid);

        let (reply, outcome) = oneshot::channel();
        if self
            .sender
            .send(QueuedReport { report, reply })
            .await
            .is_err()
        {
            error!("Completion inbox closed, refusing report for job {}", uuid);
            return Err(JobError::Unavailable(
                "Completion inbox is closed".to_string(),
            ));
        }

        outcome.await.unwrap_or_else(|_| {
            Err(JobError::Unavailable(format!(
                "Report for job {} was dropped before it was applied",
                uuid
            )))
        })
    }
}

/// Spawns the task that applies queued reports
pub fn spawn_consumer(
    orchestrator: JobOrchestrator,
    mut receiver: mpsc::Receiver<QueuedReport>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(QueuedReport { report, reply }) = receiver.recv().await {
            let uuid = report.job_uuid;
            let result = orchestrator.handle_report(report).await;
            match &result {
                Ok(outcome) => debug!("Report for job {} applied: {:?}", uuid, outcome),
                Err(e) => error!("Failed to apply report for job {}: {}", uuid, e),
            }
            // The sender may have given up waiting
            let _ = reply.send(result);
        }
        info!("Completion inbox closed");
    })
}
