//! Job Service
//!
//! The job lifecycle: creation, background generation and dispatch
//! attempts, and application of render outcomes with bounded retry.
//!
//! Every attempt runs on the worker pool, never on the request that caused
//! it. All transitions go through conditional store writes keyed by the
//! attempt number, so duplicated or late reports are ignored rather than
//! applied twice.

use reel_core::domain::job::{Job, JobStatus};
use reel_core::domain::render::Backend;
use reel_core::dto::job::{CompletionReport, CreateJob, JobStatusResponse, RenderOutcome};
use reel_core::dto::render::RenderRequest;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::generation::{CodeGenerator, GenerationError, GenerationRequest, retry_prompt};
use crate::render::RenderDispatcher;
use crate::repository::{CompletionOutcome, FailureOutcome, JobStore, NewJob, StoreError};
use crate::service::worker::WorkerPool;

/// Service error type
#[derive(Debug, Error)]
pub enum JobError {
    #[error("{0}")]
    Validation(String),

    #[error("job {0} not found")]
    NotFound(Uuid),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    Unavailable(String),
}

/// Retry and backend policy
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub initial_retry_budget: i32,
    /// Backend for first attempts when the caller does not choose one
    pub preferred_backend: Backend,
    /// Backend for every retry, regardless of the caller's choice
    pub retry_backend: Backend,
    /// Longest a single generation call may take before the attempt fails
    pub generation_timeout: Duration,
}

/// What applying a completion report did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    Completed { video_id: i64 },
    Retrying { attempt: i32, retries_remaining: i32 },
    Failed,
    /// Duplicate, late or superseded report; nothing changed
    Ignored,
}

#[derive(Debug, Clone, Copy)]
enum AttemptKind {
    /// First attempt of a pending job
    Initial,
    /// An attempt already recorded on a processing job (retries, recovery)
    Resume { attempt: i32 },
}

impl AttemptKind {
    fn attempt(&self) -> i32 {
        match self {
            AttemptKind::Initial => 1,
            AttemptKind::Resume { attempt } => *attempt,
        }
    }
}

#[derive(Clone)]
pub struct JobOrchestrator {
    store: Arc<dyn JobStore>,
    generator: Arc<dyn CodeGenerator>,
    dispatcher: Arc<dyn RenderDispatcher>,
    workers: WorkerPool,
    settings: OrchestratorSettings,
}

impl JobOrchestrator {
    pub fn new(
        store: Arc<dyn JobStore>,
        generator: Arc<dyn CodeGenerator>,
        dispatcher: Arc<dyn RenderDispatcher>,
        workers: WorkerPool,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            store,
            generator,
            dispatcher,
            workers,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub fn workers(&self) -> &WorkerPool {
        &self.workers
    }

    /// Create a job and schedule its first attempt
    ///
    /// Returns as soon as the job is stored; generation and dispatch happen
    /// in the background.
    pub async fn submit(&self, owner_id: &str, req: CreateJob) -> Result<Uuid, JobError> {
        let prompt = req.prompt.trim();
        if prompt.is_empty() {
            return Err(JobError::Validation("Prompt is required".to_string()));
        }

        let job = self
            .store
            .create(NewJob {
                owner_id: owner_id.to_string(),
                prompt: prompt.to_string(),
                backend: req.backend,
                config: req.config.unwrap_or_default(),
                retry_budget: self.settings.initial_retry_budget,
            })
            .await?;

        info!("Job created: {} for owner {}", job.uuid, job.owner_id);

        self.schedule(AttemptKind::Initial, job.uuid);
        Ok(job.uuid)
    }

    /// Reschedule jobs that have no attempt running or rendering
    ///
    /// Picks up work left behind by a previous process: jobs that were never
    /// started and attempts that stopped before their code was dispatched.
    /// Must run before any attempt is scheduled in this process.
    pub async fn resume_unfinished(&self) -> Result<usize, JobError> {
        let jobs = self.store.find_undispatched().await?;

        for job in &jobs {
            let kind = match job.status {
                JobStatus::Pending => AttemptKind::Initial,
                _ => AttemptKind::Resume {
                    attempt: job.attempt,
                },
            };
            debug!("Resuming job {} ({:?})", job.uuid, kind);
            self.schedule(kind, job.uuid);
        }

        Ok(jobs.len())
    }

    /// Status of a job as seen by its owner
    pub async fn status(&self, owner_id: &str, uuid: Uuid) -> Result<JobStatusResponse, JobError> {
        let job = self
            .store
            .find_for_owner(uuid, owner_id)
            .await?
            .ok_or(JobError::NotFound(uuid))?;

        let video = match job.video_id {
            Some(video_id) if job.status == JobStatus::Completed => {
                self.store.find_video(video_id, owner_id).await?
            }
            _ => None,
        };

        Ok(JobStatusResponse::new(&job, video.as_ref()))
    }

    /// Apply a render outcome reported for a job
    ///
    /// Reports are safe to deliver more than once: anything that does not
    /// match the job's current, dispatched attempt is ignored.
    pub async fn handle_report(&self, report: CompletionReport) -> Result<ReportOutcome, JobError> {
        let uuid = report.job_uuid;
        let job = self
            .store
            .find_by_uuid(uuid)
            .await?
            .ok_or(JobError::NotFound(uuid))?;

        if job.status != JobStatus::Processing || !job.render_pending {
            debug!(
                "Ignoring report for job {} in state {} (render pending: {})",
                uuid, job.status, job.render_pending
            );
            return Ok(ReportOutcome::Ignored);
        }
        if let Some(attempt) = report.attempt.filter(|a| *a != job.attempt) {
            debug!(
                "Ignoring report for job {} attempt {} (current attempt {})",
                uuid, attempt, job.attempt
            );
            return Ok(ReportOutcome::Ignored);
        }

        match report.outcome() {
            RenderOutcome::Completed { locator } => {
                match self
                    .store
                    .complete_with_video(uuid, job.attempt, &locator)
                    .await?
                {
                    CompletionOutcome::Completed { job, video } => {
                        info!(
                            "Job {} completed on attempt {} with video {}",
                            job.uuid, job.attempt, video.id
                        );
                        Ok(ReportOutcome::Completed { video_id: video.id })
                    }
                    CompletionOutcome::Ignored => Ok(ReportOutcome::Ignored),
                }
            }
            RenderOutcome::Failed { reason } => {
                warn!(
                    "Render failed for job {} attempt {}: {}",
                    uuid, job.attempt, reason
                );
                self.settle_failure(&job, &reason).await
            }
        }
    }

    /// Charge a render failure to the job's retry budget and retry or give up
    async fn settle_failure(&self, job: &Job, reason: &str) -> Result<ReportOutcome, JobError> {
        let prompt = retry_prompt(&job.original_prompt, job.generated_code.as_deref(), reason);

        match self
            .store
            .record_render_failure(job.uuid, job.attempt, reason, &prompt)
            .await?
        {
            FailureOutcome::Retry(job) => {
                info!(
                    "Retrying job {} (attempt {}, {} retries left)",
                    job.uuid, job.attempt, job.retries_remaining
                );
                self.schedule(
                    AttemptKind::Resume {
                        attempt: job.attempt,
                    },
                    job.uuid,
                );
                Ok(ReportOutcome::Retrying {
                    attempt: job.attempt,
                    retries_remaining: job.retries_remaining,
                })
            }
            FailureOutcome::Exhausted(job) => {
                warn!("Job {} permanently failed: {}", job.uuid, reason);
                Ok(ReportOutcome::Failed)
            }
            FailureOutcome::Ignored => Ok(ReportOutcome::Ignored),
        }
    }

    /// Hand an attempt to the worker pool
    ///
    /// The attempt runs in its own task; an error or a panic is written
    /// back to the job instead of escaping the pool.
    fn schedule(&self, kind: AttemptKind, uuid: Uuid) {
        let this = self.clone();

        self.workers.spawn(async move {
            let attempt = tokio::spawn(this.clone().run_attempt(kind, uuid));

            let message = match attempt.await {
                Ok(Ok(())) => return,
                Ok(Err(e)) => {
                    error!("Attempt for job {} failed: {}", uuid, e);
                    format!("Processing failed: {}", e)
                }
                Err(e) => {
                    error!("Attempt task for job {} panicked: {}", uuid, e);
                    "Worker crashed while processing the job".to_string()
                }
            };
            this.abandon(uuid, kind.attempt(), &message).await;
        });
    }

    /// Settle an attempt that ended in an error or a panic
    ///
    /// Before dispatch the job fails outright. Once its code is recorded the
    /// attempt counts as a failed dispatch and goes through the retry budget;
    /// if even that cannot be written the job is failed.
    async fn abandon(&self, uuid: Uuid, attempt: i32, message: &str) {
        let job = match self.store.find_by_uuid(uuid).await {
            Ok(Some(job)) => job,
            Ok(None) => return,
            Err(e) => {
                error!("Failed to load job {} after a crashed attempt: {}", uuid, e);
                return;
            }
        };

        if job.status != JobStatus::Processing || job.attempt != attempt {
            // A pending job is picked up again by `resume_unfinished`
            debug!(
                "Not abandoning job {} attempt {} (state {}, attempt {})",
                uuid, attempt, job.status, job.attempt
            );
            return;
        }

        if !job.render_pending {
            if let Err(e) = self.store.fail_attempt(uuid, attempt, message).await {
                error!("Failed to record failure for job {}: {}", uuid, e);
            }
            return;
        }

        if let Err(e) = self.settle_failure(&job, message).await {
            error!("Failed to settle crashed attempt of job {}: {}", uuid, e);
            match self.store.abort_attempt(uuid, attempt, message).await {
                Ok(_) => warn!("Job {} failed after attempt {} crashed", uuid, attempt),
                Err(e) => error!("Failed to record failure for job {}: {}", uuid, e),
            }
        }
    }

    async fn run_attempt(self, kind: AttemptKind, uuid: Uuid) -> Result<(), JobError> {
        let job = match kind {
            AttemptKind::Initial => match self.store.start_processing(uuid).await? {
                Some(job) => job,
                None => {
                    debug!("Job {} already started", uuid);
                    return Ok(());
                }
            },
            AttemptKind::Resume { attempt } => match self.store.find_by_uuid(uuid).await? {
                Some(job)
                    if job.status == JobStatus::Processing
                        && job.attempt == attempt
                        && !job.render_pending =>
                {
                    job
                }
                _ => {
                    debug!("Attempt {} of job {} is no longer current", attempt, uuid);
                    return Ok(());
                }
            },
        };

        let backend = if job.attempt > 1 {
            self.settings.retry_backend
        } else {
            job.backend.unwrap_or(self.settings.preferred_backend)
        };

        debug!(
            "Generating code for job {} attempt {} with {}",
            uuid, job.attempt, backend
        );

        let request = GenerationRequest {
            prompt: job.prompt.clone(),
            backend: Some(backend),
            config: job.config.clone(),
        };
        let timeout = self.settings.generation_timeout;
        let generated = time::timeout(timeout, self.generator.generate(&request))
            .await
            .unwrap_or(Err(GenerationError::TimedOut(timeout)));
        let generated = match generated {
            Ok(generated) => generated,
            Err(e) => {
                warn!("Generation failed for job {}: {}", uuid, e);
                self.store
                    .fail_attempt(uuid, job.attempt, &e.to_string())
                    .await?;
                return Ok(());
            }
        };

        if !self
            .store
            .record_generated_code(uuid, job.attempt, &generated.code)
            .await?
        {
            debug!("Job {} attempt {} superseded before dispatch", uuid, job.attempt);
            return Ok(());
        }

        let render = RenderRequest {
            job_uuid: uuid,
            attempt: job.attempt,
            code: generated.code,
            config: job.config.clone(),
        };

        let reason = match self.dispatcher.dispatch(&render).await {
            Ok(ack) if ack.accepted => {
                info!(
                    "Job {} attempt {} queued for rendering (position {:?}, ~{}s render)",
                    uuid, job.attempt, ack.queue_position, generated.estimated_render_time
                );
                return Ok(());
            }
            Ok(ack) => ack
                .rejection_reason
                .unwrap_or_else(|| "Video generation failed".to_string()),
            Err(e) => e.to_string(),
        };

        warn!("Dispatch failed for job {} attempt {}: {}", uuid, job.attempt, reason);

        let dispatched = Job {
            generated_code: Some(render.code),
            render_pending: true,
            ..job
        };
        self.settle_failure(&dispatched, &reason).await?;
        Ok(())
    }
}
