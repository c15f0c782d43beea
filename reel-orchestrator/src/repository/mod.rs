//! Repository Module
//!
//! The job store: durable record of jobs and videos, and the single source
//! of truth every other component reads and writes.
//!
//! All state transitions are expressed as conditional writes so that a
//! racing or duplicated report can never apply twice. The store is
//! trait-based so the orchestrator runs unchanged on PostgreSQL or in memory.

mod memory;
mod postgres;

pub use memory::InMemoryJobStore;
pub use postgres::PgJobStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reel_core::domain::job::Job;
use reel_core::domain::render::{Backend, RenderConfig};
use reel_core::domain::video::Video;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised by a job store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Fields supplied when a job is created
#[derive(Debug, Clone)]
pub struct NewJob {
    pub owner_id: String,
    pub prompt: String,
    pub backend: Option<Backend>,
    pub config: RenderConfig,
    pub retry_budget: i32,
}

/// Result of applying a render failure to a job
#[derive(Debug, Clone)]
pub enum FailureOutcome {
    /// Budget left: the job moved on to a new attempt (carried in `job.attempt`)
    Retry(Job),
    /// Budget spent: the job is now `Failed`
    Exhausted(Job),
    /// The attempt was already settled or superseded; nothing changed
    Ignored,
}

/// Result of applying a render success to a job
#[derive(Debug, Clone)]
pub enum CompletionOutcome {
    Completed { job: Job, video: Video },
    Ignored,
}

/// A dispatched attempt still waiting for its render outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRender {
    pub job_uuid: Uuid,
    pub attempt: i32,
    pub dispatched_at: DateTime<Utc>,
}

/// Durable job and video storage with per-job atomic transitions
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Creates a job in `Pending` with a fresh UUID
    async fn create(&self, new: NewJob) -> Result<Job>;

    /// Looks a job up without owner scoping (callbacks and workers only)
    async fn find_by_uuid(&self, uuid: Uuid) -> Result<Option<Job>>;

    /// Looks a job up on behalf of its owner. A job owned by someone else
    /// is indistinguishable from a missing one.
    async fn find_for_owner(&self, uuid: Uuid, owner_id: &str) -> Result<Option<Job>>;

    /// `Pending -> Processing`, starting attempt 1.
    /// Returns `None` when the job was not pending.
    async fn start_processing(&self, uuid: Uuid) -> Result<Option<Job>>;

    /// Stores the code generated for `attempt` and marks the attempt as
    /// awaiting its render outcome. Returns `false` when the attempt is no
    /// longer current.
    async fn record_generated_code(&self, uuid: Uuid, attempt: i32, code: &str) -> Result<bool>;

    /// Fails the job outright for an attempt that never reached the render
    /// service (generation failure, worker crash). Budget is not touched.
    async fn fail_attempt(&self, uuid: Uuid, attempt: i32, message: &str) -> Result<bool>;

    /// Fails the job for `attempt` whether or not its code was handed to the
    /// render service. Last resort for an attempt that crashed and could not
    /// be settled; budget is not touched.
    async fn abort_attempt(&self, uuid: Uuid, attempt: i32, message: &str) -> Result<bool>;

    /// Applies a render failure for `attempt`: consumes one unit of retry
    /// budget, then either starts the next attempt with `retry_prompt` or
    /// fails the job.
    async fn record_render_failure(
        &self,
        uuid: Uuid,
        attempt: i32,
        reason: &str,
        retry_prompt: &str,
    ) -> Result<FailureOutcome>;

    /// Marks the job `Completed` and creates its video in one atomic unit
    async fn complete_with_video(
        &self,
        uuid: Uuid,
        attempt: i32,
        locator: &str,
    ) -> Result<CompletionOutcome>;

    /// Attempts dispatched before `cutoff` that still await an outcome
    async fn find_pending_renders(&self, cutoff: DateTime<Utc>) -> Result<Vec<PendingRender>>;

    /// Jobs with no attempt at the render service: pending, or processing
    /// with no generated code recorded yet. Oldest first.
    async fn find_undispatched(&self) -> Result<Vec<Job>>;

    async fn find_video(&self, video_id: i64, owner_id: &str) -> Result<Option<Video>>;

    /// Owner's videos, newest first
    async fn list_videos(&self, owner_id: &str, limit: i64, offset: i64) -> Result<Vec<Video>>;

    async fn count_videos(&self, owner_id: &str) -> Result<i64>;
}
