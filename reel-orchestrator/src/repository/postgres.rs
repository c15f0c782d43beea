//! PostgreSQL job store
//!
//! Every transition is a single conditional `UPDATE ... RETURNING`, so the
//! row lock taken by PostgreSQL serializes concurrent reports for the same
//! job. Completion runs the job update, video insert and link in one
//! transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reel_core::domain::job::{Job, JobStatus};
use reel_core::domain::render::{Backend, RenderConfig};
use reel_core::domain::video::{Video, video_title};
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    CompletionOutcome, FailureOutcome, JobStore, NewJob, PendingRender, Result, StoreError,
};

const JOB_COLUMNS: &str = "id, job_uuid, owner_id, original_prompt, prompt, status, backend, \
     config, generated_code, retries_remaining, attempt, render_pending, error_message, \
     created_at, dispatched_at, completed_at, video_id";

const VIDEO_COLUMNS: &str =
    "id, owner_id, job_uuid, title, associated_code, storage_locator, created_at";

/// Job store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create(&self, new: NewJob) -> Result<Job> {
        let config = serde_json::to_value(&new.config)
            .map_err(|e| StoreError::Corrupt(format!("unserializable config: {}", e)))?;

        let row = sqlx::query_as::<_, JobRow>(&format!(
            r#"
            INSERT INTO jobs (job_uuid, owner_id, original_prompt, prompt, status, backend,
                              config, retries_remaining, created_at)
            VALUES ($1, $2, $3, $3, $4, $5, $6, $7, $8)
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&new.owner_id)
        .bind(&new.prompt)
        .bind(JobStatus::Pending.as_str())
        .bind(new.backend.map(|b| b.as_str()))
        .bind(config)
        .bind(new.retry_budget)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn find_by_uuid(&self, uuid: Uuid) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE job_uuid = $1"
        ))
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Job::try_from).transpose()
    }

    async fn find_for_owner(&self, uuid: Uuid, owner_id: &str) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE job_uuid = $1 AND owner_id = $2"
        ))
        .bind(uuid)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Job::try_from).transpose()
    }

    async fn start_processing(&self, uuid: Uuid) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            r#"
            UPDATE jobs
            SET status = 'PROCESSING', attempt = 1
            WHERE job_uuid = $1 AND status = 'PENDING'
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Job::try_from).transpose()
    }

    async fn record_generated_code(&self, uuid: Uuid, attempt: i32, code: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET generated_code = $3, render_pending = TRUE, dispatched_at = $4
            WHERE job_uuid = $1 AND status = 'PROCESSING' AND attempt = $2
              AND NOT render_pending
            "#,
        )
        .bind(uuid)
        .bind(attempt)
        .bind(code)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn fail_attempt(&self, uuid: Uuid, attempt: i32, message: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'FAILED', error_message = $3
            WHERE job_uuid = $1 AND status = 'PROCESSING' AND attempt = $2
              AND NOT render_pending
            "#,
        )
        .bind(uuid)
        .bind(attempt)
        .bind(message)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn abort_attempt(&self, uuid: Uuid, attempt: i32, message: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'FAILED', render_pending = FALSE, error_message = $3
            WHERE job_uuid = $1 AND status = 'PROCESSING' AND attempt = $2
            "#,
        )
        .bind(uuid)
        .bind(attempt)
        .bind(message)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn record_render_failure(
        &self,
        uuid: Uuid,
        attempt: i32,
        reason: &str,
        retry_prompt: &str,
    ) -> Result<FailureOutcome> {
        // Right-hand sides see the pre-update row, so `retries_remaining - 1`
        // is the post-decrement budget in every CASE.
        let row = sqlx::query_as::<_, JobRow>(&format!(
            r#"
            UPDATE jobs
            SET retries_remaining = retries_remaining - 1,
                render_pending = FALSE,
                error_message = $3,
                attempt = CASE WHEN retries_remaining - 1 > 0 THEN attempt + 1 ELSE attempt END,
                prompt = CASE WHEN retries_remaining - 1 > 0 THEN $4 ELSE prompt END,
                status = CASE WHEN retries_remaining - 1 > 0 THEN 'PROCESSING' ELSE 'FAILED' END
            WHERE job_uuid = $1 AND status = 'PROCESSING' AND attempt = $2 AND render_pending
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(uuid)
        .bind(attempt)
        .bind(reason)
        .bind(retry_prompt)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(FailureOutcome::Ignored);
        };
        let job = Job::try_from(row)?;

        if job.status == JobStatus::Failed {
            Ok(FailureOutcome::Exhausted(job))
        } else {
            Ok(FailureOutcome::Retry(job))
        }
    }

    async fn complete_with_video(
        &self,
        uuid: Uuid,
        attempt: i32,
        locator: &str,
    ) -> Result<CompletionOutcome> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let row = sqlx::query_as::<_, JobRow>(&format!(
            r#"
            UPDATE jobs
            SET status = 'COMPLETED', completed_at = $3, render_pending = FALSE,
                error_message = NULL
            WHERE job_uuid = $1 AND status = 'PROCESSING' AND attempt = $2 AND render_pending
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(uuid)
        .bind(attempt)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(CompletionOutcome::Ignored);
        };
        let mut job = Job::try_from(row)?;

        let video = sqlx::query_as::<_, VideoRow>(&format!(
            r#"
            INSERT INTO videos (owner_id, job_uuid, title, associated_code, storage_locator,
                                created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {VIDEO_COLUMNS}
            "#
        ))
        .bind(&job.owner_id)
        .bind(job.uuid)
        .bind(video_title(&job.original_prompt))
        .bind(job.generated_code.as_deref().unwrap_or_default())
        .bind(locator)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE jobs SET video_id = $2 WHERE job_uuid = $1")
            .bind(uuid)
            .bind(video.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        job.video_id = Some(video.id);
        Ok(CompletionOutcome::Completed {
            job,
            video: video.into(),
        })
    }

    async fn find_pending_renders(&self, cutoff: DateTime<Utc>) -> Result<Vec<PendingRender>> {
        let rows = sqlx::query_as::<_, PendingRenderRow>(
            r#"
            SELECT job_uuid, attempt, dispatched_at
            FROM jobs
            WHERE status = 'PROCESSING' AND render_pending AND dispatched_at < $1
            ORDER BY dispatched_at ASC
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| PendingRender {
                job_uuid: r.job_uuid,
                attempt: r.attempt,
                dispatched_at: r.dispatched_at,
            })
            .collect())
    }

    async fn find_undispatched(&self) -> Result<Vec<Job>> {
        let rows = sqlx::query_as::<_, JobRow>(&format!(
            r#"
            SELECT {JOB_COLUMNS}
            FROM jobs
            WHERE status = 'PENDING' OR (status = 'PROCESSING' AND NOT render_pending)
            ORDER BY id ASC
            "#
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Job::try_from).collect()
    }

    async fn find_video(&self, video_id: i64, owner_id: &str) -> Result<Option<Video>> {
        let row = sqlx::query_as::<_, VideoRow>(&format!(
            "SELECT {VIDEO_COLUMNS} FROM videos WHERE id = $1 AND owner_id = $2"
        ))
        .bind(video_id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn list_videos(&self, owner_id: &str, limit: i64, offset: i64) -> Result<Vec<Video>> {
        let rows = sqlx::query_as::<_, VideoRow>(&format!(
            r#"
            SELECT {VIDEO_COLUMNS}
            FROM videos
            WHERE owner_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(owner_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn count_videos(&self, owner_id: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM videos WHERE owner_id = $1")
            .bind(owner_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct JobRow {
    id: i64,
    job_uuid: Uuid,
    owner_id: String,
    original_prompt: String,
    prompt: String,
    status: String,
    backend: Option<String>,
    config: serde_json::Value,
    generated_code: Option<String>,
    retries_remaining: i32,
    attempt: i32,
    render_pending: bool,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    dispatched_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    video_id: Option<i64>,
}

impl TryFrom<JobRow> for Job {
    type Error = StoreError;

    fn try_from(row: JobRow) -> Result<Self> {
        let status = row.status.parse::<JobStatus>().map_err(StoreError::Corrupt)?;
        let backend = row
            .backend
            .as_deref()
            .map(str::parse::<Backend>)
            .transpose()
            .map_err(StoreError::Corrupt)?;
        let config: RenderConfig = serde_json::from_value(row.config)
            .map_err(|e| StoreError::Corrupt(format!("job {} config: {}", row.job_uuid, e)))?;

        Ok(Job {
            id: row.id,
            uuid: row.job_uuid,
            owner_id: row.owner_id,
            original_prompt: row.original_prompt,
            prompt: row.prompt,
            status,
            backend,
            config,
            generated_code: row.generated_code,
            retries_remaining: row.retries_remaining,
            attempt: row.attempt,
            render_pending: row.render_pending,
            error_message: row.error_message,
            created_at: row.created_at,
            dispatched_at: row.dispatched_at,
            completed_at: row.completed_at,
            video_id: row.video_id,
        })
    }
}

#[derive(sqlx::FromRow)]
struct VideoRow {
    id: i64,
    owner_id: String,
    job_uuid: Uuid,
    title: String,
    associated_code: String,
    storage_locator: String,
    created_at: DateTime<Utc>,
}

impl From<VideoRow> for Video {
    fn from(row: VideoRow) -> Self {
        Video {
            id: row.id,
            owner_id: row.owner_id,
            job_uuid: row.job_uuid,
            title: row.title,
            associated_code: row.associated_code,
            storage_locator: row.storage_locator,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PendingRenderRow {
    job_uuid: Uuid,
    attempt: i32,
    dispatched_at: DateTime<Utc>,
}
