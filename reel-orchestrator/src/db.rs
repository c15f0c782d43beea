use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // Create jobs table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS jobs (
            id BIGSERIAL PRIMARY KEY,
            job_uuid UUID NOT NULL UNIQUE,
            owner_id VARCHAR(255) NOT NULL,
            original_prompt TEXT NOT NULL,
            prompt TEXT NOT NULL,
            status VARCHAR(20) NOT NULL,
            backend VARCHAR(20),
            config JSONB NOT NULL DEFAULT '{}',
            generated_code TEXT,
            retries_remaining INTEGER NOT NULL,
            attempt INTEGER NOT NULL DEFAULT 0,
            render_pending BOOLEAN NOT NULL DEFAULT FALSE,
            error_message TEXT,
            created_at TIMESTAMPTZ NOT NULL,
            dispatched_at TIMESTAMPTZ,
            completed_at TIMESTAMPTZ,
            video_id BIGINT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create videos table; UNIQUE(job_uuid) keeps the job/video link 1:1
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS videos (
            id BIGSERIAL PRIMARY KEY,
            owner_id VARCHAR(255) NOT NULL,
            job_uuid UUID NOT NULL UNIQUE REFERENCES jobs(job_uuid) ON DELETE CASCADE,
            title TEXT NOT NULL,
            associated_code TEXT NOT NULL,
            storage_locator TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for better query performance
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_owner_id ON jobs(owner_id)")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_jobs_pending_renders ON jobs(dispatched_at) \
         WHERE status = 'PROCESSING' AND render_pending",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_videos_owner_created ON videos(owner_id, created_at DESC)",
    )
    .execute(pool)
    .await?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}
