//! In-memory job store
//!
//! Backs the orchestrator when no database is configured, and the test
//! suite. A single mutex serializes every transition.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reel_core::domain::job::{Job, JobStatus};
use reel_core::domain::video::{Video, video_title};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use super::{CompletionOutcome, FailureOutcome, JobStore, NewJob, PendingRender, Result};

#[derive(Default)]
struct State {
    jobs: HashMap<Uuid, Job>,
    videos: BTreeMap<i64, Video>,
    next_job_id: i64,
    next_video_id: i64,
}

/// Job store held entirely in process memory
#[derive(Default)]
pub struct InMemoryJobStore {
    state: Mutex<State>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Videos that reference a job
    #[cfg(test)]
    pub fn videos_for_job(&self, uuid: Uuid) -> Vec<Video> {
        self.state()
            .videos
            .values()
            .filter(|v| v.job_uuid == uuid)
            .cloned()
            .collect()
    }
}

fn awaiting_render(job: &Job, attempt: i32) -> bool {
    job.status == JobStatus::Processing && job.attempt == attempt && job.render_pending
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create(&self, new: NewJob) -> Result<Job> {
        let mut state = self.state();
        state.next_job_id += 1;

        let job = Job {
            id: state.next_job_id,
            uuid: Uuid::new_v4(),
            owner_id: new.owner_id,
            original_prompt: new.prompt.clone(),
            prompt: new.prompt,
            status: JobStatus::Pending,
            backend: new.backend,
            config: new.config,
            generated_code: None,
            retries_remaining: new.retry_budget,
            attempt: 0,
            render_pending: false,
            error_message: None,
            created_at: Utc::now(),
            dispatched_at: None,
            completed_at: None,
            video_id: None,
        };

        state.jobs.insert(job.uuid, job.clone());
        Ok(job)
    }

    async fn find_by_uuid(&self, uuid: Uuid) -> Result<Option<Job>> {
        Ok(self.state().jobs.get(&uuid).cloned())
    }

    async fn find_for_owner(&self, uuid: Uuid, owner_id: &str) -> Result<Option<Job>> {
        Ok(self
            .state()
            .jobs
            .get(&uuid)
            .filter(|job| job.owner_id == owner_id)
            .cloned())
    }

    async fn start_processing(&self, uuid: Uuid) -> Result<Option<Job>> {
        let mut state = self.state();
        let Some(job) = state.jobs.get_mut(&uuid) else {
            return Ok(None);
        };
        if job.status != JobStatus::Pending {
            return Ok(None);
        }

        job.status = JobStatus::Processing;
        job.attempt = 1;
        Ok(Some(job.clone()))
    }

    async fn record_generated_code(&self, uuid: Uuid, attempt: i32, code: &str) -> Result<bool> {
        let mut state = self.state();
        let Some(job) = state.jobs.get_mut(&uuid) else {
            return Ok(false);
        };
        if job.status != JobStatus::Processing || job.attempt != attempt || job.render_pending {
            return Ok(false);
        }

        job.generated_code = Some(code.to_string());
        job.render_pending = true;
        job.dispatched_at = Some(Utc::now());
        Ok(true)
    }

    async fn fail_attempt(&self, uuid: Uuid, attempt: i32, message: &str) -> Result<bool> {
        let mut state = self.state();
        let Some(job) = state.jobs.get_mut(&uuid) else {
            return Ok(false);
        };
        if job.status != JobStatus::Processing || job.attempt != attempt || job.render_pending {
            return Ok(false);
        }

        job.status = JobStatus::Failed;
        job.error_message = Some(message.to_string());
        Ok(true)
    }

    async fn abort_attempt(&self, uuid: Uuid, attempt: i32, message: &str) -> Result<bool> {
        let mut state = self.state();
        let Some(job) = state.jobs.get_mut(&uuid) else {
            return Ok(false);
        };
        if job.status != JobStatus::Processing || job.attempt != attempt {
            return Ok(false);
        }

        job.status = JobStatus::Failed;
        job.render_pending = false;
        job.error_message = Some(message.to_string());
        Ok(true)
    }

    async fn record_render_failure(
        &self,
        uuid: Uuid,
        attempt: i32,
        reason: &str,
        retry_prompt: &str,
    ) -> Result<FailureOutcome> {
        let mut state = self.state();
        let Some(job) = state.jobs.get_mut(&uuid) else {
            return Ok(FailureOutcome::Ignored);
        };
        if !awaiting_render(job, attempt) {
            return Ok(FailureOutcome::Ignored);
        }

        job.retries_remaining -= 1;
        job.render_pending = false;
        job.error_message = Some(reason.to_string());

        if job.retries_remaining > 0 {
            job.attempt += 1;
            job.prompt = retry_prompt.to_string();
            Ok(FailureOutcome::Retry(job.clone()))
        } else {
            job.status = JobStatus::Failed;
            Ok(FailureOutcome::Exhausted(job.clone()))
        }
    }

    async fn complete_with_video(
        &self,
        uuid: Uuid,
        attempt: i32,
        locator: &str,
    ) -> Result<CompletionOutcome> {
        let mut state = self.state();
        let applies = state
            .jobs
            .get(&uuid)
            .is_some_and(|job| awaiting_render(job, attempt));
        if !applies {
            return Ok(CompletionOutcome::Ignored);
        }

        state.next_video_id += 1;
        let video_id = state.next_video_id;

        let Some(job) = state.jobs.get_mut(&uuid) else {
            return Ok(CompletionOutcome::Ignored);
        };
        let now = Utc::now();
        job.status = JobStatus::Completed;
        job.completed_at = Some(now);
        job.render_pending = false;
        job.error_message = None;
        job.video_id = Some(video_id);

        let video = Video {
            id: video_id,
            owner_id: job.owner_id.clone(),
            job_uuid: job.uuid,
            title: video_title(&job.original_prompt),
            associated_code: job.generated_code.clone().unwrap_or_default(),
            storage_locator: locator.to_string(),
            created_at: now,
        };
        let job = job.clone();

        state.videos.insert(video_id, video.clone());
        Ok(CompletionOutcome::Completed { job, video })
    }

    async fn find_pending_renders(&self, cutoff: DateTime<Utc>) -> Result<Vec<PendingRender>> {
        let mut pending: Vec<PendingRender> = self
            .state()
            .jobs
            .values()
            .filter(|job| job.status == JobStatus::Processing && job.render_pending)
            .filter_map(|job| {
                job.dispatched_at
                    .filter(|at| *at < cutoff)
                    .map(|dispatched_at| PendingRender {
                        job_uuid: job.uuid,
                        attempt: job.attempt,
                        dispatched_at,
                    })
            })
            .collect();
        pending.sort_by_key(|p| p.dispatched_at);
        Ok(pending)
    }

    async fn find_undispatched(&self) -> Result<Vec<Job>> {
        let mut jobs: Vec<Job> = self
            .state()
            .jobs
            .values()
            .filter(|job| {
                job.status == JobStatus::Pending
                    || (job.status == JobStatus::Processing && !job.render_pending)
            })
            .cloned()
            .collect();
        jobs.sort_by_key(|job| job.id);
        Ok(jobs)
    }

    async fn find_video(&self, video_id: i64, owner_id: &str) -> Result<Option<Video>> {
        Ok(self
            .state()
            .videos
            .get(&video_id)
            .filter(|video| video.owner_id == owner_id)
            .cloned())
    }

    async fn list_videos(&self, owner_id: &str, limit: i64, offset: i64) -> Result<Vec<Video>> {
        let mut videos: Vec<Video> = self
            .state()
            .videos
            .values()
            .filter(|video| video.owner_id == owner_id)
            .cloned()
            .collect();
        videos.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(videos
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count_videos(&self, owner_id: &str) -> Result<i64> {
        Ok(self
            .state()
            .videos
            .values()
            .filter(|video| video.owner_id == owner_id)
            .count() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_core::domain::render::RenderConfig;

    fn new_job(owner: &str, budget: i32) -> NewJob {
        NewJob {
            owner_id: owner.to_string(),
            prompt: "draw a circle".to_string(),
            backend: None,
            config: RenderConfig::default(),
            retry_budget: budget,
        }
    }

    async fn dispatched_job(store: &InMemoryJobStore, budget: i32) -> Job {
        let job = store.create(new_job("alice", budget)).await.unwrap();
        store.start_processing(job.uuid).await.unwrap().unwrap();
        assert!(
            store
                .record_generated_code(job.uuid, 1, "class A(Scene): pass")
                .await
                .unwrap()
        );
        store.find_by_uuid(job.uuid).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_owner_scoping_hides_foreign_jobs() {
        let store = InMemoryJobStore::new();
        let job = store.create(new_job("alice", 3)).await.unwrap();

        assert!(store.find_for_owner(job.uuid, "alice").await.unwrap().is_some());
        assert!(store.find_for_owner(job.uuid, "mallory").await.unwrap().is_none());
        assert!(
            store
                .find_for_owner(Uuid::new_v4(), "alice")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_start_processing_only_once() {
        let store = InMemoryJobStore::new();
        let job = store.create(new_job("alice", 3)).await.unwrap();

        let started = store.start_processing(job.uuid).await.unwrap().unwrap();
        assert_eq!(started.status, JobStatus::Processing);
        assert_eq!(started.attempt, 1);
        assert!(store.start_processing(job.uuid).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_render_failure_applies_once_per_attempt() {
        let store = InMemoryJobStore::new();
        let job = dispatched_job(&store, 3).await;

        let first = store
            .record_render_failure(job.uuid, 1, "boom", "retry prompt")
            .await
            .unwrap();
        let FailureOutcome::Retry(retried) = first else {
            panic!("expected retry");
        };
        assert_eq!(retried.retries_remaining, 2);
        assert_eq!(retried.attempt, 2);
        assert_eq!(retried.prompt, "retry prompt");
        assert!(!retried.render_pending);

        let duplicate = store
            .record_render_failure(job.uuid, 1, "boom", "retry prompt")
            .await
            .unwrap();
        assert!(matches!(duplicate, FailureOutcome::Ignored));
        let job = store.find_by_uuid(job.uuid).await.unwrap().unwrap();
        assert_eq!(job.retries_remaining, 2);
    }

    #[tokio::test]
    async fn test_last_render_failure_fails_job() {
        let store = InMemoryJobStore::new();
        let job = dispatched_job(&store, 1).await;

        let outcome = store
            .record_render_failure(job.uuid, 1, "timeout", "unused")
            .await
            .unwrap();
        let FailureOutcome::Exhausted(failed) = outcome else {
            panic!("expected exhaustion");
        };
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.retries_remaining, 0);
        assert_eq!(failed.error_message.as_deref(), Some("timeout"));
        assert_eq!(failed.prompt, "draw a circle");
    }

    #[tokio::test]
    async fn test_completion_creates_exactly_one_video() {
        let store = InMemoryJobStore::new();
        let job = dispatched_job(&store, 3).await;

        let outcome = store
            .complete_with_video(job.uuid, 1, "videos/a.mp4")
            .await
            .unwrap();
        let CompletionOutcome::Completed { job: done, video } = outcome else {
            panic!("expected completion");
        };
        assert_eq!(done.status, JobStatus::Completed);
        assert!(done.completed_at.is_some());
        assert_eq!(done.video_id, Some(video.id));
        assert_eq!(video.associated_code, "class A(Scene): pass");
        assert_eq!(video.title, "Video for draw a circle...");

        let again = store
            .complete_with_video(job.uuid, 1, "videos/a.mp4")
            .await
            .unwrap();
        assert!(matches!(again, CompletionOutcome::Ignored));
        assert_eq!(store.videos_for_job(job.uuid).len(), 1);
    }

    #[tokio::test]
    async fn test_outcomes_ignored_before_dispatch() {
        let store = InMemoryJobStore::new();
        let job = store.create(new_job("alice", 3)).await.unwrap();
        store.start_processing(job.uuid).await.unwrap();

        let completed = store.complete_with_video(job.uuid, 1, "x").await.unwrap();
        assert!(matches!(completed, CompletionOutcome::Ignored));
        let failed = store
            .record_render_failure(job.uuid, 1, "boom", "p")
            .await
            .unwrap();
        assert!(matches!(failed, FailureOutcome::Ignored));
    }

    #[tokio::test]
    async fn test_fail_attempt_respects_dispatch() {
        let store = InMemoryJobStore::new();
        let job = dispatched_job(&store, 3).await;
        assert!(!store.fail_attempt(job.uuid, 1, "crash").await.unwrap());

        let started = store.create(new_job("alice", 3)).await.unwrap();
        store.start_processing(started.uuid).await.unwrap();
        assert!(store.fail_attempt(started.uuid, 1, "crash").await.unwrap());
        let started = store.find_by_uuid(started.uuid).await.unwrap().unwrap();
        assert_eq!(started.status, JobStatus::Failed);
        assert_eq!(started.retries_remaining, 3);
    }

    #[tokio::test]
    async fn test_pending_jobs_never_fail_directly() {
        let store = InMemoryJobStore::new();
        let job = store.create(new_job("alice", 3)).await.unwrap();

        assert!(!store.fail_attempt(job.uuid, 1, "crash").await.unwrap());
        assert!(!store.abort_attempt(job.uuid, 1, "crash").await.unwrap());
        let job = store.find_by_uuid(job.uuid).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn test_abort_attempt_ends_dispatched_attempt() {
        let store = InMemoryJobStore::new();
        let job = dispatched_job(&store, 3).await;

        assert!(!store.abort_attempt(job.uuid, 2, "crash").await.unwrap());
        assert!(store.abort_attempt(job.uuid, 1, "crash").await.unwrap());

        let job = store.find_by_uuid(job.uuid).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(!job.render_pending);
        assert_eq!(job.retries_remaining, 3);
        assert_eq!(job.error_message.as_deref(), Some("crash"));
        assert!(!store.abort_attempt(job.uuid, 1, "crash").await.unwrap());
    }

    #[tokio::test]
    async fn test_undispatched_jobs_are_found() {
        let store = InMemoryJobStore::new();
        let queued = store.create(new_job("alice", 3)).await.unwrap();
        let started = store.create(new_job("alice", 3)).await.unwrap();
        store.start_processing(started.uuid).await.unwrap();
        dispatched_job(&store, 3).await;

        let found: Vec<Uuid> = store
            .find_undispatched()
            .await
            .unwrap()
            .into_iter()
            .map(|job| job.uuid)
            .collect();
        assert_eq!(found, vec![queued.uuid, started.uuid]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_outcomes_apply_once() {
        let store = std::sync::Arc::new(InMemoryJobStore::new());

        for _ in 0..50 {
            let uuid = dispatched_job(&store, 3).await.uuid;
            let barrier = std::sync::Arc::new(tokio::sync::Barrier::new(2));

            let completion = {
                let (store, barrier) = (store.clone(), barrier.clone());
                tokio::spawn(async move {
                    barrier.wait().await;
                    store.complete_with_video(uuid, 1, "videos/a.mp4").await
                })
            };
            let failure = {
                let (store, barrier) = (store.clone(), barrier.clone());
                tokio::spawn(async move {
                    barrier.wait().await;
                    store.record_render_failure(uuid, 1, "boom", "p").await
                })
            };
            let (completion, failure) = tokio::join!(completion, failure);
            let completion = completion.unwrap().unwrap();
            let failure = failure.unwrap().unwrap();

            let job = store.find_by_uuid(uuid).await.unwrap().unwrap();
            let videos = store.videos_for_job(uuid).len();
            match (completion, failure) {
                (CompletionOutcome::Completed { .. }, FailureOutcome::Ignored) => {
                    assert_eq!(job.status, JobStatus::Completed);
                    assert_eq!(job.retries_remaining, 3);
                    assert_eq!(videos, 1);
                }
                (CompletionOutcome::Ignored, FailureOutcome::Retry(_)) => {
                    assert_eq!(job.status, JobStatus::Processing);
                    assert_eq!(job.retries_remaining, 2);
                    assert_eq!(videos, 0);
                }
                (completion, failure) => {
                    panic!("expected exactly one outcome, got {:?} / {:?}", completion, failure)
                }
            }
        }
    }

    #[tokio::test]
    async fn test_pending_renders_before_cutoff() {
        let store = InMemoryJobStore::new();
        let job = dispatched_job(&store, 3).await;

        let future = Utc::now() + chrono::Duration::seconds(5);
        let past = Utc::now() - chrono::Duration::seconds(60);

        let stale = store.find_pending_renders(future).await.unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].job_uuid, job.uuid);
        assert_eq!(stale[0].attempt, 1);
        assert!(store.find_pending_renders(past).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_video_listing_is_scoped_and_paged() {
        let store = InMemoryJobStore::new();
        for _ in 0..3 {
            let job = dispatched_job(&store, 3).await;
            store
                .complete_with_video(job.uuid, 1, "videos/x.mp4")
                .await
                .unwrap();
        }

        assert_eq!(store.count_videos("alice").await.unwrap(), 3);
        assert_eq!(store.count_videos("bob").await.unwrap(), 0);

        let page = store.list_videos("alice", 2, 0).await.unwrap();
        assert_eq!(page.len(), 2);
        assert!(page[0].id > page[1].id);
        let rest = store.list_videos("alice", 2, 2).await.unwrap();
        assert_eq!(rest.len(), 1);

        let id = page[0].id;
        assert!(store.find_video(id, "alice").await.unwrap().is_some());
        assert!(store.find_video(id, "bob").await.unwrap().is_none());
    }
}
