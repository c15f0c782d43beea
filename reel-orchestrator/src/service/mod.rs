//! Service Module
//!
//! Business logic layer for the orchestrator.
//! Services coordinate the job store, the generation backends and the
//! render service.

pub mod job;
pub mod notifier;
pub mod sweeper;
pub mod video;
pub mod worker;

// Re-export for convenience
pub use job::{JobError, JobOrchestrator, OrchestratorSettings, ReportOutcome};
pub use notifier::CompletionNotifier;
pub use video as video_service;
pub use worker::WorkerPool;
