//! Core domain types
//!
//! These types represent the animation jobs and rendered videos. They are
//! persisted by the orchestrator and read back by the client and CLI.

pub mod job;
pub mod render;
pub mod video;
