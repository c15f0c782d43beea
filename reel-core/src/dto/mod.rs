//! Data Transfer Objects
//!
//! Bodies exchanged between callers, the orchestrator and the render service.

pub mod job;
pub mod render;
pub mod video;
