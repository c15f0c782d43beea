//! Reel Core
//!
//! Core types shared by the reel orchestrator, client and CLI.
//!
//! This crate contains:
//! - Domain types: Jobs, videos and render options
//! - DTOs: Request/response bodies exchanged over HTTP

pub mod domain;
pub mod dto;
