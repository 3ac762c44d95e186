//! Jobwatch Core
//!
//! Core types and the job lifecycle state machine for Jobwatch.
//!
//! This crate contains:
//! - Domain types: the job snapshot, stages, and produced files
//! - DTOs: the progress event wire format and job server bodies
//! - The stage registry, progress throttle, and state machine reducer
//!
//! Nothing here performs I/O; the async stream consumer lives in
//! `jobwatch-client`.

pub mod domain;
pub mod dto;
pub mod machine;
pub mod registry;
pub mod throttle;

pub use dto::event::DecodeError;
