//! Data Transfer Objects for the job server boundary
//!
//! `event` holds the push-stream wire format, `job` the request/response
//! bodies of the collaborator calls.

pub mod event;
pub mod job;
