//! Core domain types
//!
//! The reconciled job snapshot, its stage entries, and the files a
//! finished job produces.

pub mod file;
pub mod job;
pub mod stage;

pub use file::{FileKind, JobFile};
pub use job::{JobId, JobSnapshot, JobStatus, clamp_percent};
pub use stage::{StageEntry, StageStatus};
