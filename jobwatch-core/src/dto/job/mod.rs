//! Job DTOs exchanged with the job server

use serde::{Deserialize, Serialize};

use crate::domain::job::{JobId, JobStatus};

/// Response to a job submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub job_id: JobId,
    /// Initial status; the server may omit it, in which case the job is queued
    #[serde(default)]
    pub status: Option<JobStatus>,
}

impl SubmitResponse {
    pub fn initial_status(&self) -> JobStatus {
        self.status.unwrap_or(JobStatus::Queued)
    }
}

/// Response to a request to start running a submitted job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResponse {
    pub status: JobStatus,
}

/// A job as listed by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: JobId,
    pub status: JobStatus,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub original_filename: Option<String>,
}

impl JobRecord {
    /// Name to show for the job, falling back to its id
    pub fn label(&self) -> String {
        self.display_name
            .as_ref()
            .or(self.original_filename.as_ref())
            .cloned()
            .unwrap_or_else(|| self.job_id.to_string())
    }
}

/// Error body returned by the job server on non-2xx responses
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub detail: serde_json::Value,
}

impl ErrorBody {
    /// Human-readable detail; structured details are rendered as JSON
    pub fn message(&self) -> String {
        match &self.detail {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}
