//! Job domain types

use serde::{Deserialize, Serialize};

use crate::registry::StageRegistry;

/// Opaque job identifier assigned by the producing server
///
/// An empty id means no job has been submitted yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Lifecycle status of a tracked job
///
/// `Idle` is only seen before a job is submitted. `Finished`, `Failed`
/// and `Canceled` are terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Idle,
    Queued,
    Running,
    Finished,
    Failed,
    Canceled,
}

impl JobStatus {
    /// Whether no further event may change a snapshot in this status
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Finished | JobStatus::Failed | JobStatus::Canceled
        )
    }

    /// Whether progress events are meaningful in this status
    pub fn is_active(self) -> bool {
        matches!(self, JobStatus::Queued | JobStatus::Running)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Idle => write!(f, "idle"),
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Finished => write!(f, "finished"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Canceled => write!(f, "canceled"),
        }
    }
}

/// Reconciled view of one job's progress
///
/// `Default` is the exact idle snapshot a tracker starts from and returns
/// to on reset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub id: JobId,
    pub status: JobStatus,
    /// Overall percent, 0-100
    pub overall_progress: u8,
    /// Stage most recently reported as active, empty when none
    pub current_stage_name: String,
    /// Percent of the active stage, 0-100
    pub current_stage_progress: u8,
    /// Set only when `status` is `Failed`
    pub error_message: String,
    /// Advisory connectivity notice, never drives a transition
    pub info_message: String,
    pub stages: StageRegistry,
    /// Id of the last applied stream event, used to resume a re-opened stream
    pub last_event_id: Option<u64>,
}

impl JobSnapshot {
    /// A fresh snapshot for a just-submitted job
    pub fn submitted(id: JobId, status: JobStatus) -> Self {
        Self {
            id,
            status,
            ..Self::default()
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn has_job(&self) -> bool {
        !self.id.is_empty()
    }
}

/// Clamps a producer-reported percentage into 0-100
///
/// Producers send plain JSON numbers, sometimes fractional.
pub fn clamp_percent(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(JobStatus::Finished.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Canceled.is_terminal());
        assert!(!JobStatus::Idle.is_terminal());
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
    }

    #[test]
    fn test_status_wire_names() {
        let status: JobStatus = serde_json::from_str("\"canceled\"").unwrap();
        assert_eq!(status, JobStatus::Canceled);
        assert_eq!(
            serde_json::to_string(&JobStatus::Queued).unwrap(),
            "\"queued\""
        );
        assert!(serde_json::from_str::<JobStatus>("\"paused\"").is_err());
    }

    #[test]
    fn test_default_snapshot_is_idle() {
        let snapshot = JobSnapshot::default();
        assert_eq!(snapshot.status, JobStatus::Idle);
        assert!(!snapshot.has_job());
        assert_eq!(snapshot.overall_progress, 0);
        assert!(snapshot.stages.is_empty());
        assert_eq!(snapshot.last_event_id, None);
    }

    #[test]
    fn test_clamp_percent() {
        assert_eq!(clamp_percent(42.4), 42);
        assert_eq!(clamp_percent(42.5), 43);
        assert_eq!(clamp_percent(-3.0), 0);
        assert_eq!(clamp_percent(250.0), 100);
        assert_eq!(clamp_percent(f64::NAN), 0);
    }
}
