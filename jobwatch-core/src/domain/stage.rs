//! Stage domain types

use serde::{Deserialize, Serialize};

/// One named, weighted phase of a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageEntry {
    pub name: String,
    /// Relative share used for display only
    pub weight: f64,
    pub status: StageStatus,
    /// Percent of this stage, 0-100
    pub percent: u8,
}

impl StageEntry {
    pub fn pending(name: impl Into<String>, weight: f64) -> Self {
        Self {
            name: name.into(),
            weight,
            status: StageStatus::Pending,
            percent: 0,
        }
    }
}

/// Stage progress status
///
/// Moves `Pending -> Running -> Completed`; `Completed` never reverts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Running,
    Completed,
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageStatus::Pending => write!(f, "pending"),
            StageStatus::Running => write!(f, "running"),
            StageStatus::Completed => write!(f, "completed"),
        }
    }
}
