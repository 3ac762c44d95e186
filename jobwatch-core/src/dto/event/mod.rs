//! Progress event wire format
//!
//! Each push-stream message carries one JSON object of the shape
//! `{"id", "job_id", "ts", "type", "data"}`. Only `type` is required; a
//! missing or null `data` is read as an empty object.

use chrono::{DateTime, FixedOffset};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::job::JobId;

/// Fallback text for an `error` event that names no cause
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// Errors raised while decoding a single stream message
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Message is not a JSON event envelope
    #[error("malformed event: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Envelope names an event type this consumer does not know
    #[error("unknown event type '{0}'")]
    UnknownType(String),

    /// Type-specific payload has the wrong shape
    #[error("invalid '{kind}' payload: {source}")]
    Payload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A decoded progress event
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    StageSummary(StageSummary),
    ProgressStart(ProgressStart),
    ProgressUpdate(ProgressUpdate),
    ProgressEnd,
    Finish,
    Error(ErrorReport),
    Heartbeat,
}

impl JobEvent {
    /// Wire name of the event type
    pub fn kind(&self) -> &'static str {
        match self {
            JobEvent::StageSummary(_) => "stage_summary",
            JobEvent::ProgressStart(_) => "progress_start",
            JobEvent::ProgressUpdate(_) => "progress_update",
            JobEvent::ProgressEnd => "progress_end",
            JobEvent::Finish => "finish",
            JobEvent::Error(_) => "error",
            JobEvent::Heartbeat => "heartbeat",
        }
    }

    pub fn is_progress_update(&self) -> bool {
        matches!(self, JobEvent::ProgressUpdate(_))
    }
}

/// `stage_summary` payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageSummary {
    /// Absent when the producer sent no stage list
    #[serde(default)]
    pub stages: Option<Vec<StageSpec>>,
}

/// One stage as announced by `stage_summary`
///
/// Producers disagree on the field name for the stage share: `weight`
/// is canonical, `percent` is accepted as a fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSpec {
    pub name: String,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub percent: Option<f64>,
}

impl StageSpec {
    pub fn new(name: impl Into<String>, weight: f64) -> Self {
        Self {
            name: name.into(),
            weight: Some(weight),
            percent: None,
        }
    }

    /// `weight` if present, else `percent`, else zero
    pub fn resolved_weight(&self) -> f64 {
        self.weight.or(self.percent).unwrap_or(0.0)
    }
}

/// `progress_start` payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressStart {
    #[serde(default)]
    pub stage: Option<String>,
}

/// `progress_update` payload
///
/// Every field is a full snapshot value, never a delta.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    #[serde(default)]
    pub overall_progress: Option<f64>,
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub stage_progress: Option<f64>,
}

/// `error` payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorReport {
    /// `error`, else `message`, else [`UNKNOWN_ERROR`]; empty strings count as absent
    pub fn describe(&self) -> String {
        [&self.error, &self.message]
            .into_iter()
            .flatten()
            .find(|s| !s.is_empty())
            .cloned()
            .unwrap_or_else(|| UNKNOWN_ERROR.to_string())
    }
}

/// A decoded event together with the producer's envelope fields
#[derive(Debug, Clone, PartialEq)]
pub struct EventEnvelope {
    /// Producer-assigned sequence number, increasing per job
    pub id: Option<u64>,
    pub job_id: Option<JobId>,
    pub ts: Option<DateTime<FixedOffset>>,
    pub event: JobEvent,
}

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    job_id: Option<JobId>,
    #[serde(default)]
    ts: Option<DateTime<FixedOffset>>,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

impl EventEnvelope {
    /// Wraps an event with no envelope metadata
    pub fn new(event: JobEvent) -> Self {
        Self {
            id: None,
            job_id: None,
            ts: None,
            event,
        }
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    /// Decodes one stream message
    pub fn decode(raw: &str) -> Result<Self, DecodeError> {
        let envelope: RawEnvelope = serde_json::from_str(raw)?;
        let data = match envelope.data {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };

        let kind = envelope.kind.as_str();
        let event = match kind {
            "stage_summary" => JobEvent::StageSummary(payload(kind, data)?),
            "progress_start" => JobEvent::ProgressStart(payload(kind, data)?),
            "progress_update" => JobEvent::ProgressUpdate(payload(kind, data)?),
            "progress_end" => JobEvent::ProgressEnd,
            "finish" => JobEvent::Finish,
            "error" => JobEvent::Error(payload(kind, data)?),
            "heartbeat" => JobEvent::Heartbeat,
            other => return Err(DecodeError::UnknownType(other.to_string())),
        };

        Ok(Self {
            id: envelope.id,
            job_id: envelope.job_id,
            ts: envelope.ts,
            event,
        })
    }
}

fn payload<T: DeserializeOwned>(kind: &str, data: Value) -> Result<T, DecodeError> {
    serde_json::from_value(data).map_err(|source| DecodeError::Payload {
        kind: kind.to_string(),
        source,
    })
}
