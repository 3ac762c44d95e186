//! Job output file types

use serde::{Deserialize, Serialize};

/// A file produced by a finished job
///
/// Read-only; fetched once when the job reaches `finished`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFile {
    pub file_id: String,
    #[serde(rename = "type")]
    pub kind: FileKind,
    #[serde(default)]
    pub watermark: Option<String>,
    pub filename: String,
    pub size: u64,
    pub url: String,
}

/// Kind of produced file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Original,
    Mono,
    Dual,
    #[serde(other)]
    Other,
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileKind::Original => write!(f, "original"),
            FileKind::Mono => write!(f, "mono"),
            FileKind::Dual => write!(f, "dual"),
            FileKind::Other => write!(f, "other"),
        }
    }
}
