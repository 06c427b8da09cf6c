use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ExtractedFields;

/// Linear job state machine. Transitions only move forward, except that a
/// polling claim re-enters `processing` after a crash left a job there.
/// Any state may fall to `failed`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Queued,
    Processing,
    Extracting,
    Validating,
    Saving,
    Done,
    Failed,
}

impl JobStatus {
    /// Fixed, informational progress mapping — not interpolated.
    pub fn progress_percent(&self) -> u8 {
        match self {
            Self::Queued => 5,
            Self::Processing => 20,
            Self::Extracting => 55,
            Self::Validating => 80,
            Self::Saving => 92,
            Self::Done => 100,
            Self::Failed => 100,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Processing => write!(f, "processing"),
            Self::Extracting => write!(f, "extracting"),
            Self::Validating => write!(f, "validating"),
            Self::Saving => write!(f, "saving"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "queued" => Ok(Self::Queued),
            "processing" => Ok(Self::Processing),
            "extracting" => Ok(Self::Extracting),
            "validating" => Ok(Self::Validating),
            "saving" => Ok(Self::Saving),
            "done" => Ok(Self::Done),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Unknown job status: {s}")),
        }
    }
}

/// One OCR processing request for a single uploaded image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub user_id: String,
    pub status: JobStatus,
    pub file_path: String,
    pub original_filename: String,
    pub raw_ocr_text: Option<String>,
    pub extracted_fields: Option<ExtractedFields>,
    pub field_confidence: Option<HashMap<String, f64>>,
    pub warnings: Option<Vec<String>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(id: String, user_id: String, file_path: String, original_filename: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id,
            status: JobStatus::default(),
            file_path,
            original_filename,
            raw_ocr_text: None,
            extracted_fields: None,
            field_confidence: None,
            warnings: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Append-only audit line for one step transition or diagnostic note.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobLogEntry {
    pub job_id: String,
    pub step: String,
    pub message: String,
    pub ts: DateTime<Utc>,
}

impl JobLogEntry {
    pub fn new(job_id: &str, step: &str, message: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            step: step.to_string(),
            message: message.to_string(),
            ts: Utc::now(),
        }
    }
}
