use chrono::{DateTime, Utc};
use serde::Serialize;

use super::JobStatus;

/// Transient progress notification delivered to live subscribers only.
/// Never persisted; the wire shape is consumed bit-exact by the UI.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub status: JobStatus,
    pub message: String,
    pub progress_percent: u8,
    pub ts: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocr_duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_duration_ms: Option<u64>,
}

impl ProgressEvent {
    pub fn new(status: JobStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            progress_percent: status.progress_percent(),
            ts: Utc::now(),
            engine: None,
            ocr_duration_ms: None,
            total_duration_ms: None,
        }
    }
}
