//! Request and response bodies for the HTTP surface.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ExtractedFields, Job, JobLogEntry, JobStatus};

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub file_url: String,
}

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct JobSummary {
    pub job_id: String,
    pub status: JobStatus,
    pub progress_percent: u8,
    pub original_filename: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Job> for JobSummary {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id.clone(),
            status: job.status,
            progress_percent: job.status.progress_percent(),
            original_filename: job.original_filename.clone(),
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListJobsResponse {
    pub jobs: Vec<JobSummary>,
}

/// Populated once OCR has produced text, regardless of how the job ends.
#[derive(Debug, Serialize)]
pub struct JobResult {
    pub raw_ocr_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_fields: Option<ExtractedFields>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_confidence: Option<HashMap<String, f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct JobView {
    pub job_id: String,
    pub user_id: String,
    pub status: JobStatus,
    pub progress_percent: u8,
    pub original_filename: String,
    pub file_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobView {
    pub fn from_job(job: Job, file_url: String, last_message: Option<String>) -> Self {
        let result = job.raw_ocr_text.map(|raw_ocr_text| JobResult {
            raw_ocr_text,
            extracted_fields: job.extracted_fields,
            field_confidence: job.field_confidence,
            warnings: job.warnings,
        });
        Self {
            job_id: job.id,
            user_id: job.user_id,
            status: job.status,
            progress_percent: job.status.progress_percent(),
            original_filename: job.original_filename,
            file_url,
            last_message,
            error_message: job.error_message,
            result,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LogLine {
    pub step: String,
    pub message: String,
    pub ts: DateTime<Utc>,
}

impl From<JobLogEntry> for LogLine {
    fn from(entry: JobLogEntry) -> Self {
        Self {
            step: entry.step,
            message: entry.message,
            ts: entry.ts,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LogsResponse {
    pub job_id: String,
    pub logs: Vec<LogLine>,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    #[serde(default)]
    pub extracted_fields: Option<ExtractedFields>,
}

#[derive(Debug, Serialize)]
pub struct ConfirmResponse {
    pub job_id: String,
    pub status: &'static str,
    pub created: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}
