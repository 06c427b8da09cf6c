//! Job inspection and confirmation handlers.

use axum::extract::{Path, Query, State};
use axum::Json;
use tracing::info;

use crate::api::dto::{
    ConfirmRequest, ConfirmResponse, JobView, ListJobsQuery, ListJobsResponse, LogsResponse,
};
use crate::api::state::AppState;
use crate::error::{PoscanError, Result};
use crate::models::{Job, JobLogEntry};

fn file_url(job: &Job) -> String {
    format!("/uploads/{}/{}", job.id, job.original_filename)
}

/// `GET /api/jobs?user_id=`
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListJobsQuery>,
) -> Result<Json<ListJobsResponse>> {
    let jobs = state.db.list_jobs_by_user(&query.user_id).await?;
    Ok(Json(ListJobsResponse {
        jobs: jobs.iter().map(Into::into).collect(),
    }))
}

/// `GET /api/job/{id}`
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobView>> {
    let job = state
        .db
        .get_job(&id)
        .await?
        .ok_or_else(|| PoscanError::NotFound(format!("Job {id} not found")))?;
    let last_message = state.db.latest_log(&id).await?.map(|entry| entry.message);
    let url = file_url(&job);
    Ok(Json(JobView::from_job(job, url, last_message)))
}

/// `GET /api/job/{id}/logs`
pub async fn get_logs(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<LogsResponse>> {
    if state.db.get_job(&id).await?.is_none() {
        return Err(PoscanError::NotFound(format!("Job {id} not found")));
    }
    let logs = state.db.list_logs(&id).await?;
    Ok(Json(LogsResponse {
        job_id: id,
        logs: logs.into_iter().map(Into::into).collect(),
    }))
}

/// `POST /api/job/{id}/confirm`
///
/// Persists the purchase-order record for a job, either from the
/// corrected fields in the body or from the fields OCR extracted.
pub async fn confirm(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ConfirmRequest>,
) -> Result<Json<ConfirmResponse>> {
    let job = state
        .db
        .get_job(&id)
        .await?
        .ok_or_else(|| PoscanError::NotFound(format!("Job {id} not found")))?;

    let fields = match req.extracted_fields {
        Some(fields) => fields,
        None => job.extracted_fields.ok_or_else(|| {
            PoscanError::Validation("Job has no extracted fields to confirm".to_string())
        })?,
    };
    fields.validate()?;

    let created = state.runner.save_record(&id, &fields).await?;
    state
        .db
        .append_log(&JobLogEntry::new(
            &id,
            "saving",
            if created {
                "record confirmed and saved"
            } else {
                "record confirmed, existing record replaced"
            },
        ))
        .await?;
    info!(job_id = %id, created, "Record confirmed");

    Ok(Json(ConfirmResponse {
        job_id: id,
        status: "saved",
        created,
    }))
}
