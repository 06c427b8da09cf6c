//! Purchase-order upload: validates the file, stores it on disk, and
//! queues a new job.

use std::path::Path as FsPath;

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use tracing::info;
use uuid::Uuid;

use crate::api::dto::UploadResponse;
use crate::api::state::AppState;
use crate::error::{PoscanError, Result};
use crate::models::{Job, JobLogEntry};

/// Strip any path components a client may have smuggled into the
/// uploaded filename.
fn sanitize_filename(name: &str) -> Result<String> {
    let base = FsPath::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| PoscanError::Validation("Invalid filename".to_string()))?;
    if base.is_empty() || base == "." || base == ".." {
        return Err(PoscanError::Validation("Invalid filename".to_string()));
    }
    Ok(base)
}

fn validate_extension(filename: &str, allowed: &[String]) -> Result<()> {
    let lower = filename.to_lowercase();
    if allowed.iter().any(|ext| lower.ends_with(ext.as_str())) {
        return Ok(());
    }
    Err(PoscanError::Validation(format!(
        "Unsupported file type; allowed extensions: {}",
        allowed.join(", ")
    )))
}

/// `POST /api/upload`
///
/// Multipart form with `user_id` and `file`. Returns 202 with the new
/// job id; the pipeline runs asynchronously.
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>)> {
    let mut user_id: Option<String> = None;
    let mut file_name: Option<String> = None;
    let mut file_bytes: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| PoscanError::Validation(format!("Malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "user_id" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| PoscanError::Validation(format!("Invalid user_id: {e}")))?;
                user_id = Some(value);
            }
            "file" => {
                if let Some(name) = field.file_name() {
                    file_name = Some(name.to_string());
                }
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| PoscanError::Validation(format!("Failed to read file: {e}")))?;
                file_bytes = Some(bytes.to_vec());
            }
            _ => {}
        }
    }

    let user_id = user_id
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| PoscanError::Validation("Missing required 'user_id' field".to_string()))?;
    let bytes = file_bytes
        .ok_or_else(|| PoscanError::Validation("Missing required 'file' field".to_string()))?;
    let file_name = file_name
        .ok_or_else(|| PoscanError::Validation("Uploaded file has no filename".to_string()))?;

    if bytes.is_empty() {
        return Err(PoscanError::Validation("Uploaded file is empty".to_string()));
    }
    let max_bytes = state.config.storage.max_upload_bytes();
    if bytes.len() as u64 > max_bytes {
        return Err(PoscanError::Validation(format!(
            "File too large: {} bytes (max {} bytes)",
            bytes.len(),
            max_bytes
        )));
    }

    let file_name = sanitize_filename(&file_name)?;
    validate_extension(&file_name, &state.config.storage.allowed_extensions)?;

    // Extension checks are advisory; the content has to actually be an image.
    let is_image = infer::get(&bytes)
        .map(|kind| kind.matcher_type() == infer::MatcherType::Image)
        .unwrap_or(false);
    if !is_image {
        return Err(PoscanError::Validation(
            "File content is not a recognized image".to_string(),
        ));
    }

    let job_id = Uuid::new_v4().to_string();
    let job_dir = FsPath::new(&state.config.storage.uploads_dir).join(&job_id);
    tokio::fs::create_dir_all(&job_dir).await?;
    let file_path = job_dir.join(&file_name);
    tokio::fs::write(&file_path, &bytes).await?;

    let job = Job::new(
        job_id.clone(),
        user_id.clone(),
        file_path.to_string_lossy().into_owned(),
        file_name.clone(),
    );
    state.db.create_job(&job).await?;
    state
        .db
        .append_log(&JobLogEntry::new(&job_id, "queued", "job created and queued"))
        .await?;
    state.runner.enqueue(&job_id);

    info!(job_id = %job_id, user_id = %user_id, filename = %file_name, "Upload accepted");

    let file_url = format!("/uploads/{job_id}/{file_name}");
    Ok((
        StatusCode::ACCEPTED,
        Json(UploadResponse {
            job_id,
            status: job.status,
            file_url,
        }),
    ))
}
