use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PoscanError {
    #[error("Database error: {0}")]
    Database(#[from] libsql::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("OCR error: {0}")]
    Ocr(String),

    #[error("OCR unavailable: {0}")]
    OcrUnavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for PoscanError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            PoscanError::Database(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            PoscanError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            PoscanError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            PoscanError::Processing(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            PoscanError::Http(e) => (StatusCode::BAD_GATEWAY, e.to_string()),
            PoscanError::Json(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            PoscanError::Io(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            PoscanError::Ocr(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            PoscanError::OcrUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            PoscanError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({
            "error": message,
            "code": status.as_u16()
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, PoscanError>;
