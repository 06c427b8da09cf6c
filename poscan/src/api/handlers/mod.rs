pub mod jobs;
pub mod stream;
pub mod upload;

use axum::Json;

use crate::api::dto::HealthResponse;

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
