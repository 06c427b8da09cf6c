use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::AppState;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Leave headroom over the raw file cap for multipart framing.
    let body_limit = (state.config.storage.max_upload_bytes() as usize) + 64 * 1024;

    let api = Router::new()
        .route("/upload", post(handlers::upload::upload))
        .route("/jobs", get(handlers::jobs::list_jobs))
        .route("/job/{id}", get(handlers::jobs::get_job))
        .route("/job/{id}/logs", get(handlers::jobs::get_logs))
        .route("/job/{id}/stream", get(handlers::stream::job_stream))
        .route("/job/{id}/confirm", post(handlers::jobs::confirm));

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api", api)
        .nest_service(
            "/uploads",
            ServeDir::new(&state.config.storage.uploads_dir),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
