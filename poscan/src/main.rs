use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use poscan::api::{create_router, AppState};
use poscan::config::{Config, DispatchMode};
use poscan::db::{Database, DatabaseBackend, LibSqlBackend};
use poscan::ocr::build_extractor;
use poscan::runner::{EventBus, JobRunner};

#[derive(Parser)]
#[command(name = "poscan")]
#[command(about = "Purchase-order OCR service")]
struct Args {
    /// Run as a standalone polling worker with no HTTP listener
    #[arg(long)]
    worker: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "poscan=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = Config::from_env();
    if args.worker {
        // Standalone workers share the store with the API process, so
        // the in-memory queue cannot reach them.
        config.worker.dispatch = DispatchMode::Polling;
    }

    tokio::fs::create_dir_all(&config.storage.uploads_dir).await?;

    tracing::info!("Initializing database...");
    let raw_db = Database::new(&config.database).await?;
    let db: Arc<dyn DatabaseBackend> = Arc::new(LibSqlBackend::new(raw_db));

    tracing::info!(mode = %config.ocr.mode, "Initializing OCR engine...");
    let ocr = build_extractor(&config.ocr);

    let config = Arc::new(config);
    let bus = EventBus::new();
    let runner = Arc::new(JobRunner::new(
        db.clone(),
        ocr,
        bus.clone(),
        &config,
    ));

    let cancel_token = CancellationToken::new();

    tracing::info!(
        workers = config.worker.count,
        dispatch = %config.worker.dispatch,
        "Starting workers..."
    );
    runner.start(&cancel_token).await?;

    if args.worker {
        tracing::info!("Worker mode: polling for queued jobs (no HTTP listener)");
        shutdown_signal(cancel_token.clone()).await;
        return Ok(());
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(config, db, runner, bus);
    let app = create_router(state);

    tracing::info!("Poscan starting on http://{}", addr);
    tracing::info!("  Health check: http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel_token))
        .await?;

    Ok(())
}

async fn shutdown_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, cancelling workers...");
    cancel_token.cancel();
}
