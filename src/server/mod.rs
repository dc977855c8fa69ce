//! Web surface
//!
//! One upload endpoint backed by the shared `Dispatcher`, a stats endpoint,
//! and read access to stored uploads and results.

pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::AppConfig;
use crate::detector::Dispatcher;
pub use state::{AppState, SharedState};

/// Room for multipart boundaries and the text fields around the file
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn router(state: SharedState) -> Router {
    let body_limit = state
        .config
        .max_upload_bytes
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/api/detect", post(routes::detect::detect_disease))
        .route("/api/stats", get(routes::stats::get_stats))
        .route("/results/:filename", get(routes::files::get_result))
        .route("/uploads/:filename", get(routes::files::get_upload))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
}

/// Bind and serve until the process is stopped
pub async fn serve(config: AppConfig, dispatcher: Dispatcher) -> anyhow::Result<()> {
    config.init_directories()?;

    info!("Field patrol web service v{}", env!("CARGO_PKG_VERSION"));
    info!("  Upload dir:  {:?}", config.upload_dir);
    info!("  Results dir: {:?}", config.results_dir);
    info!(
        "  Remote:      {}",
        if dispatcher.remote_available() {
            "configured"
        } else {
            "not configured (synthetic only)"
        }
    );

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    info!("Starting server on http://{}", listener.local_addr()?);

    let state = Arc::new(AppState::new(config, dispatcher));
    axum::serve(listener, router(state)).await?;

    Ok(())
}
