//! `api` crate — HTTP trigger surface for the execution engine.
//!
//! Exposes:
//!   POST   /api/v1/workflows/{id}/executions
//!   POST   /api/v1/executions/{id}/run
//!   GET    /api/v1/executions/{id}
//!   GET    /api/v1/executions/{id}/steps
//!   GET    /health

pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

pub use handlers::{ApiError, AppState};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/api/v1/workflows/{id}/executions",
            post(handlers::executions::create),
        )
        .route("/api/v1/executions/{id}", get(handlers::executions::get))
        .route("/api/v1/executions/{id}/run", post(handlers::executions::run))
        .route("/api/v1/executions/{id}/steps", get(handlers::executions::steps))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve the API on `bind` until Ctrl-C.
pub async fn serve(bind: &str, state: AppState) -> std::io::Result<()> {
    let listener = TcpListener::bind(bind).await?;
    info!(bind = %bind, "API listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    info!("API shut down");
    Ok(())
}
