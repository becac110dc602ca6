//! API Module
//!
//! HTTP API layer over the run engine.
//! Each submodule handles endpoints for a specific concern.

pub mod error;
pub mod health;
pub mod metrics;
pub mod run;

use axum::{
    Router,
    routing::{get, post},
};
use beacon_engine::Engine;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Create the main API router with all endpoints
pub fn create_router(engine: Engine) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Run endpoints
        .route("/api/pipelines", get(run::list_pipelines))
        .route("/api/run", post(run::start_run))
        .route("/api/builds", get(run::list_builds))
        .route("/api/logs/{id}", get(run::get_logs))
        .route("/api/reset", post(run::reset))
        // Metrics endpoints
        .route("/api/history", get(metrics::history))
        .route("/api/history/download", get(metrics::download_history))
        .route("/api/stats", get(metrics::stats))
        // Add state and middleware
        .with_state(engine)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
