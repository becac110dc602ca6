//! Health Check API Handler

use axum::{Json, extract::State};
use beacon_engine::Engine;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub runs_in_flight: usize,
}

/// GET /health
pub async fn health_check(State(engine): State<Engine>) -> Json<Health> {
    Json(Health {
        status: "ok",
        runs_in_flight: engine.in_flight(),
    })
}
