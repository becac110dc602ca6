//! Metrics API Handlers
//!
//! History and aggregated dashboard statistics.

use axum::{
    Json,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use beacon_core::domain::history::HistoryRecord;
use beacon_core::domain::stats::Stats;
use beacon_engine::Engine;

use crate::api::error::{ApiError, ApiResult};

/// GET /api/stats
pub async fn stats(State(engine): State<Engine>) -> Json<Stats> {
    Json(engine.current_stats())
}

/// GET /api/history
pub async fn history(State(engine): State<Engine>) -> Json<Vec<HistoryRecord>> {
    Json(engine.history())
}

/// GET /api/history/download
/// History as an attached, pretty-printed JSON file
pub async fn download_history(State(engine): State<Engine>) -> ApiResult<Response> {
    let payload = serde_json::to_string_pretty(&engine.history())
        .map_err(|e| ApiError::InternalError(format!("Failed to encode history: {}", e)))?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/json"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=history.json",
            ),
        ],
        payload,
    )
        .into_response())
}
