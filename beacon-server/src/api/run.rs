//! Run API Handlers
//!
//! HTTP endpoints for starting, listing and resetting runs.

use axum::{
    Json,
    extract::{Path, State},
};
use beacon_core::catalog::DEFAULT_PIPELINE;
use beacon_core::domain::run::RunId;
use beacon_core::dto::run::{PipelineSummary, RunStarted, RunView, StartRun};
use beacon_engine::Engine;
use serde::Serialize;

use crate::api::error::{ApiError, ApiResult};

/// Log text of one run
#[derive(Debug, Serialize)]
pub struct RunLogs {
    pub run_id: RunId,
    pub log: String,
}

#[derive(Debug, Serialize)]
pub struct Message {
    pub message: &'static str,
}

/// GET /api/pipelines
pub async fn list_pipelines(State(engine): State<Engine>) -> Json<Vec<PipelineSummary>> {
    Json(engine.pipelines())
}

/// POST /api/run
/// Start a run; the body may be empty to run the default pipeline
pub async fn start_run(
    State(engine): State<Engine>,
    req: Option<Json<StartRun>>,
) -> ApiResult<Json<RunStarted>> {
    let pipeline = req
        .and_then(|Json(req)| req.pipeline)
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_PIPELINE.to_string());

    tracing::info!("Starting run for pipeline: {}", pipeline);

    let run_id = engine.start_run(&pipeline).await?;

    Ok(Json(RunStarted::new(run_id)))
}

/// GET /api/builds
/// Live snapshot of tracked runs, most recent first
pub async fn list_builds(State(engine): State<Engine>) -> Json<Vec<RunView>> {
    Json(engine.snapshot())
}

/// GET /api/logs/{id}
pub async fn get_logs(
    State(engine): State<Engine>,
    Path(id): Path<String>,
) -> ApiResult<Json<RunLogs>> {
    let run_id: RunId = id
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid run id: {}", id)))?;

    tracing::debug!("Getting logs for run: {}", run_id);

    let lines = engine.run_logs(run_id)?;

    Ok(Json(RunLogs {
        run_id,
        log: lines.join("\n"),
    }))
}

/// POST /api/reset
/// Cancel every run and clear runs, history and logs
pub async fn reset(State(engine): State<Engine>) -> ApiResult<Json<Message>> {
    tracing::info!("Resetting all runs and history");

    engine.reset_all().await?;

    Ok(Json(Message {
        message: "reset done",
    }))
}
