//! History domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::run::{Run, RunId, RunStatus, StepOutcome};

/// Immutable copy of a terminated run
///
/// Appended once when a run leaves `Running` and never edited afterwards.
/// The metrics aggregator works exclusively on these records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub run_id: RunId,
    pub pipeline_name: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub steps_executed: usize,
    pub failed_step: Option<String>,
}

impl HistoryRecord {
    /// Builds the record of `run` as finished at `finished_at`
    pub fn terminated(run: &Run, finished_at: DateTime<Utc>) -> Self {
        let duration_ms = (finished_at - run.started_at).num_milliseconds().max(0) as u64;
        let failed_step = run
            .step_results
            .iter()
            .find(|r| r.outcome == StepOutcome::Failed)
            .map(|r| r.name.clone());

        Self {
            run_id: run.id,
            pipeline_name: run.pipeline_name.clone(),
            status: run.status,
            started_at: run.started_at,
            finished_at,
            duration_ms,
            steps_executed: run.step_results.len(),
            failed_step,
        }
    }
}
