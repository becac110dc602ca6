//! Run DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::pipeline::PipelineDefinition;
use crate::domain::run::{Run, RunId, RunStatus};

/// Request to start a new run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartRun {
    /// Pipeline to run; the default pipeline when omitted
    #[serde(default, alias = "job")]
    pub pipeline: Option<String>,
}

/// Response to a successful start request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStarted {
    pub message: String,
    pub run_id: RunId,
}

impl RunStarted {
    pub fn new(run_id: RunId) -> Self {
        Self {
            message: "started".to_string(),
            run_id,
        }
    }
}

/// Point-in-time, read-only view of a run for listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunView {
    pub id: RunId,
    pub pipeline_name: String,
    pub status: RunStatus,
    pub current_step_index: usize,
    /// Name of the step being executed, `None` once terminal
    pub current_step: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: u64,
    pub steps_completed: usize,
    pub total_steps: usize,
}

impl RunView {
    /// Builds the view of `run`, measuring running durations up to `now`
    pub fn from_run(run: &Run, pipeline: Option<&PipelineDefinition>, now: DateTime<Utc>) -> Self {
        let current_step = if run.is_terminal() {
            None
        } else {
            pipeline
                .and_then(|p| p.steps.get(run.current_step_index))
                .map(|s| s.name.clone())
        };

        Self {
            id: run.id,
            pipeline_name: run.pipeline_name.clone(),
            status: run.status,
            current_step_index: run.current_step_index,
            current_step,
            started_at: run.started_at,
            finished_at: run.finished_at,
            duration_ms: run.duration_at(now).num_milliseconds().max(0) as u64,
            steps_completed: run.step_results.len(),
            total_steps: pipeline.map(|p| p.steps.len()).unwrap_or(0),
        }
    }
}

/// Summary of a catalog entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    pub name: String,
    pub steps: Vec<String>,
}

impl From<&PipelineDefinition> for PipelineSummary {
    fn from(pipeline: &PipelineDefinition) -> Self {
        Self {
            name: pipeline.name.clone(),
            steps: pipeline.steps.iter().map(|s| s.name.clone()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pipeline::StepDefinition;

    #[test]
    fn test_start_run_accepts_job_alias() {
        let req: StartRun = serde_json::from_str(r#"{"job": "api-ci"}"#).unwrap();
        assert_eq!(req.pipeline.as_deref(), Some("api-ci"));

        let req: StartRun = serde_json::from_str("{}").unwrap();
        assert!(req.pipeline.is_none());
    }

    #[test]
    fn test_view_names_current_step_while_running() {
        let pipeline = PipelineDefinition::new(
            "p",
            vec![
                StepDefinition::new("checkout", 1, 1, 0.0),
                StepDefinition::new("lint", 1, 1, 0.0),
            ],
        );
        let started = Utc::now();
        let mut run = Run::start("p", started);
        run.current_step_index = 1;

        let view = RunView::from_run(&run, Some(&pipeline), started);
        assert_eq!(view.current_step.as_deref(), Some("lint"));
        assert_eq!(view.total_steps, 2);

        run.status = RunStatus::Success;
        run.finished_at = Some(started);
        let view = RunView::from_run(&run, Some(&pipeline), started);
        assert!(view.current_step.is_none());
    }
}
