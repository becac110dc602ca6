//! Run executor
//!
//! Drives exactly one run from `Running` to a terminal status:
//! - Walks the pipeline's steps in order
//! - Sleeps for a drawn duration, then draws the step's outcome
//! - Logs the step and records its result in the store
//! - Stops at the first failed step; succeeds when every step passed
//!
//! There is no retry and no rollback. Completion is observed through the
//! store only. Once a reset has discarded the run, every further write is
//! rejected by the store or the log sink and the executor quietly stops.

use beacon_core::domain::history::HistoryRecord;
use beacon_core::domain::log::LogEntry;
use beacon_core::domain::pipeline::{PipelineDefinition, StepDefinition};
use beacon_core::domain::run::{RunId, RunStatus, StepOutcome, StepResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::error::{EngineError, Result};
use crate::provider::{Chance, Clock};
use crate::repository::{HistoryMirror, LogSink, RunLease, RunStore};

/// Executes runs against the shared store, log sink and history mirror
pub struct RunExecutor {
    store: Arc<RunStore>,
    logs: Arc<LogSink>,
    mirror: Arc<HistoryMirror>,
    clock: Arc<dyn Clock>,
    chance: Arc<dyn Chance>,
}

impl RunExecutor {
    pub fn new(
        store: Arc<RunStore>,
        logs: Arc<LogSink>,
        mirror: Arc<HistoryMirror>,
        clock: Arc<dyn Clock>,
        chance: Arc<dyn Chance>,
    ) -> Self {
        Self {
            store,
            logs,
            mirror,
            clock,
            chance,
        }
    }

    /// Runs `pipeline` for the leased run until it terminates or is abandoned
    pub async fn execute(&self, pipeline: &PipelineDefinition, lease: RunLease) {
        let run_id = lease.run_id;

        match self.drive(pipeline, &lease).await {
            Ok(status) => info!("Run {} finished with status: {}", run_id, status),
            Err(e) if e.is_abandoned() => {
                debug!("Run {} abandoned after reset: {}", run_id, e);
            }
            Err(EngineError::Persistence(msg)) => {
                warn!("Run {} finished but history mirror failed: {}", run_id, msg);
            }
            Err(e) => error!("Run {} stopped unexpectedly: {}", run_id, e),
        }
    }

    async fn drive(&self, pipeline: &PipelineDefinition, lease: &RunLease) -> Result<RunStatus> {
        let run_id = lease.run_id;

        self.log(
            run_id,
            format!("Run {} started (pipeline={})", run_id, pipeline.name),
        )?;

        for (index, step) in pipeline.steps.iter().enumerate() {
            let result = self.run_step(run_id, step).await?;

            debug!(
                "Run {} step {}/{} '{}' {} in {} ms",
                run_id,
                index + 1,
                pipeline.steps.len(),
                step.name,
                result.outcome,
                result.duration_ms
            );

            if result.outcome == StepOutcome::Failed {
                self.log_error(
                    run_id,
                    format!("Run {} finished with status={}", run_id, RunStatus::Failed),
                )?;

                let terminated = self.store.update_run_step(lease, index, result)?;
                let finalized = self.store.finalize_run(lease, RunStatus::Failed)?;
                if let Some(record) = terminated.or(finalized) {
                    self.persist(lease, &record).await?;
                }

                return Ok(RunStatus::Failed);
            }

            self.store.update_run_step(lease, index, result)?;
        }

        self.log(
            run_id,
            format!("Run {} finished with status={}", run_id, RunStatus::Success),
        )?;

        if let Some(record) = self.store.finalize_run(lease, RunStatus::Success)? {
            self.persist(lease, &record).await?;
        }

        Ok(RunStatus::Success)
    }

    async fn run_step(&self, run_id: RunId, step: &StepDefinition) -> Result<StepResult> {
        self.log(run_id, format!("Step '{}' started", step.name))?;

        let duration_ms = self
            .chance
            .pick(step.min_duration_ms, step.max_duration_ms);
        self.clock.sleep(Duration::from_millis(duration_ms)).await;

        self.log(run_id, step_output(&step.name, self.chance.as_ref()))?;

        let outcome = if self.chance.roll(step.failure_probability) {
            self.log_error(
                run_id,
                format!("Step '{}' FAILED after {} ms", step.name, duration_ms),
            )?;
            StepOutcome::Failed
        } else {
            self.log(
                run_id,
                format!("Step '{}' OK in {} ms", step.name, duration_ms),
            )?;
            StepOutcome::Passed
        };

        Ok(StepResult {
            name: step.name.clone(),
            duration_ms,
            outcome,
        })
    }

    async fn persist(&self, lease: &RunLease, record: &HistoryRecord) -> Result<()> {
        self.mirror.append(lease.generation, record).await
    }

    fn log(&self, run_id: RunId, message: String) -> Result<()> {
        self.logs
            .append(run_id, LogEntry::info(self.clock.now(), message))
    }

    fn log_error(&self, run_id: RunId, message: String) -> Result<()> {
        self.logs
            .append(run_id, LogEntry::error(self.clock.now(), message))
    }
}

/// Simulated console output of a step
pub fn step_output(step: &str, chance: &dyn Chance) -> String {
    match step {
        "checkout" => "Checked out repository".to_string(),
        "install-deps" => "Dependencies installed successfully".to_string(),
        "lint" => "Lint: 0 errors, 0 warnings".to_string(),
        "unit-tests" => format!("Unit tests: {} passed", chance.pick(80, 220)),
        "integration-tests" => format!("Integration tests: {} passed", chance.pick(25, 90)),
        "security-scan" => {
            let issues = [0, 0, 1, 2, 3][chance.pick(0, 4) as usize];
            format!(
                "Security scan: found {} issues (sev: low/med/high mixed)",
                issues
            )
        }
        "build-artifact" => "Build artifact created: dist/app.zip".to_string(),
        "docker-build" => "Docker build: image tagged 'app:latest'".to_string(),
        s if s.starts_with("deploy") => "Deploy: rollout completed, healthcheck OK".to_string(),
        _ => "Step completed".to_string(),
    }
}
