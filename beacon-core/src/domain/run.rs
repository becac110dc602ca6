//! Run domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier of a run
///
/// Assigned at creation and never reused, not even across resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// One execution of a pipeline definition
///
/// Mutated only by the executor bound to its id, read by everyone else
/// through snapshots. Immutable once `status` is terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub pipeline_name: String,
    pub status: RunStatus,
    /// Index of the step being executed; only meaningful while running
    pub current_step_index: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub step_results: Vec<StepResult>,
}

impl Run {
    /// Creates a freshly started run
    pub fn start(pipeline_name: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            id: RunId::new(),
            pipeline_name: pipeline_name.into(),
            status: RunStatus::Running,
            current_step_index: 0,
            started_at,
            finished_at: None,
            step_results: Vec::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Elapsed time, measured up to `now` while the run is still going
    pub fn duration_at(&self, now: DateTime<Utc>) -> chrono::Duration {
        let end = self.finished_at.unwrap_or(now);
        (end - self.started_at).max(chrono::Duration::zero())
    }
}

/// Run execution status
///
/// `Running` is the only non-terminal state and the only one with outgoing
/// transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Success,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Running => write!(f, "running"),
            RunStatus::Success => write!(f, "success"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Result of one executed step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    pub name: String,
    pub duration_ms: u64,
    pub outcome: StepOutcome,
}

/// Simulated business outcome of a step
///
/// A failed step is a normal outcome of a run, not an error of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepOutcome {
    Passed,
    Failed,
}

impl std::fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepOutcome::Passed => write!(f, "passed"),
            StepOutcome::Failed => write!(f, "failed"),
        }
    }
}
