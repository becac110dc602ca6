//! Error types for the Beacon engine
//!
//! Step failures are simulated business outcomes and never show up here.

use beacon_core::domain::run::{RunId, RunStatus};
use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur while operating the engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// Run requested for a pipeline missing from the catalog
    #[error("Unknown pipeline: {0}")]
    UnknownPipeline(String),

    /// Run or log stream not present, usually a benign race with reset
    #[error("Run not found: {0}")]
    NotFound(RunId),

    /// Write issued against state that a reset already discarded
    #[error("Stale write for run {run_id} (generation {generation}, current {current})")]
    StaleGeneration {
        run_id: RunId,
        generation: u64,
        current: u64,
    },

    /// Status change that the run state machine does not allow
    #[error("Run {run_id} cannot move from {from} to {to}")]
    InvalidTransition {
        run_id: RunId,
        from: RunStatus,
        to: RunStatus,
    },

    /// Step result applied out of step order
    #[error("Run {run_id} expected step {expected}, got step {got}")]
    OutOfOrderStep {
        run_id: RunId,
        expected: usize,
        got: usize,
    },

    /// Concurrency limit reached
    #[error("Too many runs in flight (limit {0})")]
    AtCapacity(usize),

    /// Append to the log of a run that already terminated
    #[error("Log of run {0} is frozen")]
    LogFrozen(RunId),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid catalog: {0}")]
    InvalidCatalog(String),

    /// Durable history mirror failed; in-memory state is unaffected
    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl EngineError {
    /// Check if this error means the write belonged to discarded state
    ///
    /// Such errors are dropped by executors instead of being surfaced.
    pub fn is_abandoned(&self) -> bool {
        matches!(self, Self::StaleGeneration { .. } | Self::NotFound(_))
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Persistence(err.to_string())
    }
}
