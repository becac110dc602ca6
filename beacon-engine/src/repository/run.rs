//! Run state store
//!
//! Authoritative in-memory map of live runs plus the append-only history of
//! terminated runs.
//!
//! Locking:
//! - `state` guards the run map, the snapshot order and the generation.
//!   Per-run operations only take it for reading; `create_run` and `reset`
//!   take it for writing.
//! - Every run sits behind its own lock, so writers on different runs do not
//!   block each other and readers always copy a consistent run.
//! - `history` is a single append point, only touched while the owning run's
//!   lock is held, which makes the terminal transition and the history append
//!   one atomic step.
//!
//! Every write carries the generation it was issued under. A reset bumps the
//! generation, so writes from abandoned executors fail with
//! `StaleGeneration` and never reach fresh state.

use beacon_core::domain::history::HistoryRecord;
use beacon_core::domain::run::{Run, RunId, RunStatus, StepOutcome, StepResult};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::debug;

use crate::config::DEFAULT_SNAPSHOT_LIMIT;
use crate::error::{EngineError, Result};
use crate::provider::Clock;
use crate::repository::log::LogSink;

/// Write permission for one run, bound to the generation it was created in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunLease {
    pub run_id: RunId,
    pub generation: u64,
}

#[derive(Default)]
struct StoreState {
    generation: u64,
    runs: HashMap<RunId, Arc<RwLock<Run>>>,
    /// Creation order, oldest first
    order: VecDeque<RunId>,
}

/// In-memory run store
pub struct RunStore {
    state: RwLock<StoreState>,
    history: Mutex<Vec<HistoryRecord>>,
    logs: Arc<LogSink>,
    clock: Arc<dyn Clock>,
    snapshot_limit: usize,
}

impl RunStore {
    pub fn new(clock: Arc<dyn Clock>, logs: Arc<LogSink>) -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            history: Mutex::new(Vec::new()),
            logs,
            clock,
            snapshot_limit: DEFAULT_SNAPSHOT_LIMIT,
        }
    }

    pub fn with_snapshot_limit(mut self, limit: usize) -> Self {
        self.snapshot_limit = limit.max(1);
        self
    }

    /// Creates a running run and opens its log stream
    pub fn create_run(&self, pipeline_name: &str) -> (Run, RunLease) {
        let mut state = self.state.write();
        let run = Run::start(pipeline_name, self.clock.now());
        let lease = RunLease {
            run_id: run.id,
            generation: state.generation,
        };

        self.logs.open(run.id);
        state
            .runs
            .insert(run.id, Arc::new(RwLock::new(run.clone())));
        state.order.push_back(run.id);
        self.evict_finished(&mut state);

        (run, lease)
    }

    /// Records the result of the step at `step_index`
    ///
    /// Steps must be applied in order. A passing step moves the run to the
    /// next index. A failing step keeps the index on the failed step and
    /// terminates the run as `Failed` in the same critical section, so no
    /// reader ever sees a running run whose results outnumber its index.
    /// Returns the history record when the step terminated the run.
    pub fn update_run_step(
        &self,
        lease: &RunLease,
        step_index: usize,
        result: StepResult,
    ) -> Result<Option<HistoryRecord>> {
        let state = self.state.read();
        let run = Self::leased_run(&state, lease)?;
        let mut run = run.write();

        if run.is_terminal() {
            return Err(EngineError::InvalidTransition {
                run_id: run.id,
                from: run.status,
                to: RunStatus::Running,
            });
        }

        let expected = run.step_results.len();
        if step_index != expected {
            return Err(EngineError::OutOfOrderStep {
                run_id: run.id,
                expected,
                got: step_index,
            });
        }

        let outcome = result.outcome;
        run.step_results.push(result);

        match outcome {
            StepOutcome::Passed => {
                run.current_step_index = step_index + 1;
                Ok(None)
            }
            StepOutcome::Failed => {
                run.current_step_index = step_index;
                Ok(Some(self.terminate(&mut run, RunStatus::Failed)))
            }
        }
    }

    /// Moves the run to its terminal status and appends its history record
    ///
    /// Idempotent: finalizing an already-terminal run with the same outcome
    /// does nothing and returns `None`. A different outcome is rejected.
    pub fn finalize_run(
        &self,
        lease: &RunLease,
        outcome: RunStatus,
    ) -> Result<Option<HistoryRecord>> {
        let state = self.state.read();
        let run = Self::leased_run(&state, lease)?;
        let mut run = run.write();

        if outcome == RunStatus::Running || (run.is_terminal() && run.status != outcome) {
            return Err(EngineError::InvalidTransition {
                run_id: run.id,
                from: run.status,
                to: outcome,
            });
        }

        if run.is_terminal() {
            debug!("Run {} already finalized as {}", run.id, run.status);
            return Ok(None);
        }

        if outcome == RunStatus::Success {
            run.current_step_index = run.step_results.len();
        }

        Ok(Some(self.terminate(&mut run, outcome)))
    }

    /// Copies of all tracked runs, most recent first
    pub fn get_snapshot(&self) -> Vec<Run> {
        let state = self.state.read();
        state
            .order
            .iter()
            .rev()
            .filter_map(|id| state.runs.get(id))
            .map(|run| run.read().clone())
            .collect()
    }

    pub fn get_run(&self, run_id: RunId) -> Option<Run> {
        let state = self.state.read();
        state.runs.get(&run_id).map(|run| run.read().clone())
    }

    /// All history records in append order
    pub fn get_history(&self) -> Vec<HistoryRecord> {
        self.history.lock().clone()
    }

    /// Seeds history from a durable mirror at startup
    pub fn restore_history(&self, records: Vec<HistoryRecord>) {
        let _state = self.state.read();
        let mut history = self.history.lock();
        history.extend(records);
    }

    /// Clears runs, history and logs, returning the new generation
    ///
    /// Waits for any in-progress run write to finish; every lease handed out
    /// before the reset is stale afterwards.
    pub fn reset(&self) -> u64 {
        let mut state = self.state.write();
        state.generation += 1;
        state.runs.clear();
        state.order.clear();
        self.history.lock().clear();
        self.logs.clear();
        state.generation
    }

    pub fn len(&self) -> usize {
        self.state.read().runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().runs.is_empty()
    }

    fn leased_run(state: &StoreState, lease: &RunLease) -> Result<Arc<RwLock<Run>>> {
        if lease.generation != state.generation {
            return Err(EngineError::StaleGeneration {
                run_id: lease.run_id,
                generation: lease.generation,
                current: state.generation,
            });
        }

        state
            .runs
            .get(&lease.run_id)
            .cloned()
            .ok_or(EngineError::NotFound(lease.run_id))
    }

    /// Terminal transition; the caller holds the run's write lock
    fn terminate(&self, run: &mut Run, outcome: RunStatus) -> HistoryRecord {
        let finished_at = self.clock.now().max(run.started_at);
        run.status = outcome;
        run.finished_at = Some(finished_at);

        let record = HistoryRecord::terminated(run, finished_at);
        self.history.lock().push(record.clone());
        self.logs.freeze(run.id);
        record
    }

    /// Drops the oldest terminal runs beyond the snapshot limit, along with
    /// their log streams
    fn evict_finished(&self, state: &mut StoreState) {
        let mut excess = state.runs.len().saturating_sub(self.snapshot_limit);
        if excess == 0 {
            return;
        }

        let StoreState { runs, order, .. } = state;
        order.retain(|id| {
            if excess == 0 {
                return true;
            }
            let finished = runs.get(id).is_none_or(|run| run.read().is_terminal());
            if finished {
                runs.remove(id);
                self.logs.remove(*id);
                excess -= 1;
                false
            } else {
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::FakeClock;
    use chrono::TimeZone;
    use std::time::Duration;

    fn store_with_clock() -> (RunStore, FakeClock, Arc<LogSink>) {
        let clock = FakeClock::new(chrono::Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap());
        let logs = Arc::new(LogSink::new());
        let store = RunStore::new(Arc::new(clock.clone()), Arc::clone(&logs));
        (store, clock, logs)
    }

    fn passed(name: &str) -> StepResult {
        StepResult {
            name: name.to_string(),
            duration_ms: 10,
            outcome: StepOutcome::Passed,
        }
    }

    fn failed(name: &str) -> StepResult {
        StepResult {
            name: name.to_string(),
            duration_ms: 10,
            outcome: StepOutcome::Failed,
        }
    }

    #[test]
    fn test_create_run_starts_running() {
        let (store, _, logs) = store_with_clock();
        let (run, lease) = store.create_run("app-ci");

        assert_eq!(run.status, RunStatus::Running);
        assert_eq!(run.current_step_index, 0);
        assert_eq!(lease.run_id, run.id);
        assert_eq!(lease.generation, 0);
        assert_eq!(store.get_snapshot().len(), 1);
        assert!(logs.read_all(run.id).unwrap().is_empty());
    }

    #[test]
    fn test_snapshot_is_most_recent_first() {
        let (store, _, _) = store_with_clock();
        let (a, _) = store.create_run("app-ci");
        let (b, _) = store.create_run("api-ci");
        let (c, _) = store.create_run("app-ci");

        let ids: Vec<RunId> = store.get_snapshot().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![c.id, b.id, a.id]);
    }

    #[test]
    fn test_steps_advance_index_in_order() {
        let (store, _, _) = store_with_clock();
        let (run, lease) = store.create_run("app-ci");

        store.update_run_step(&lease, 0, passed("checkout")).unwrap();
        store.update_run_step(&lease, 1, passed("lint")).unwrap();

        let run = store.get_run(run.id).unwrap();
        assert_eq!(run.current_step_index, 2);
        assert_eq!(run.step_results.len(), 2);
    }

    #[test]
    fn test_out_of_order_step_rejected() {
        let (store, _, _) = store_with_clock();
        let (_, lease) = store.create_run("app-ci");

        let result = store.update_run_step(&lease, 1, passed("lint"));
        assert!(matches!(
            result,
            Err(EngineError::OutOfOrderStep {
                expected: 0,
                got: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_finalize_success_sets_finished_at_and_appends_history() {
        let (store, clock, logs) = store_with_clock();
        let (run, lease) = store.create_run("app-ci");
        clock.advance(Duration::from_secs(3));
        store.update_run_step(&lease, 0, passed("checkout")).unwrap();

        let record = store
            .finalize_run(&lease, RunStatus::Success)
            .unwrap()
            .unwrap();
        assert_eq!(record.status, RunStatus::Success);
        assert_eq!(record.duration_ms, 3000);

        let run = store.get_run(run.id).unwrap();
        assert_eq!(run.status, RunStatus::Success);
        assert_eq!(run.current_step_index, 1);
        assert!(run.finished_at.is_some());
        assert_eq!(store.get_history().len(), 1);
        assert!(logs.is_frozen(run.id).unwrap());
    }

    #[test]
    fn test_failed_step_terminates_run_atomically() {
        let (store, _, _) = store_with_clock();
        let (run, lease) = store.create_run("api-ci");
        store.update_run_step(&lease, 0, passed("checkout")).unwrap();
        store.update_run_step(&lease, 1, passed("unit-tests")).unwrap();

        let record = store
            .update_run_step(&lease, 2, failed("security-scan"))
            .unwrap()
            .unwrap();
        assert_eq!(record.failed_step.as_deref(), Some("security-scan"));

        let run = store.get_run(run.id).unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.current_step_index, 2);
        assert_eq!(run.step_results.len(), 3);

        // the executor's follow-up finalize is a no-op
        assert!(store
            .finalize_run(&lease, RunStatus::Failed)
            .unwrap()
            .is_none());
        assert_eq!(store.get_history().len(), 1);
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let (store, _, _) = store_with_clock();
        let (_, lease) = store.create_run("app-ci");

        assert!(store
            .finalize_run(&lease, RunStatus::Success)
            .unwrap()
            .is_some());
        assert!(store
            .finalize_run(&lease, RunStatus::Success)
            .unwrap()
            .is_none());
        assert_eq!(store.get_history().len(), 1);
    }

    #[test]
    fn test_terminal_status_never_changes() {
        let (store, _, _) = store_with_clock();
        let (_, lease) = store.create_run("app-ci");
        store.finalize_run(&lease, RunStatus::Failed).unwrap();

        assert!(matches!(
            store.finalize_run(&lease, RunStatus::Success),
            Err(EngineError::InvalidTransition { .. })
        ));
        assert!(matches!(
            store.finalize_run(&lease, RunStatus::Running),
            Err(EngineError::InvalidTransition { .. })
        ));
        assert!(matches!(
            store.update_run_step(&lease, 0, passed("checkout")),
            Err(EngineError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_reset_clears_everything_and_stales_leases() {
        let (store, _, logs) = store_with_clock();
        let (run, lease) = store.create_run("app-ci");
        store.finalize_run(&lease, RunStatus::Success).unwrap();
        let (_, running) = store.create_run("app-ci");

        let generation = store.reset();
        assert_eq!(generation, 1);
        assert!(store.get_snapshot().is_empty());
        assert!(store.get_history().is_empty());
        assert!(logs.read_all(run.id).is_err());

        let result = store.update_run_step(&running, 0, passed("checkout"));
        assert!(matches!(result, Err(EngineError::StaleGeneration { .. })));
        let result = store.finalize_run(&running, RunStatus::Success);
        assert!(matches!(result, Err(EngineError::StaleGeneration { .. })));
        assert!(store.get_history().is_empty());
    }

    #[test]
    fn test_eviction_keeps_running_runs_and_drops_logs() {
        let (store, _, logs) = store_with_clock();
        let store = store.with_snapshot_limit(2);

        let (old, old_lease) = store.create_run("app-ci");
        store.finalize_run(&old_lease, RunStatus::Success).unwrap();
        let (running, _) = store.create_run("app-ci");
        let (newest, _) = store.create_run("app-ci");

        let ids: Vec<RunId> = store.get_snapshot().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![newest.id, running.id]);
        assert_eq!(store.get_history().len(), 1);
        assert!(matches!(
            logs.read_all(old.id),
            Err(EngineError::NotFound(_))
        ));
        assert_eq!(logs.len(), 2);

        // nothing finished to evict, so the snapshot may exceed the limit
        store.create_run("app-ci");
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_restore_history() {
        let (store, _, _) = store_with_clock();
        let (_, lease) = store.create_run("app-ci");
        let record = store
            .finalize_run(&lease, RunStatus::Success)
            .unwrap()
            .unwrap();

        let (fresh, _, _) = store_with_clock();
        fresh.restore_history(vec![record.clone()]);
        assert_eq!(fresh.get_history(), vec![record]);
    }
}
