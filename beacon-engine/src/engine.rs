//! Engine facade
//!
//! The single entry point used by the HTTP layer. Owns the catalog, the run
//! store, the log sink, the history mirror and the registry of in-flight
//! executor tasks.
//!
//! `start_run` and `reset_all` are ordered by a lifecycle lock: a run either
//! is created and its task registered before a reset begins, or it starts
//! after the reset against fresh state. No run is ever half visible in both.

use beacon_core::catalog::Catalog;
use beacon_core::domain::history::HistoryRecord;
use beacon_core::domain::run::{Run, RunId};
use beacon_core::domain::stats::Stats;
use beacon_core::dto::run::{PipelineSummary, RunView};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{RwLock, Semaphore};
use tracing::info;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::provider::{Chance, Clock, RandomChance, SystemClock};
use crate::repository::{HistoryBackend, HistoryMirror, LogSink, MemoryHistory, RunStore};
use crate::service::{RunExecutor, RunRegistry, compute_stats};

/// Handle to a running engine; cheap to clone
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    catalog: Catalog,
    config: EngineConfig,
    store: Arc<RunStore>,
    logs: Arc<LogSink>,
    mirror: Arc<HistoryMirror>,
    executor: Arc<RunExecutor>,
    registry: RunRegistry,
    clock: Arc<dyn Clock>,
    lifecycle: RwLock<()>,
    permits: Option<Arc<Semaphore>>,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Starts a run of `pipeline_name` and returns its id immediately
    ///
    /// The run executes on its own task; progress is observed through
    /// [`Engine::snapshot`].
    pub async fn start_run(&self, pipeline_name: &str) -> Result<RunId> {
        let inner = &self.inner;
        let pipeline = inner
            .catalog
            .get(pipeline_name)
            .cloned()
            .ok_or_else(|| EngineError::UnknownPipeline(pipeline_name.to_string()))?;

        let _lifecycle = inner.lifecycle.read().await;

        let permit = match &inner.permits {
            Some(permits) => Some(Arc::clone(permits).try_acquire_owned().map_err(|_| {
                EngineError::AtCapacity(inner.config.max_concurrent_runs.unwrap_or_default())
            })?),
            None => None,
        };

        let (run, lease) = inner.store.create_run(&pipeline.name);
        info!("Run {} started for pipeline: {}", run.id, pipeline.name);

        let executor = Arc::clone(&inner.executor);
        inner.registry.spawn(run.id, async move {
            let _permit = permit;
            executor.execute(&pipeline, lease).await;
        });

        Ok(run.id)
    }

    /// Point-in-time views of all tracked runs, most recent first
    pub fn snapshot(&self) -> Vec<RunView> {
        let now = self.inner.clock.now();
        self.inner
            .store
            .get_snapshot()
            .iter()
            .map(|run| RunView::from_run(run, self.inner.catalog.get(&run.pipeline_name), now))
            .collect()
    }

    /// Full copy of one tracked run
    pub fn run(&self, run_id: RunId) -> Option<Run> {
        self.inner.store.get_run(run_id)
    }

    /// Rendered log lines of a run
    pub fn run_logs(&self, run_id: RunId) -> Result<Vec<String>> {
        self.inner.logs.read_all(run_id)
    }

    /// History records in append order
    pub fn history(&self) -> Vec<HistoryRecord> {
        self.inner.store.get_history()
    }

    /// Dashboard statistics as seen at `now`
    pub fn stats(&self, now: DateTime<Utc>) -> Stats {
        compute_stats(&self.inner.store.get_history(), now)
    }

    /// Dashboard statistics as seen at the engine clock's current time
    pub fn current_stats(&self) -> Stats {
        self.stats(self.inner.clock.now())
    }

    /// Cancels every in-flight run and clears runs, history and logs
    ///
    /// Returns once the in-memory state is empty. An error means only the
    /// durable history mirror could not be cleared.
    pub async fn reset_all(&self) -> Result<()> {
        let inner = &self.inner;
        let _lifecycle = inner.lifecycle.write().await;

        let cancelled = inner.registry.abort_all().await;
        let generation = inner.store.reset();
        info!(
            "Reset: cancelled {} in-flight run(s), now at generation {}",
            cancelled, generation
        );

        inner.mirror.clear(generation).await
    }

    pub fn pipelines(&self) -> Vec<PipelineSummary> {
        self.inner
            .catalog
            .pipelines()
            .map(PipelineSummary::from)
            .collect()
    }

    /// Number of runs whose executor is still active
    pub fn in_flight(&self) -> usize {
        self.inner.registry.in_flight()
    }

    /// Waits until every in-flight run has terminated
    pub async fn wait_idle(&self) {
        self.inner.registry.drain().await;
    }
}

/// Builder for [`Engine`]
///
/// Defaults: built-in catalog, default config, system clock, entropy-seeded
/// randomness and an in-memory history backend.
#[derive(Default)]
pub struct EngineBuilder {
    catalog: Option<Catalog>,
    config: Option<EngineConfig>,
    clock: Option<Arc<dyn Clock>>,
    chance: Option<Arc<dyn Chance>>,
    backend: Option<Arc<dyn HistoryBackend>>,
}

impl EngineBuilder {
    pub fn catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    pub fn chance(mut self, chance: impl Chance + 'static) -> Self {
        self.chance = Some(Arc::new(chance));
        self
    }

    pub fn backend(mut self, backend: Arc<dyn HistoryBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Validates the configuration and restores history from the backend
    pub async fn build(self) -> Result<Engine> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let catalog = self.catalog.unwrap_or_else(Catalog::builtin);
        if catalog.is_empty() {
            return Err(EngineError::InvalidCatalog(
                "catalog has no pipelines".to_string(),
            ));
        }
        for pipeline in catalog.pipelines() {
            pipeline.validate().map_err(EngineError::InvalidCatalog)?;
        }

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let chance = self
            .chance
            .unwrap_or_else(|| Arc::new(RandomChance::from_entropy()));
        let backend = self
            .backend
            .unwrap_or_else(|| Arc::new(MemoryHistory::new()));

        let logs = Arc::new(LogSink::new());
        let store = Arc::new(
            RunStore::new(Arc::clone(&clock), Arc::clone(&logs))
                .with_snapshot_limit(config.snapshot_limit),
        );
        let mirror = Arc::new(HistoryMirror::new(backend));

        let restored = mirror.load().await?;
        if !restored.is_empty() {
            info!("Restored {} history record(s)", restored.len());
            store.restore_history(restored);
        }

        let executor = Arc::new(RunExecutor::new(
            Arc::clone(&store),
            Arc::clone(&logs),
            Arc::clone(&mirror),
            Arc::clone(&clock),
            chance,
        ));

        let permits = config
            .max_concurrent_runs
            .map(|limit| Arc::new(Semaphore::new(limit)));

        Ok(Engine {
            inner: Arc::new(EngineInner {
                catalog,
                config,
                store,
                logs,
                mirror,
                executor,
                registry: RunRegistry::new(),
                clock,
                lifecycle: RwLock::new(()),
                permits,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::FakeClock;
    use beacon_core::domain::pipeline::{PipelineDefinition, StepDefinition};
    use beacon_core::domain::run::RunStatus;
    use chrono::TimeZone;

    fn catalog(steps: &[(&str, f64)], duration_ms: u64) -> Catalog {
        Catalog::new(vec![PipelineDefinition::new(
            "unit-ci",
            steps
                .iter()
                .map(|(name, p)| StepDefinition::new(*name, duration_ms, duration_ms, *p))
                .collect(),
        )])
        .unwrap()
    }

    async fn fake_engine(catalog: Catalog) -> (Engine, FakeClock) {
        let clock = FakeClock::new(Utc.with_ymd_and_hms(2026, 2, 3, 10, 0, 0).unwrap());
        let engine = Engine::builder()
            .catalog(catalog)
            .clock(clock.clone())
            .chance(RandomChance::seeded(5))
            .build()
            .await
            .unwrap();
        (engine, clock)
    }

    #[tokio::test]
    async fn test_unknown_pipeline_mutates_nothing() {
        let (engine, _) = fake_engine(Catalog::builtin()).await;

        let result = engine.start_run("nope").await;
        assert!(matches!(result, Err(EngineError::UnknownPipeline(name)) if name == "nope"));
        assert!(engine.snapshot().is_empty());
        assert!(engine.history().is_empty());
    }

    #[tokio::test]
    async fn test_run_completes_and_is_observable() {
        let (engine, _) = fake_engine(catalog(&[("build", 0.0), ("test", 0.0)], 250)).await;

        let run_id = engine.start_run("unit-ci").await.unwrap();
        engine.wait_idle().await;

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, run_id);
        assert_eq!(snapshot[0].status, RunStatus::Success);
        assert_eq!(snapshot[0].current_step, None);
        assert_eq!(snapshot[0].duration_ms, 500);

        let logs = engine.run_logs(run_id).unwrap();
        assert!(!logs.is_empty());
        assert_eq!(engine.history().len(), 1);
        assert_eq!(engine.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_unknown_run_logs_not_found() {
        let (engine, _) = fake_engine(Catalog::builtin()).await;
        assert!(matches!(
            engine.run_logs(RunId::new()),
            Err(EngineError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_capacity_limit_rejects_extra_runs() {
        let engine = Engine::builder()
            .catalog(catalog(&[("slow", 0.0)], 5_000))
            .config(EngineConfig::default().with_max_concurrent_runs(1))
            .build()
            .await
            .unwrap();

        engine.start_run("unit-ci").await.unwrap();
        let result = engine.start_run("unit-ci").await;
        assert!(matches!(result, Err(EngineError::AtCapacity(1))));
        assert_eq!(engine.snapshot().len(), 1);

        engine.reset_all().await.unwrap();
        assert!(engine.start_run("unit-ci").await.is_ok());
        engine.reset_all().await.unwrap();
    }

    #[tokio::test]
    async fn test_history_is_restored_from_backend() {
        let backend: Arc<dyn HistoryBackend> = Arc::new(MemoryHistory::new());
        let clock = FakeClock::default();

        let first = Engine::builder()
            .catalog(catalog(&[("build", 0.0)], 10))
            .clock(clock.clone())
            .backend(Arc::clone(&backend))
            .build()
            .await
            .unwrap();
        first.start_run("unit-ci").await.unwrap();
        first.wait_idle().await;

        let second = Engine::builder()
            .catalog(catalog(&[("build", 0.0)], 10))
            .clock(clock)
            .backend(backend)
            .build()
            .await
            .unwrap();
        assert_eq!(second.history(), first.history());
        assert!(second.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_stats_use_history() {
        let (engine, clock) = fake_engine(catalog(&[("build", 1.0)], 1000)).await;
        engine.start_run("unit-ci").await.unwrap();
        engine.wait_idle().await;

        let stats = engine.stats(clock.now());
        assert_eq!(stats.deploys_today, 1);
        assert_eq!(stats.change_failure_rate_7d, 100.0);
        assert_eq!(stats.avg_duration_seconds, 1.0);
        assert_eq!(engine.current_stats(), stats);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let result = Engine::builder()
            .config(EngineConfig::default().with_snapshot_limit(0))
            .build()
            .await;
        assert!(matches!(result, Err(EngineError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_pipelines_lists_catalog() {
        let (engine, _) = fake_engine(Catalog::builtin()).await;
        let names: Vec<String> = engine.pipelines().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["api-ci".to_string(), "app-ci".to_string()]);
    }
}
