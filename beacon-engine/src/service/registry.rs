//! In-flight run registry
//!
//! Every executor task is spawned through the registry and tracked by run id
//! until it finishes, so a reset can reach all of them.

use beacon_core::domain::run::RunId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

type Tasks = Arc<Mutex<HashMap<RunId, JoinHandle<()>>>>;

/// Tracks the executor task of each in-flight run
#[derive(Clone, Default)]
pub struct RunRegistry {
    tasks: Tasks,
    idle: Arc<Notify>,
}

/// Untracks its task when dropped, whether the task finished, panicked or
/// was cancelled
struct Untrack {
    run_id: RunId,
    tasks: Tasks,
    idle: Arc<Notify>,
}

impl Drop for Untrack {
    fn drop(&mut self) {
        let empty = {
            let mut tasks = self.tasks.lock();
            tasks.remove(&self.run_id);
            tasks.is_empty()
        };
        if empty {
            self.idle.notify_waiters();
        }
    }
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns `task` for `run_id` and tracks it until it completes
    ///
    /// The task is registered before it can untrack itself, so a completed
    /// task never leaves an entry behind.
    pub fn spawn<F>(&self, run_id: RunId, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let tasks = Arc::clone(&self.tasks);
        let idle = Arc::clone(&self.idle);
        let mut guard = self.tasks.lock();

        let handle = tokio::spawn(async move {
            let _untrack = Untrack {
                run_id,
                tasks,
                idle,
            };
            task.await;
        });

        guard.insert(run_id, handle);
    }

    /// Number of tracked tasks still running
    pub fn in_flight(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Cancels every tracked task and waits until they are gone
    ///
    /// Returns how many tasks were cancelled.
    pub async fn abort_all(&self) -> usize {
        let handles: Vec<(RunId, JoinHandle<()>)> = self.tasks.lock().drain().collect();
        self.idle.notify_waiters();

        for (_, handle) in &handles {
            handle.abort();
        }

        let count = handles.len();
        for (run_id, handle) in handles {
            match handle.await {
                Ok(()) => debug!("Run {} finished before it could be cancelled", run_id),
                Err(e) if e.is_cancelled() => debug!("Run {} cancelled", run_id),
                Err(e) => warn!("Run {} task failed: {}", run_id, e),
            }
        }

        count
    }

    /// Waits for every tracked task to finish on its own
    ///
    /// Tasks stay registered while waiting, so a concurrent `abort_all`
    /// still reaches them.
    pub async fn drain(&self) {
        loop {
            let idle = self.idle.notified();
            tokio::pin!(idle);
            idle.as_mut().enable();

            if self.tasks.lock().is_empty() {
                return;
            }

            idle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_finished_task_is_untracked() {
        let registry = RunRegistry::new();
        registry.spawn(RunId::new(), async {});

        registry.drain().await;
        assert_eq!(registry.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_abort_all_cancels_running_tasks() {
        let registry = RunRegistry::new();
        let reached_end = Arc::new(AtomicBool::new(false));

        for _ in 0..3 {
            let reached_end = Arc::clone(&reached_end);
            registry.spawn(RunId::new(), async move {
                tokio::time::sleep(Duration::from_secs(30)).await;
                reached_end.store(true, Ordering::SeqCst);
            });
        }
        assert_eq!(registry.in_flight(), 3);

        let cancelled = registry.abort_all().await;
        assert_eq!(cancelled, 3);
        assert_eq!(registry.in_flight(), 0);
        assert!(!reached_end.load(Ordering::SeqCst));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_many_short_tasks_leave_no_entries() {
        let registry = RunRegistry::new();
        for _ in 0..50 {
            registry.spawn(RunId::new(), async {
                tokio::task::yield_now().await;
            });
        }

        registry.drain().await;
        assert_eq!(registry.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_drain_survives_panicking_task() {
        let registry = RunRegistry::new();
        registry.spawn(RunId::new(), async {
            tokio::task::yield_now().await;
            panic!("executor blew up");
        });

        registry.drain().await;
        assert_eq!(registry.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_drain_waits_for_slow_task() {
        let registry = RunRegistry::new();
        let reached_end = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&reached_end);
        registry.spawn(RunId::new(), async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            flag.store(true, Ordering::SeqCst);
        });

        registry.drain().await;
        assert!(reached_end.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_drain_returns_after_abort_all() {
        let registry = RunRegistry::new();
        registry.spawn(RunId::new(), async {
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let waiter = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.drain().await })
        };
        tokio::task::yield_now().await;

        registry.abort_all().await;
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
