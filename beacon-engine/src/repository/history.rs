//! Durable history
//!
//! The in-memory run store is the source of truth. A `HistoryBackend` keeps a
//! best-effort durable copy of the history so metrics survive a restart.
//! Writes reach the backend only after the in-memory commit, through a
//! `HistoryMirror` that drops writes issued before the latest reset.

use async_trait::async_trait;
use beacon_core::domain::history::HistoryRecord;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::{EngineError, Result};

/// Persistence contract for finished runs
///
/// Discrete operations only; no backend ever rewrites records it did not
/// just append.
#[async_trait]
pub trait HistoryBackend: Send + Sync {
    /// Loads every persisted record in append order
    async fn load(&self) -> Result<Vec<HistoryRecord>>;

    /// Appends one record
    async fn append(&self, record: &HistoryRecord) -> Result<()>;

    /// Removes every record
    async fn clear(&self) -> Result<()>;
}

/// Backend that keeps nothing beyond process memory
#[derive(Debug, Default)]
pub struct MemoryHistory {
    records: parking_lot::Mutex<Vec<HistoryRecord>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryBackend for MemoryHistory {
    async fn load(&self) -> Result<Vec<HistoryRecord>> {
        Ok(self.records.lock().clone())
    }

    async fn append(&self, record: &HistoryRecord) -> Result<()> {
        self.records.lock().push(record.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.records.lock().clear();
        Ok(())
    }
}

/// Backend writing one JSON document per line
#[derive(Debug)]
pub struct JsonLinesHistory {
    path: PathBuf,
}

impl JsonLinesHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backend at `<dir>/history.jsonl`
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join("history.jsonl"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl HistoryBackend for JsonLinesHistory {
    async fn load(&self) -> Result<Vec<HistoryRecord>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<HistoryRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(
                    "Skipping unreadable history line {} in {}: {}",
                    line_no + 1,
                    self.path.display(),
                    e
                ),
            }
        }

        Ok(records)
    }

    async fn append(&self, record: &HistoryRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Generation-aware front of a `HistoryBackend`
///
/// Serializes backend writes and rejects appends issued under a generation
/// older than the last `clear`.
pub struct HistoryMirror {
    backend: Arc<dyn HistoryBackend>,
    generation: tokio::sync::Mutex<u64>,
}

impl HistoryMirror {
    pub fn new(backend: Arc<dyn HistoryBackend>) -> Self {
        Self {
            backend,
            generation: tokio::sync::Mutex::new(0),
        }
    }

    pub async fn load(&self) -> Result<Vec<HistoryRecord>> {
        let _guard = self.generation.lock().await;
        self.backend.load().await
    }

    /// Mirrors a record committed in memory under `generation`
    pub async fn append(&self, generation: u64, record: &HistoryRecord) -> Result<()> {
        let current = self.generation.lock().await;

        if *current != generation {
            debug!(
                "Dropping history mirror write for run {} from generation {}",
                record.run_id, generation
            );
            return Err(EngineError::StaleGeneration {
                run_id: record.run_id,
                generation,
                current: *current,
            });
        }

        self.backend.append(record).await
    }

    /// Clears the backend and starts accepting writes of `generation`
    pub async fn clear(&self, generation: u64) -> Result<()> {
        let mut current = self.generation.lock().await;
        *current = generation;
        self.backend.clear().await
    }
}
