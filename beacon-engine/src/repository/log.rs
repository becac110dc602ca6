//! Log sink
//!
//! Append-only, per-run text logs kept in memory. Each run's stream has a
//! single writer (its executor) and any number of readers. A stream is
//! opened when the run is created and frozen when the run terminates.

use beacon_core::domain::log::LogEntry;
use beacon_core::domain::run::RunId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{EngineError, Result};

#[derive(Debug, Default)]
struct LogStream {
    entries: Vec<LogEntry>,
    frozen: bool,
}

/// In-memory store of run logs
///
/// The outer map lock is only held to look up or insert a stream, so
/// writers on different runs never wait on each other.
#[derive(Debug, Default)]
pub struct LogSink {
    streams: RwLock<HashMap<RunId, Arc<RwLock<LogStream>>>>,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens an empty stream for a new run
    pub fn open(&self, run_id: RunId) {
        self.streams.write().entry(run_id).or_default();
    }

    /// Appends an entry to the run's stream
    ///
    /// Fails with `NotFound` when the stream is gone (cleared by a reset) and
    /// with `LogFrozen` once the run has terminated.
    pub fn append(&self, run_id: RunId, entry: LogEntry) -> Result<()> {
        let stream = self.stream(run_id)?;
        let mut stream = stream.write();

        if stream.frozen {
            return Err(EngineError::LogFrozen(run_id));
        }

        stream.entries.push(entry);
        Ok(())
    }

    /// Marks the run's stream read-only
    pub fn freeze(&self, run_id: RunId) {
        if let Ok(stream) = self.stream(run_id) {
            stream.write().frozen = true;
        }
    }

    /// Drops the stream of one run
    pub fn remove(&self, run_id: RunId) {
        self.streams.write().remove(&run_id);
    }

    /// Returns the run's log as rendered text lines
    ///
    /// A run with no entries yet yields an empty list, an unknown run
    /// `NotFound`.
    pub fn read_all(&self, run_id: RunId) -> Result<Vec<String>> {
        Ok(self
            .stream(run_id)?
            .read()
            .entries
            .iter()
            .map(LogEntry::render)
            .collect())
    }

    pub fn is_frozen(&self, run_id: RunId) -> Result<bool> {
        Ok(self.stream(run_id)?.read().frozen)
    }

    /// Drops every stream
    pub fn clear(&self) -> usize {
        let mut streams = self.streams.write();
        let cleared = streams.len();
        streams.clear();
        cleared
    }

    pub fn len(&self) -> usize {
        self.streams.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.read().is_empty()
    }

    fn stream(&self, run_id: RunId) -> Result<Arc<RwLock<LogStream>>> {
        self.streams
            .read()
            .get(&run_id)
            .cloned()
            .ok_or(EngineError::NotFound(run_id))
    }
}
