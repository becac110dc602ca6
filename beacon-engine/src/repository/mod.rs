//! Repository Module
//!
//! State and persistence layer of the engine.
//! Each repository owns the storage of one kind of engine data.

pub mod history;
pub mod log;
pub mod run;

// Re-export for convenience
pub use history::{HistoryBackend, HistoryMirror, JsonLinesHistory, MemoryHistory};
pub use log::LogSink;
pub use run::{RunLease, RunStore};
