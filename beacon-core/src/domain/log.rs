//! Log domain types

use serde::{Deserialize, Serialize};

/// A log entry from run execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub level: LogLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogEntry {
    pub fn info(timestamp: chrono::DateTime<chrono::Utc>, message: impl Into<String>) -> Self {
        Self {
            timestamp,
            level: LogLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(timestamp: chrono::DateTime<chrono::Utc>, message: impl Into<String>) -> Self {
        Self {
            timestamp,
            level: LogLevel::Error,
            message: message.into(),
        }
    }

    /// Renders the entry as a plain text line: `[2026-01-02T03:04:05Z] message`
    pub fn render(&self) -> String {
        format!(
            "[{}] {}",
            self.timestamp
                .to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            self.message.trim_end()
        )
    }
}
