//! Engine configuration
//!
//! Defines the tunable limits of the run engine: how many runs may execute
//! at once and how many runs the live snapshot keeps around.

use crate::error::{EngineError, Result};

/// Default number of runs retained in the live snapshot
pub const DEFAULT_SNAPSHOT_LIMIT: usize = 100;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Max runs executing at the same time; unlimited when `None`
    pub max_concurrent_runs: Option<usize>,

    /// Max runs kept in the live snapshot; oldest finished runs are evicted first
    pub snapshot_limit: usize,
}

impl EngineConfig {
    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - BEACON_MAX_CONCURRENT_RUNS (optional, default: unlimited)
    /// - BEACON_SNAPSHOT_LIMIT (optional, default: 100)
    pub fn from_env() -> Result<Self> {
        let max_concurrent_runs = match std::env::var("BEACON_MAX_CONCURRENT_RUNS") {
            Ok(s) => Some(s.parse::<usize>().map_err(|_| {
                EngineError::InvalidConfig(format!(
                    "BEACON_MAX_CONCURRENT_RUNS is not a number: {}",
                    s
                ))
            })?),
            Err(_) => None,
        };

        let snapshot_limit = std::env::var("BEACON_SNAPSHOT_LIMIT")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(DEFAULT_SNAPSHOT_LIMIT);

        let config = Self {
            max_concurrent_runs,
            snapshot_limit,
        };
        config.validate()?;
        Ok(config)
    }

    /// Limits concurrent runs
    pub fn with_max_concurrent_runs(mut self, limit: usize) -> Self {
        self.max_concurrent_runs = Some(limit);
        self
    }

    pub fn with_snapshot_limit(mut self, limit: usize) -> Self {
        self.snapshot_limit = limit;
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_runs == Some(0) {
            return Err(EngineError::InvalidConfig(
                "max_concurrent_runs must be greater than 0".to_string(),
            ));
        }

        if self.snapshot_limit == 0 {
            return Err(EngineError::InvalidConfig(
                "snapshot_limit must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_runs: None,
            snapshot_limit: DEFAULT_SNAPSHOT_LIMIT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.max_concurrent_runs, None);
        assert_eq!(config.snapshot_limit, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let config = EngineConfig::default().with_max_concurrent_runs(0);
        assert!(config.validate().is_err());

        let config = EngineConfig::default().with_snapshot_limit(0);
        assert!(config.validate().is_err());

        let config = EngineConfig::default()
            .with_max_concurrent_runs(4)
            .with_snapshot_limit(10);
        assert!(config.validate().is_ok());
        assert_eq!(config.max_concurrent_runs, Some(4));
    }
}
