//! Dashboard statistics

use serde::{Deserialize, Serialize};

/// Aggregated DevOps metrics computed from run history
///
/// Rates are percentages in `[0, 100]`; durations are in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Stats {
    pub deploys_today: u64,
    pub success_rate_7d: f64,
    pub change_failure_rate_7d: f64,
    pub avg_duration_seconds: f64,
    pub mttr_seconds: f64,
}
