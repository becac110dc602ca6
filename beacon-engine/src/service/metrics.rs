//! Metrics aggregation
//!
//! Pure functions from a history snapshot to dashboard statistics. No state
//! is kept between calls, so the same input always yields the same `Stats`.
//!
//! Time policy:
//! - "today" is the UTC calendar day of `now`
//! - the 7-day window is rolling: `now - 168h <= finished_at <= now`
//! - average duration covers all records, the other rates the window only

use beacon_core::domain::history::HistoryRecord;
use beacon_core::domain::run::RunStatus;
use beacon_core::domain::stats::Stats;
use chrono::{DateTime, Duration, Utc};

/// Length of the rolling window used for rates and MTTR
pub const WINDOW_DAYS: i64 = 7;

/// Computes dashboard statistics from `history` as seen at `now`
pub fn compute_stats(history: &[HistoryRecord], now: DateTime<Utc>) -> Stats {
    if history.is_empty() {
        return Stats::default();
    }

    let today = now.date_naive();
    let deploys_today = history
        .iter()
        .filter(|r| r.finished_at.date_naive() == today)
        .count() as u64;

    let window_start = now - Duration::days(WINDOW_DAYS);
    let recent: Vec<&HistoryRecord> = history
        .iter()
        .filter(|r| r.finished_at >= window_start && r.finished_at <= now)
        .collect();

    let total = recent.len();
    let successes = recent
        .iter()
        .filter(|r| r.status == RunStatus::Success)
        .count();
    let failures = recent
        .iter()
        .filter(|r| r.status == RunStatus::Failed)
        .count();

    let avg_duration_seconds = mean(
        history
            .iter()
            .map(|r| elapsed_seconds(r.started_at, r.finished_at)),
    );

    Stats {
        deploys_today,
        success_rate_7d: percentage(successes, total),
        change_failure_rate_7d: percentage(failures, total),
        avg_duration_seconds: round1(avg_duration_seconds),
        mttr_seconds: round1(mean_time_to_recovery(&recent)),
    }
}

/// Mean gap in seconds between each failure and the next success of the
/// same pipeline
///
/// Failures without a later success are not counted; with no pairs at all
/// the result is zero.
pub fn mean_time_to_recovery(records: &[&HistoryRecord]) -> f64 {
    let gaps = records
        .iter()
        .filter(|r| r.status == RunStatus::Failed)
        .filter_map(|failure| {
            records
                .iter()
                .filter(|r| {
                    r.status == RunStatus::Success
                        && r.pipeline_name == failure.pipeline_name
                        && r.finished_at > failure.finished_at
                })
                .map(|r| r.finished_at)
                .min()
                .map(|recovered_at| elapsed_seconds(failure.finished_at, recovered_at))
        });

    mean(gaps)
}

fn elapsed_seconds(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds().max(0) as f64 / 1000.0
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round1(part as f64 / total as f64 * 100.0)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
