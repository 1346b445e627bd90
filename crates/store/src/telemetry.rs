//! `MetricsSink` backed by the `metrics` facade; whichever recorder the binary
//! installs (Prometheus exporter) receives these.

use std::time::Duration;

use cuju_core::MetricsSink;
use metrics::{counter, gauge, histogram};

#[derive(Debug, Default, Clone, Copy)]
pub struct FacadeMetrics;

impl MetricsSink for FacadeMetrics {
    fn event_accepted(&self) {
        counter!("score_events_total", 1u64);
    }

    fn event_duplicate(&self) {
        counter!("score_events_total", 1u64);
        counter!("score_events_duplicate", 1u64);
    }

    fn event_scored(&self) { counter!("score_events_scored_total", 1u64); }
    fn scoring_failed(&self) { counter!("score_events_failed_total", 1u64); }
    fn event_dead_lettered(&self) { counter!("score_events_dead_lettered_total", 1u64); }

    fn leaderboard_rebuilt(&self, talents: usize, elapsed: Duration) {
        gauge!("leaderboard_talents", talents as f64);
        histogram!("leaderboard_rebuild_ms", elapsed.as_secs_f64() * 1000.0);
    }
}
