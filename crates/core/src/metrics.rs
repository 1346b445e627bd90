//! Observability seam. The core reports through an injected sink instead of
//! process-wide counters; the binary plugs in an exporter-backed implementation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

pub trait MetricsSink: Send + Sync {
    fn event_accepted(&self) {}
    fn event_duplicate(&self) {}
    fn event_scored(&self) {}
    fn scoring_failed(&self) {}
    fn event_dead_lettered(&self) {}
    fn leaderboard_rebuilt(&self, _talents: usize, _elapsed: Duration) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {}

/// In-memory counters; handy for tests and for `stats`-style introspection.
#[derive(Debug, Default)]
pub struct CountingMetrics {
    pub accepted: AtomicU64,
    pub duplicates: AtomicU64,
    pub scored: AtomicU64,
    pub failed: AtomicU64,
    pub dead_lettered: AtomicU64,
    pub rebuilds: AtomicU64,
}

impl CountingMetrics {
    pub fn get(counter: &AtomicU64) -> u64 { counter.load(Ordering::Relaxed) }
}

impl MetricsSink for CountingMetrics {
    fn event_accepted(&self) { self.accepted.fetch_add(1, Ordering::Relaxed); }
    fn event_duplicate(&self) { self.duplicates.fetch_add(1, Ordering::Relaxed); }
    fn event_scored(&self) { self.scored.fetch_add(1, Ordering::Relaxed); }
    fn scoring_failed(&self) { self.failed.fetch_add(1, Ordering::Relaxed); }
    fn event_dead_lettered(&self) { self.dead_lettered.fetch_add(1, Ordering::Relaxed); }
    fn leaderboard_rebuilt(&self, _talents: usize, _elapsed: Duration) { self.rebuilds.fetch_add(1, Ordering::Relaxed); }
}
