//! Cuju store: in-RAM event log, score history and eventually-consistent leaderboard.
//!
//! Three independent critical sections: the event store mutex, the score store
//! mutex and the leaderboard `ArcSwap`. Snapshot reads never wait on ingestion
//! or on a rebuild in progress.

#![forbid(unsafe_code)]

use std::sync::Arc;

use cuju_core::{Event, MetricsSink, RankEntry, Scorer, Settings, StoreResult, TalentId};
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub mod events;
pub mod leaderboard;
pub mod pipeline;
pub mod scores;
pub mod telemetry;

pub use events::{EventStore, FailureOutcome};
pub use leaderboard::{Leaderboard, LeaderboardBuilder};
pub use pipeline::{spawn_pipeline, CycleReport, PipelineHandle, Processor};
pub use scores::ScoreStore;
pub use telemetry::FacadeMetrics;

/// The ranking core as seen by transports: intake plus snapshot reads.
#[derive(Clone)]
pub struct Ranking {
    events: Arc<EventStore>,
    scores: Arc<ScoreStore>,
    board: Leaderboard,
    metrics: Arc<dyn MetricsSink>,
}

impl Ranking {
    pub fn new(settings: &Settings, metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            events: Arc::new(EventStore::new(settings.max_attempts)),
            scores: Arc::new(ScoreStore::new()),
            board: Leaderboard::new(),
            metrics,
        }
    }

    /// `Ok(false)` for an already-known `event_id`; only storage failures are errors.
    pub fn submit_event(&self, event: Event) -> StoreResult<bool> {
        let event_id = event.event_id.clone();
        let accepted = self.events.submit(event)?;
        if accepted {
            self.metrics.event_accepted();
        } else {
            self.metrics.event_duplicate();
            debug!(event_id = %event_id, "duplicate event ignored");
        }
        Ok(accepted)
    }

    pub fn top_n(&self, limit: usize) -> Vec<RankEntry> { self.board.top_n(limit) }

    pub fn rank_of(&self, talent_id: &TalentId) -> Option<RankEntry> { self.board.rank_of(talent_id) }

    pub fn events(&self) -> &Arc<EventStore> { &self.events }
    pub fn scores(&self) -> &Arc<ScoreStore> { &self.scores }
    pub fn leaderboard(&self) -> &Leaderboard { &self.board }

    /// Start the processing and rebuild loops for this core.
    pub fn spawn(&self, settings: &Settings, scorer: Arc<dyn Scorer>, cancel: CancellationToken) -> PipelineHandle {
        spawn_pipeline(
            settings,
            Arc::clone(&self.events),
            Arc::clone(&self.scores),
            self.board.clone(),
            scorer,
            Arc::clone(&self.metrics),
            cancel,
        )
    }
}
