//! Leaderboard: pure rebuild from score history, published through an `ArcSwap`
//! so readers never take a lock and never see a half-built ranking.

use std::cmp::Ordering;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use arc_swap::ArcSwap;
use cuju_core::{LeaderboardSnapshot, MetricsSink, RankEntry, Score, StoreResult, TalentId};
use tokio::sync::watch;
use tracing::debug;

use crate::scores::ScoreStore;

/// Highest score in `scores`. Equal maxima resolve to the earliest source event,
/// then to the first one recorded.
pub fn best_of(scores: &[Score]) -> Option<&Score> {
    scores.iter().fold(None, |best: Option<&Score>, s| match best {
        Some(b) if (b.score, std::cmp::Reverse(b.event_ts)) >= (s.score, std::cmp::Reverse(s.event_ts)) => Some(b),
        _ => Some(s),
    })
}

/// Score descending, then earlier source event, then talent id.
fn ranking_order(a: &RankEntry, b: &RankEntry) -> Ordering {
    b.best_score.score
        .cmp(&a.best_score.score)
        .then_with(|| a.best_score.event_ts.cmp(&b.best_score.event_ts))
        .then_with(|| a.talent_id.cmp(&b.talent_id))
}

/// Builds snapshots and numbers them.
#[derive(Debug, Default)]
pub struct LeaderboardBuilder {
    epoch: u64,
}

impl LeaderboardBuilder {
    pub fn new() -> Self { Self::default() }

    pub fn epoch(&self) -> u64 { self.epoch }

    /// Full recomputation. Every talent with at least one score is ranked,
    /// whatever the value; talents with an empty history are skipped.
    pub fn build<I>(&mut self, by_talent: I) -> LeaderboardSnapshot
    where
        I: IntoIterator<Item = (TalentId, Vec<Score>)>,
    {
        let mut entries: Vec<RankEntry> = by_talent
            .into_iter()
            .filter_map(|(talent_id, scores)| {
                let best = best_of(&scores)?.clone();
                Some(RankEntry { talent_id, best_score: best, rank: 0 })
            })
            .collect();
        entries.sort_by(ranking_order);
        self.epoch = self.epoch.saturating_add(1);
        LeaderboardSnapshot::from_sorted(self.epoch, entries)
    }
}

/// Shared handle to the latest published snapshot. Cheap to clone.
#[derive(Clone)]
pub struct Leaderboard {
    snap: Arc<ArcSwap<LeaderboardSnapshot>>,
    /// Serializes rebuilds so an older build can never overwrite a newer one.
    builder: Arc<Mutex<LeaderboardBuilder>>,
    epoch_tx: Arc<watch::Sender<u64>>,
}

impl Default for Leaderboard {
    fn default() -> Self { Self::new() }
}

impl Leaderboard {
    pub fn new() -> Self {
        let (epoch_tx, _) = watch::channel(0u64);
        Self {
            snap: Arc::new(ArcSwap::from_pointee(LeaderboardSnapshot::default())),
            builder: Arc::new(Mutex::new(LeaderboardBuilder::new())),
            epoch_tx: Arc::new(epoch_tx),
        }
    }

    pub fn current(&self) -> Arc<LeaderboardSnapshot> { self.snap.load_full() }

    /// Fires with the epoch of every published snapshot.
    pub fn subscribe_epoch(&self) -> watch::Receiver<u64> { self.epoch_tx.subscribe() }

    pub fn top_n(&self, limit: usize) -> Vec<RankEntry> { self.snap.load().top_n(limit) }

    pub fn rank_of(&self, talent_id: &TalentId) -> Option<RankEntry> { self.snap.load().rank_of(talent_id) }

    /// Replace the published snapshot wholesale.
    pub fn publish(&self, next: LeaderboardSnapshot) {
        let epoch = next.epoch;
        self.snap.store(Arc::new(next));
        self.epoch_tx.send_replace(epoch);
    }

    /// Recompute from `scores` and publish. On error the previous snapshot stays.
    pub fn rebuild_now(&self, scores: &ScoreStore, metrics: &dyn MetricsSink) -> StoreResult<u64> {
        let started = Instant::now();
        // The builder only carries the epoch counter, so a panic mid-build leaves it usable.
        let mut builder = self.builder.lock().unwrap_or_else(PoisonError::into_inner);
        let history = scores.all_for_rebuild()?;
        let next = builder.build(history);
        let (epoch, talents) = (next.epoch, next.len());
        self.publish(next);
        let elapsed = started.elapsed();
        metrics.leaderboard_rebuilt(talents, elapsed);
        debug!(epoch, talents, took_ms = %elapsed.as_millis(), "leaderboard published");
        Ok(epoch)
    }
}
