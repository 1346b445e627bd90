//! Cuju core types: events, scores, leaderboard snapshots and the collaborator seams.

#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod config;
pub mod metrics;

pub use config::Settings;
pub use metrics::{CountingMetrics, MetricsSink, NoopMetrics};

/// Opaque talent identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TalentId(pub String);

impl TalentId {
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for TalentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl From<&str> for TalentId {
    fn from(s: &str) -> Self { Self(s.to_string()) }
}

impl From<String> for TalentId {
    fn from(s: String) -> Self { Self(s) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Skill {
    Dribble,
    Shoot,
    Pass,
}

impl Skill {
    pub const ALL: [Skill; 3] = [Skill::Dribble, Skill::Shoot, Skill::Pass];

    pub fn as_str(&self) -> &'static str {
        match self {
            Skill::Dribble => "dribble",
            Skill::Shoot => "shoot",
            Skill::Pass => "pass",
        }
    }
}

impl fmt::Display for Skill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown skill {0:?}; expected one of: dribble, shoot, pass")]
pub struct ParseSkillError(pub String);

impl FromStr for Skill {
    type Err = ParseSkillError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Skill::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| ParseSkillError(s.to_string()))
    }
}

/// One submitted skill measurement. Immutable once accepted; identity is `event_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: String,
    pub talent_id: TalentId,
    pub skill: Skill,
    pub metric_value: i64,
    pub timestamp: DateTime<Utc>,
}

/// Computed score for one event. Append-only per talent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub talent_id: TalentId,
    pub skill: Skill,
    pub score: i64,
    /// The event this score was computed from.
    pub source_event_id: String,
    /// Timestamp of the source event; used to order equal scores across talents.
    pub event_ts: DateTime<Utc>,
}

impl Score {
    pub fn from_event(event: &Event, score: i64) -> Self {
        Self {
            talent_id: event.talent_id.clone(),
            skill: event.skill,
            score,
            source_event_id: event.event_id.clone(),
            event_ts: event.timestamp,
        }
    }
}

/// A talent's position within one leaderboard snapshot. Derived, never authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankEntry {
    pub talent_id: TalentId,
    pub best_score: Score,
    /// 1-based, contiguous.
    pub rank: usize,
}

/// Ranked sequence plus talent -> position index. Both halves are built together
/// and published as one value; a snapshot is never mutated after construction.
#[derive(Debug, Clone, Default)]
pub struct LeaderboardSnapshot {
    /// 0 until the first rebuild is published.
    pub epoch: u64,
    pub built_at: Option<DateTime<Utc>>,
    entries: Vec<RankEntry>,
    index: HashMap<TalentId, usize>,
}

impl LeaderboardSnapshot {
    /// Assemble a snapshot from entries already sorted best-first. Ranks and the
    /// index are (re)assigned from position so they cannot disagree.
    pub fn from_sorted(epoch: u64, mut entries: Vec<RankEntry>) -> Self {
        let mut index = HashMap::with_capacity(entries.len());
        for (pos, entry) in entries.iter_mut().enumerate() {
            entry.rank = pos + 1;
            index.insert(entry.talent_id.clone(), pos);
        }
        Self { epoch, built_at: Some(Utc::now()), entries, index }
    }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
    pub fn entries(&self) -> &[RankEntry] { &self.entries }

    /// At most `limit` best entries, copied out.
    pub fn top_n(&self, limit: usize) -> Vec<RankEntry> {
        self.entries.iter().take(limit).cloned().collect()
    }

    pub fn rank_of(&self, talent_id: &TalentId) -> Option<RankEntry> {
        self.index.get(talent_id).and_then(|&pos| self.entries.get(pos)).cloned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScoreError {
    #[error("no weight configured for skill {0}")]
    UnknownSkill(Skill),
    #[error("scorer unavailable: {0}")]
    Unavailable(String),
}

/// Pluggable scoring strategy. May be slow and may fail; the pipeline retries
/// failures on later cycles without distinguishing transient from permanent.
#[async_trait::async_trait]
pub trait Scorer: Send + Sync {
    async fn score(&self, skill: Skill, metric_value: i64) -> Result<i64, ScoreError>;
}

/// Structural storage failures. Business outcomes (duplicates, misses) are not errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{0} lock poisoned")]
    Poisoned(&'static str),
}

pub type StoreResult<T> = Result<T, StoreError>;
