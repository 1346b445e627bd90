//! Cuju public API façade (in-process).
//!
//! Transports depend on the `CujuApi` trait; `InProcApi` wires it to the ranking
//! core and owns the background loops.

#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use cuju_core::{Event, MetricsSink, RankEntry, Scorer, Settings, StoreError, TalentId};
use cuju_store::{PipelineHandle, Ranking};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Counters and effective configuration exposed to clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Stats {
    pub events: usize,
    pub unprocessed: usize,
    pub dead_lettered: usize,
    pub scores: usize,
    pub ranked_talents: usize,
    pub leaderboard_epoch: u64,
    /// `None` until the first rebuild is published.
    pub leaderboard_built_at: Option<DateTime<Utc>>,
    pub rebuild_interval_ms: u64,
    pub processing_interval_ms: u64,
    pub batch_size: usize,
    pub max_attempts: u32,
    pub scoring_concurrency: usize,
}

/// API errors; duplicates are not errors and never show up here.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum CujuError {
    #[error("validation: {0}")]
    Validation(String),
    #[error("not_found: {0}")]
    NotFound(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl From<StoreError> for CujuError {
    fn from(e: StoreError) -> Self { CujuError::Internal(e.to_string()) }
}

pub type CujuResult<T> = Result<T, CujuError>;

#[async_trait::async_trait]
pub trait CujuApi: Send + Sync {
    /// `true` when newly accepted, `false` when `event_id` was already known.
    async fn submit_event(&self, event: Event) -> CujuResult<bool>;

    /// Best `limit` entries of the latest snapshot; `limit` must be positive.
    async fn top_n(&self, limit: usize) -> CujuResult<Vec<RankEntry>>;

    /// `NotFound` when the talent is not in the latest snapshot.
    async fn rank_of(&self, talent_id: &TalentId) -> CujuResult<RankEntry>;

    /// Events parked after exhausting their scoring attempts.
    async fn dead_letters(&self) -> CujuResult<Vec<Event>>;

    async fn stats(&self) -> CujuResult<Stats>;
}

fn validate_event(event: &Event) -> CujuResult<()> {
    if event.event_id.trim().is_empty() {
        return Err(CujuError::Validation("event_id must not be empty".into()));
    }
    if event.talent_id.as_str().trim().is_empty() {
        return Err(CujuError::Validation("talent_id must not be empty".into()));
    }
    Ok(())
}

fn validate_limit(limit: usize) -> CujuResult<()> {
    if limit == 0 {
        return Err(CujuError::Validation("limit must be a positive integer".into()));
    }
    Ok(())
}

// ----------------- In-process implementation -----------------

pub struct InProcApi {
    core: Ranking,
    settings: Settings,
    pipeline: tokio::sync::Mutex<Option<PipelineHandle>>,
}

impl InProcApi {
    /// Build the core and spawn its loops on the current runtime.
    pub fn start(settings: Settings, scorer: Arc<dyn Scorer>, metrics: Arc<dyn MetricsSink>) -> Self {
        let settings = settings.normalized();
        let core = Ranking::new(&settings, metrics);
        let handle = core.spawn(&settings, scorer, CancellationToken::new());
        info!(
            rebuild_ms = %settings.rebuild_interval.as_millis(),
            processing_ms = %settings.processing_interval.as_millis(),
            batch = settings.batch_size,
            max_attempts = settings.max_attempts,
            "api: ranking core started"
        );
        Self { core, settings, pipeline: tokio::sync::Mutex::new(Some(handle)) }
    }

    pub fn ranking(&self) -> &Ranking { &self.core }
    pub fn settings(&self) -> &Settings { &self.settings }

    /// Stop the background loops. Reads keep serving the last snapshot.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.pipeline.lock().await.take() {
            let t0 = Instant::now();
            handle.shutdown().await;
            info!(took_ms = %t0.elapsed().as_millis(), "api: ranking core stopped");
        }
    }
}

#[async_trait::async_trait]
impl CujuApi for InProcApi {
    async fn submit_event(&self, event: Event) -> CujuResult<bool> {
        validate_event(&event)?;
        let event_id = event.event_id.clone();
        let accepted = self.core.submit_event(event)?;
        debug!(event_id = %event_id, accepted, "api: submit_event");
        Ok(accepted)
    }

    async fn top_n(&self, limit: usize) -> CujuResult<Vec<RankEntry>> {
        validate_limit(limit)?;
        Ok(self.core.top_n(limit))
    }

    async fn rank_of(&self, talent_id: &TalentId) -> CujuResult<RankEntry> {
        self.core
            .rank_of(talent_id)
            .ok_or_else(|| CujuError::NotFound(format!("talent '{talent_id}' not found in leaderboard")))
    }

    async fn dead_letters(&self) -> CujuResult<Vec<Event>> {
        Ok(self.core.events().dead_letters()?)
    }

    async fn stats(&self) -> CujuResult<Stats> {
        let events = self.core.events();
        let snap = self.core.leaderboard().current();
        Ok(Stats {
            events: events.len()?,
            unprocessed: events.unprocessed_len()?,
            dead_lettered: events.dead_len()?,
            scores: self.core.scores().len()?,
            ranked_talents: snap.len(),
            leaderboard_epoch: snap.epoch,
            leaderboard_built_at: snap.built_at,
            rebuild_interval_ms: self.settings.rebuild_interval.as_millis() as u64,
            processing_interval_ms: self.settings.processing_interval.as_millis() as u64,
            batch_size: self.settings.batch_size,
            max_attempts: self.settings.max_attempts,
            scoring_concurrency: self.settings.scoring_concurrency,
        })
    }
}

// ----------------- Mock implementation -----------------

/// Canned responses for transport tests.
#[derive(Default)]
pub struct MockApi {
    pub accept: bool,
    pub board: Vec<RankEntry>,
    pub dead: Vec<Event>,
    pub stats: Stats,
    /// When set, every call fails with `Internal(fail)`.
    pub fail: Option<String>,
    pub submitted: std::sync::Mutex<Vec<Event>>,
}

impl MockApi {
    pub fn new() -> Self { Self::default() }

    fn check(&self) -> CujuResult<()> {
        match &self.fail {
            Some(msg) => Err(CujuError::Internal(msg.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl CujuApi for MockApi {
    async fn submit_event(&self, event: Event) -> CujuResult<bool> {
        self.check()?;
        validate_event(&event)?;
        self.submitted
            .lock()
            .map_err(|_| CujuError::Internal("mock lock poisoned".into()))?
            .push(event);
        Ok(self.accept)
    }

    async fn top_n(&self, limit: usize) -> CujuResult<Vec<RankEntry>> {
        self.check()?;
        validate_limit(limit)?;
        Ok(self.board.iter().take(limit).cloned().collect())
    }

    async fn rank_of(&self, talent_id: &TalentId) -> CujuResult<RankEntry> {
        self.check()?;
        self.board
            .iter()
            .find(|e| &e.talent_id == talent_id)
            .cloned()
            .ok_or_else(|| CujuError::NotFound(format!("talent '{talent_id}' not found in leaderboard")))
    }

    async fn dead_letters(&self) -> CujuResult<Vec<Event>> {
        self.check()?;
        Ok(self.dead.clone())
    }

    async fn stats(&self) -> CujuResult<Stats> {
        self.check()?;
        Ok(self.stats.clone())
    }
}
