//! Scoring strategies plugged into the processing loop.

#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::time::Duration;

use cuju_core::{ScoreError, Scorer, Skill};
use rand::Rng;
use tracing::trace;

/// Default per-skill multipliers.
pub fn default_weights() -> HashMap<Skill, i64> {
    HashMap::from([(Skill::Dribble, 1), (Skill::Shoot, 2), (Skill::Pass, 3)])
}

/// `metric * weight[skill]`, after an optional random delay standing in for a
/// remote model call.
#[derive(Debug, Clone)]
pub struct WeightedScorer {
    weights: HashMap<Skill, i64>,
    latency_ms: Option<RangeInclusive<u64>>,
}

impl WeightedScorer {
    pub fn new(weights: HashMap<Skill, i64>) -> Self { Self { weights, latency_ms: None } }

    /// Sleep a uniformly random number of milliseconds from `range` before each call.
    pub fn with_latency(mut self, range: RangeInclusive<u64>) -> Self {
        self.latency_ms = Some(range);
        self
    }

    /// The production profile: default weights, 80..=150ms per call.
    pub fn simulated() -> Self { Self::new(default_weights()).with_latency(80..=150) }
}

#[async_trait::async_trait]
impl Scorer for WeightedScorer {
    async fn score(&self, skill: Skill, metric_value: i64) -> Result<i64, ScoreError> {
        if let Some(range) = &self.latency_ms {
            let ms = rand::thread_rng().gen_range(range.clone());
            trace!(%skill, delay_ms = ms, "scorer latency");
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        let weight = self.weights.get(&skill).ok_or(ScoreError::UnknownSkill(skill))?;
        metric_value
            .checked_mul(*weight)
            .ok_or_else(|| ScoreError::Unavailable(format!("score overflow for {skill} metric {metric_value}")))
    }
}

/// Score equals the metric value. Used by tests and the `linear` CLI mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinearScorer;

#[async_trait::async_trait]
impl Scorer for LinearScorer {
    async fn score(&self, _skill: Skill, metric_value: i64) -> Result<i64, ScoreError> { Ok(metric_value) }
}
