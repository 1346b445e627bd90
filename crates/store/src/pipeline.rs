//! Background work: the processing loop turns events into scores, the rebuild
//! loop republishes the leaderboard. Both run on their own timers and stop on a
//! shared cancellation token, checked only between cycles.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use cuju_core::{Event, MetricsSink, Score, ScoreError, Scorer, Settings, StoreResult};
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::events::{EventStore, FailureOutcome};
use crate::leaderboard::Leaderboard;
use crate::scores::ScoreStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub taken: usize,
    pub scored: usize,
    pub failed: usize,
    pub dead_lettered: usize,
}

/// Drains unprocessed events through the scorer. Assumes it is the only consumer
/// of its event store: take and mark are separate steps.
pub struct Processor {
    events: Arc<EventStore>,
    scores: Arc<ScoreStore>,
    scorer: Arc<dyn Scorer>,
    metrics: Arc<dyn MetricsSink>,
    batch_size: usize,
    concurrency: usize,
}

impl Processor {
    pub fn new(
        events: Arc<EventStore>,
        scores: Arc<ScoreStore>,
        scorer: Arc<dyn Scorer>,
        metrics: Arc<dyn MetricsSink>,
        settings: &Settings,
    ) -> Self {
        Self {
            events,
            scores,
            scorer,
            metrics,
            batch_size: settings.batch_size.max(1),
            concurrency: settings.scoring_concurrency.max(1),
        }
    }

    /// One take -> score -> append -> mark pass. A failing event is left
    /// unprocessed (or dead-lettered) without holding back the rest of the batch.
    pub async fn run_cycle(&self) -> StoreResult<CycleReport> {
        let batch = self.events.take_unprocessed(self.batch_size)?;
        let mut report = CycleReport { taken: batch.len(), ..Default::default() };
        if batch.is_empty() {
            return Ok(report);
        }

        let scorer = &self.scorer;
        let results: Vec<(Event, _)> = stream::iter(batch)
            .map(|ev| async move {
                // A panicking scorer counts as a failed attempt for this event only.
                let res = AssertUnwindSafe(scorer.score(ev.skill, ev.metric_value))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|payload| Err(ScoreError::Unavailable(panic_message(payload.as_ref()))));
                (ev, res)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut done = Vec::with_capacity(results.len());
        for (ev, res) in results {
            match res {
                Ok(value) => {
                    if let Err(e) = self.scores.append(Score::from_event(&ev, value)) {
                        error!(event_id = %ev.event_id, error = %e, "failed to record score");
                        continue;
                    }
                    self.metrics.event_scored();
                    report.scored += 1;
                    done.push(ev);
                }
                Err(e) => {
                    self.metrics.scoring_failed();
                    report.failed += 1;
                    match self.events.record_failure(&ev.event_id) {
                        Ok(FailureOutcome::DeadLettered { attempts }) => {
                            self.metrics.event_dead_lettered();
                            report.dead_lettered += 1;
                            error!(event_id = %ev.event_id, talent_id = %ev.talent_id, attempts, error = %e, "event dead-lettered");
                        }
                        Ok(FailureOutcome::Retry { attempts }) => {
                            warn!(event_id = %ev.event_id, skill = %ev.skill, attempts, error = %e, "scoring failed; will retry");
                        }
                        Ok(FailureOutcome::Ignored) => {}
                        Err(store_err) => {
                            error!(event_id = %ev.event_id, error = %store_err, "failed to record scoring failure");
                        }
                    }
                }
            }
        }

        if !done.is_empty() {
            self.events.mark_processed(&done)?;
        }
        Ok(report)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string payload".to_string());
    format!("scorer panicked: {detail}")
}

fn ticker(period: Duration) -> tokio::time::Interval {
    let mut t = tokio::time::interval(period);
    t.set_missed_tick_behavior(MissedTickBehavior::Delay);
    t
}

pub async fn run_processing_loop(processor: Processor, period: Duration, cancel: CancellationToken) {
    info!(period_ms = %period.as_millis(), "processing loop started");
    let mut ticker = ticker(period);
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                match processor.run_cycle().await {
                    Ok(r) if r.taken > 0 => debug!(taken = r.taken, scored = r.scored, failed = r.failed, dead = r.dead_lettered, "processing cycle"),
                    Ok(_) => {}
                    Err(e) => error!(error = %e, "processing cycle aborted"),
                }
            }
        }
    }
    info!("processing loop stopped");
}

pub async fn run_rebuild_loop(
    board: Leaderboard,
    scores: Arc<ScoreStore>,
    metrics: Arc<dyn MetricsSink>,
    period: Duration,
    cancel: CancellationToken,
) {
    info!(period_ms = %period.as_millis(), "rebuild loop started");
    let mut ticker = ticker(period);
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let (board, scores, metrics) = (board.clone(), Arc::clone(&scores), Arc::clone(&metrics));
                // Off the async workers; a panic here only costs this tick.
                match tokio::task::spawn_blocking(move || board.rebuild_now(&scores, metrics.as_ref())).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => error!(error = %e, "rebuild failed; keeping previous snapshot"),
                    Err(e) => error!(error = %e, "rebuild panicked; keeping previous snapshot"),
                }
            }
        }
    }
    info!("rebuild loop stopped");
}

/// Running background loops.
pub struct PipelineHandle {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl PipelineHandle {
    pub fn is_finished(&self) -> bool { self.tasks.iter().all(|t| t.is_finished()) }

    /// Cancel both loops and wait for them; an in-flight cycle completes first.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for t in self.tasks {
            if let Err(e) = t.await {
                warn!(error = %e, "background task ended abnormally");
            }
        }
    }
}

/// Spawn the processing and rebuild loops onto the current tokio runtime.
pub fn spawn_pipeline(
    settings: &Settings,
    events: Arc<EventStore>,
    scores: Arc<ScoreStore>,
    board: Leaderboard,
    scorer: Arc<dyn Scorer>,
    metrics: Arc<dyn MetricsSink>,
    cancel: CancellationToken,
) -> PipelineHandle {
    let processor = Processor::new(events, Arc::clone(&scores), scorer, Arc::clone(&metrics), settings);
    let processing = tokio::spawn(run_processing_loop(processor, settings.processing_interval, cancel.clone()));
    let rebuild = tokio::spawn(run_rebuild_loop(board, scores, metrics, settings.rebuild_interval, cancel.clone()));
    PipelineHandle { cancel, tasks: vec![processing, rebuild] }
}
