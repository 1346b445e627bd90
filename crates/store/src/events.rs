//! Deduplicated, append-only event log with processed and dead-letter markers.

use std::sync::{Mutex, MutexGuard};

use cuju_core::config::DEFAULT_MAX_ATTEMPTS;
use cuju_core::{Event, StoreError, StoreResult};
use rustc_hash::{FxHashMap, FxHashSet};

/// What happened to an event after a scoring failure was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Still unprocessed; will be offered again on the next take.
    Retry { attempts: u32 },
    /// Attempt budget exhausted; the event is parked and never offered again.
    DeadLettered { attempts: u32 },
    /// Unknown, already processed or already dead-lettered.
    Ignored,
}

/// Unlocked state. Submission order is the index into `log`.
#[derive(Default)]
struct EventLog {
    log: Vec<Event>,
    seen: FxHashSet<String>,
    processed: FxHashSet<String>,
    dead: FxHashSet<String>,
    failures: FxHashMap<String, u32>,
    /// Every event before this position is processed or dead.
    low_water: usize,
}

impl EventLog {
    fn is_settled(&self, id: &str) -> bool {
        self.processed.contains(id) || self.dead.contains(id)
    }

    fn advance_low_water(&mut self) {
        while let Some(ev) = self.log.get(self.low_water) {
            if !self.is_settled(&ev.event_id) { break; }
            self.low_water += 1;
        }
    }
}

/// One mutex guards the dedup set, the log and the markers together.
pub struct EventStore {
    inner: Mutex<EventLog>,
    max_attempts: u32,
}

impl Default for EventStore {
    fn default() -> Self { Self::new(DEFAULT_MAX_ATTEMPTS) }
}

impl EventStore {
    /// `max_attempts == 0` disables dead-lettering.
    pub fn new(max_attempts: u32) -> Self {
        Self { inner: Mutex::new(EventLog::default()), max_attempts }
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, EventLog>> {
        self.inner.lock().map_err(|_| StoreError::Poisoned("event store"))
    }

    /// Returns `false` when `event_id` was already seen; the earlier payload wins.
    pub fn submit(&self, event: Event) -> StoreResult<bool> {
        let mut log = self.lock()?;
        if !log.seen.insert(event.event_id.clone()) {
            return Ok(false);
        }
        log.log.push(event);
        Ok(true)
    }

    /// Up to `limit` unprocessed events in submission order. Does not mark anything.
    pub fn take_unprocessed(&self, limit: usize) -> StoreResult<Vec<Event>> {
        let mut log = self.lock()?;
        log.advance_low_water();
        let out = log.log[log.low_water..]
            .iter()
            .filter(|ev| !log.is_settled(&ev.event_id))
            .take(limit)
            .cloned()
            .collect();
        Ok(out)
    }

    /// Idempotent; unknown or already settled ids are skipped.
    pub fn mark_processed(&self, events: &[Event]) -> StoreResult<()> {
        let mut log = self.lock()?;
        for ev in events {
            let id = ev.event_id.as_str();
            if !log.seen.contains(id) || log.dead.contains(id) { continue; }
            log.processed.insert(id.to_string());
            log.failures.remove(id);
        }
        log.advance_low_water();
        Ok(())
    }

    /// Count one scoring failure for `event_id`, dead-lettering it once the budget is spent.
    pub fn record_failure(&self, event_id: &str) -> StoreResult<FailureOutcome> {
        let mut log = self.lock()?;
        if !log.seen.contains(event_id) || log.is_settled(event_id) {
            return Ok(FailureOutcome::Ignored);
        }
        let attempts = {
            let n = log.failures.entry(event_id.to_string()).or_insert(0);
            *n = n.saturating_add(1);
            *n
        };
        if self.max_attempts > 0 && attempts >= self.max_attempts {
            log.failures.remove(event_id);
            log.dead.insert(event_id.to_string());
            log.advance_low_water();
            return Ok(FailureOutcome::DeadLettered { attempts });
        }
        Ok(FailureOutcome::Retry { attempts })
    }

    /// Parked events in submission order.
    pub fn dead_letters(&self) -> StoreResult<Vec<Event>> {
        let log = self.lock()?;
        Ok(log.log.iter().filter(|ev| log.dead.contains(&ev.event_id)).cloned().collect())
    }

    pub fn len(&self) -> StoreResult<usize> { Ok(self.lock()?.log.len()) }
    pub fn is_empty(&self) -> StoreResult<bool> { Ok(self.lock()?.log.is_empty()) }

    pub fn unprocessed_len(&self) -> StoreResult<usize> {
        let log = self.lock()?;
        Ok(log.log.len() - log.processed.len() - log.dead.len())
    }

    pub fn dead_len(&self) -> StoreResult<usize> { Ok(self.lock()?.dead.len()) }
}
