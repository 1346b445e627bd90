//! Runtime settings for the processing and rebuild loops.

use std::time::Duration;

use tracing::warn;

pub const DEFAULT_REBUILD_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_PROCESSING_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_SCORING_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// How often the leaderboard is recomputed from the score store.
    pub rebuild_interval: Duration,
    /// Pause between processing cycles.
    pub processing_interval: Duration,
    /// Max events taken per processing cycle.
    pub batch_size: usize,
    /// Scoring failures before an event is dead-lettered; 0 retries forever.
    pub max_attempts: u32,
    /// Scorer calls in flight per batch.
    pub scoring_concurrency: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            rebuild_interval: DEFAULT_REBUILD_INTERVAL,
            processing_interval: DEFAULT_PROCESSING_INTERVAL,
            batch_size: DEFAULT_BATCH_SIZE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            scoring_concurrency: DEFAULT_SCORING_CONCURRENCY,
        }
    }
}

impl Settings {
    /// Defaults overridden by `CUJU_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let d = Self::default();
        let ms = |key: &str, fallback: Duration| Duration::from_millis(env_or(&lookup, key, fallback.as_millis() as u64));
        Self {
            rebuild_interval: ms("CUJU_REBUILD_INTERVAL_MS", d.rebuild_interval),
            processing_interval: ms("CUJU_PROCESSING_INTERVAL_MS", d.processing_interval),
            batch_size: env_or(&lookup, "CUJU_BATCH_SIZE", d.batch_size),
            max_attempts: env_or(&lookup, "CUJU_MAX_ATTEMPTS", d.max_attempts),
            scoring_concurrency: env_or(&lookup, "CUJU_SCORING_CONCURRENCY", d.scoring_concurrency),
        }
        .normalized()
    }

    /// Zero intervals and sizes fall back to defaults. `max_attempts == 0` is meaningful and kept.
    pub fn normalized(mut self) -> Self {
        let d = Self::default();
        if self.rebuild_interval.is_zero() { self.rebuild_interval = d.rebuild_interval; }
        if self.processing_interval.is_zero() { self.processing_interval = d.processing_interval; }
        if self.batch_size == 0 { self.batch_size = d.batch_size; }
        if self.scoring_concurrency == 0 { self.scoring_concurrency = d.scoring_concurrency; }
        self
    }

    /// Upper bound between acceptance of an event and its visibility in reads,
    /// assuming the scorer succeeds on the first attempt.
    pub fn staleness_window(&self) -> Duration {
        self.processing_interval + self.rebuild_interval
    }
}

fn env_or<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, fallback: T) -> T {
    let Some(raw) = lookup(key) else { return fallback };
    match raw.trim().parse::<T>() {
        Ok(v) => v,
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparseable setting; using default");
            fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        assert_eq!(Settings::from_lookup(lookup(&[])), Settings::default());
        let d = Settings::default();
        assert_eq!(d.rebuild_interval, Duration::from_secs(1));
        assert_eq!(d.processing_interval, Duration::from_millis(100));
        assert_eq!(d.batch_size, 100);
    }

    #[test]
    fn env_overrides_and_bad_values() {
        let s = Settings::from_lookup(lookup(&[
            ("CUJU_REBUILD_INTERVAL_MS", "250"),
            ("CUJU_BATCH_SIZE", "lots"),
            ("CUJU_MAX_ATTEMPTS", "0"),
            ("CUJU_PROCESSING_INTERVAL_MS", "0"),
        ]));
        assert_eq!(s.rebuild_interval, Duration::from_millis(250));
        assert_eq!(s.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(s.max_attempts, 0);
        assert_eq!(s.processing_interval, DEFAULT_PROCESSING_INTERVAL);
        assert_eq!(s.staleness_window(), Duration::from_millis(350));
    }
}
