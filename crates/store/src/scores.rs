//! Per-talent score history. Append-only; no update in place, no deletion.

use std::sync::{Mutex, MutexGuard};

use cuju_core::{Score, StoreError, StoreResult, TalentId};
use rustc_hash::FxHashMap;

#[derive(Default)]
struct ScoreHistory {
    by_talent: FxHashMap<TalentId, Vec<Score>>,
    total: usize,
}

#[derive(Default)]
pub struct ScoreStore {
    inner: Mutex<ScoreHistory>,
}

impl ScoreStore {
    pub fn new() -> Self { Self::default() }

    fn lock(&self) -> StoreResult<MutexGuard<'_, ScoreHistory>> {
        self.inner.lock().map_err(|_| StoreError::Poisoned("score store"))
    }

    pub fn append(&self, score: Score) -> StoreResult<()> {
        let mut h = self.lock()?;
        h.by_talent.entry(score.talent_id.clone()).or_default().push(score);
        h.total += 1;
        Ok(())
    }

    /// Point-in-time copy of every talent's history for the rebuild pass.
    /// Appends racing with this call either land in the copy or wait for the next one.
    pub fn all_for_rebuild(&self) -> StoreResult<Vec<(TalentId, Vec<Score>)>> {
        let h = self.lock()?;
        Ok(h.by_talent.iter().map(|(t, s)| (t.clone(), s.clone())).collect())
    }

    /// One talent's scores in append order.
    pub fn scores_for(&self, talent_id: &TalentId) -> StoreResult<Vec<Score>> {
        Ok(self.lock()?.by_talent.get(talent_id).cloned().unwrap_or_default())
    }

    pub fn len(&self) -> StoreResult<usize> { Ok(self.lock()?.total) }
    pub fn is_empty(&self) -> StoreResult<bool> { Ok(self.lock()?.total == 0) }
    pub fn talents(&self) -> StoreResult<usize> { Ok(self.lock()?.by_talent.len()) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use cuju_core::Skill;

    fn score(talent: &str, skill: Skill, value: i64, ev: &str) -> Score {
        Score { talent_id: talent.into(), skill, score: value, source_event_id: ev.into(), event_ts: Utc::now() }
    }

    #[test]
    fn append_keeps_history_per_talent() {
        let store = ScoreStore::new();
        store.append(score("t1", Skill::Dribble, 50, "e1")).unwrap();
        store.append(score("t1", Skill::Shoot, 80, "e2")).unwrap();
        store.append(score("t1", Skill::Shoot, 20, "e3")).unwrap();
        store.append(score("t2", Skill::Pass, 10, "e4")).unwrap();

        assert_eq!(store.len().unwrap(), 4);
        assert_eq!(store.talents().unwrap(), 2);
        let hist: Vec<i64> = store.scores_for(&"t1".into()).unwrap().iter().map(|s| s.score).collect();
        assert_eq!(hist, vec![50, 80, 20]);
        assert!(store.scores_for(&"nobody".into()).unwrap().is_empty());

        let mut all = store.all_for_rebuild().unwrap();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].1.len(), 3);
        assert_eq!(all[1].1[0].source_event_id, "e4");
    }
}
