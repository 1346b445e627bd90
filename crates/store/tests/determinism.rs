#![forbid(unsafe_code)]

use chrono::{TimeZone, Utc};
use cuju_core::{NoopMetrics, Score, Skill};
use cuju_store::{Leaderboard, ScoreStore};

fn score(talent: &str, value: i64, ev: &str, secs: i64) -> Score {
    Score {
        talent_id: talent.into(),
        skill: Skill::Shoot,
        score: value,
        source_event_id: ev.into(),
        event_ts: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
    }
}

fn run_sequence(seq: &[Score]) -> Vec<(String, i64, usize)> {
    let scores = ScoreStore::new();
    for s in seq.iter().cloned() { scores.append(s).unwrap(); }
    let board = Leaderboard::new();
    board.rebuild_now(&scores, &NoopMetrics).unwrap();
    board.top_n(usize::MAX).iter().map(|e| (e.talent_id.to_string(), e.best_score.score, e.rank)).collect()
}

#[test]
fn ranking_is_independent_of_arrival_order() {
    // Lots of equal scores so any hidden dependence on map iteration shows up.
    let mut seq: Vec<Score> = (0..40)
        .map(|i| score(&format!("talent-{:02}", i % 13), 50 + (i % 3), &format!("e{i}"), i % 4))
        .collect();
    let forward = run_sequence(&seq);
    seq.reverse();
    let backward = run_sequence(&seq);
    assert_eq!(forward, backward, "canonical ranking must not depend on insertion order");
    assert_eq!(forward.len(), 13);
}
