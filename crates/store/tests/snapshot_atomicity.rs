#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use cuju_core::{NoopMetrics, Score, Skill};
use cuju_store::{Leaderboard, ScoreStore};

fn score(talent: usize, value: i64, ev: usize) -> Score {
    Score {
        talent_id: format!("t{talent}").into(),
        skill: Skill::Dribble,
        score: value,
        source_event_id: format!("e{ev}"),
        event_ts: Utc::now(),
    }
}

/// Readers hammer the board while scores keep arriving and rebuilds keep
/// swapping; every observed snapshot must be internally consistent.
#[test]
fn readers_never_see_torn_snapshots() {
    let scores = Arc::new(ScoreStore::new());
    let board = Leaderboard::new();
    let stop = Arc::new(AtomicBool::new(false));

    let writer = {
        let (scores, board, stop) = (Arc::clone(&scores), board.clone(), Arc::clone(&stop));
        std::thread::spawn(move || {
            for i in 0..400usize {
                scores.append(score(i % 37, (i * 7 % 101) as i64, i)).unwrap();
                if i % 5 == 0 { board.rebuild_now(&scores, &NoopMetrics).unwrap(); }
            }
            stop.store(true, Ordering::SeqCst);
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|n| {
            let (board, stop) = (board.clone(), Arc::clone(&stop));
            std::thread::spawn(move || {
                let limit = 5 + n * 3;
                let mut last_epoch = 0;
                while !stop.load(Ordering::SeqCst) {
                    let snap = board.current();
                    assert!(snap.epoch >= last_epoch, "epochs never go backwards");
                    last_epoch = snap.epoch;

                    let top = snap.top_n(limit);
                    assert_eq!(top.len(), limit.min(snap.len()));
                    for (pos, e) in top.iter().enumerate() {
                        assert_eq!(e.rank, pos + 1);
                        assert_eq!(snap.rank_of(&e.talent_id).as_ref(), Some(e));
                    }
                    assert!(top.windows(2).all(|w| w[0].best_score.score >= w[1].best_score.score));

                    // Free-standing reads copy out of whatever is current.
                    let live = board.top_n(limit);
                    assert!(live.iter().enumerate().all(|(pos, e)| e.rank == pos + 1));
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for r in readers { r.join().unwrap(); }

    board.rebuild_now(&scores, &NoopMetrics).unwrap();
    let snap = board.current();
    assert_eq!(snap.len(), 37);
    assert_eq!(snap.entries().iter().map(|e| e.rank).collect::<Vec<_>>(), (1..=37).collect::<Vec<_>>());
}
