//! Recompute behaviour end to end: worked scenarios, invariants and failure paths.

use std::collections::HashMap;
use std::sync::Arc;

use league_standings::engine::{StandingsEngine, StandingsStatus};
use league_standings::types::{MatchStatus, Standing};

use crate::harness::{FlakyStore, Fault, TestDb, SEASON};

fn expect(played: u32, win: u32, draw: u32, loss: u32, gf: u32, ga: u32, points: i32) -> (u32, u32, u32, u32, u32, u32, i32, i32) {
    (played, win, draw, loss, gf, ga, gf as i32 - ga as i32, points)
}

fn actual(s: &Standing) -> (u32, u32, u32, u32, u32, u32, i32, i32) {
    (s.played, s.win, s.draw, s.loss, s.gf, s.ga, s.gd, s.points)
}

#[tokio::test]
async fn test_worked_scenarios() {
    let db = TestDb::new().await;
    let engine = db.engine();
    let league = db.league("Scenario League").await;
    let t = db.teams(league.id, &["Team1", "Team2", "Team3"]).await;

    // Team1 beats Team2 3-1
    db.play(league.id, SEASON, 0, &t[0], &t[1], 3, 1).await;
    engine.recompute(league.id).await.unwrap();

    let t1 = db.standing(league.id, SEASON, &t[0]).await.unwrap();
    let t2 = db.standing(league.id, SEASON, &t[1]).await.unwrap();
    assert_eq!(actual(&t1), expect(1, 1, 0, 0, 3, 1, 3));
    assert_eq!(actual(&t2), expect(1, 0, 0, 1, 1, 3, 0));
    assert_eq!(t2.gd, -2);

    // Team1 draws Team3 1-1
    db.play(league.id, SEASON, 7, &t[0], &t[2], 1, 1).await;
    engine.recompute(league.id).await.unwrap();

    let t1 = db.standing(league.id, SEASON, &t[0]).await.unwrap();
    assert_eq!(actual(&t1), expect(2, 1, 1, 0, 4, 2, 4));

    // Team1 2-2 Team2: one more played and drawn, goal difference unchanged
    db.play(league.id, SEASON, 14, &t[0], &t[1], 2, 2).await;
    engine.recompute(league.id).await.unwrap();

    let after = db.standing(league.id, SEASON, &t[0]).await.unwrap();
    assert_eq!(after.played, t1.played + 1);
    assert_eq!(after.draw, t1.draw + 1);
    assert_eq!(after.gd, 2);

    // A scheduled fixture counts for nothing until it is finished
    let fixture = db.schedule(league.id, SEASON, 21, &t[1], &t[0]).await;
    let before = db.snapshot(league.id).await;
    engine.recompute(league.id).await.unwrap();
    assert_eq!(db.snapshot(league.id).await, before);

    db.store
        .set_match_result(fixture, MatchStatus::Finished, Some(1), Some(0))
        .await
        .unwrap();
    engine.recompute(league.id).await.unwrap();
    let t1 = db.standing(league.id, SEASON, &t[0]).await.unwrap();
    assert_eq!(t1.played, 4);
    assert_eq!(t1.loss, 1);
}

#[tokio::test]
async fn test_recompute_is_idempotent() {
    let db = TestDb::new().await;
    let engine = db.engine();
    let league = db.league("Idempotent").await;
    let t = db.teams(league.id, &["A", "B", "C", "D"]).await;

    db.play(league.id, SEASON, 0, &t[0], &t[1], 2, 0).await;
    db.play(league.id, SEASON, 1, &t[2], &t[3], 1, 1).await;
    db.play(league.id, "2023/2024", 0, &t[3], &t[0], 0, 4).await;

    let first = engine.recompute(league.id).await.unwrap();
    let snapshot = db.snapshot(league.id).await;
    let second = engine.recompute(league.id).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(db.snapshot(league.id).await, snapshot);
    assert_eq!(snapshot.len(), 6);
}

#[tokio::test]
async fn test_played_and_goals_are_conserved_per_season() {
    let db = TestDb::new().await;
    let engine = db.engine();
    let league = db.league("Conservation").await;
    let t = db.teams(league.id, &["A", "B", "C", "D", "E"]).await;

    // Double round robin with deterministic scores across two seasons
    let mut finished: HashMap<&str, u32> = HashMap::new();
    let mut n = 0;
    for season in ["2022/2023", "2023/2024"] {
        for (i, home) in t.iter().enumerate() {
            for (j, away) in t.iter().enumerate() {
                if i == j {
                    continue;
                }
                n += 1;
                let hs = ((i * 3 + j) % 4) as u16;
                let aws = ((j * 2 + i + n) % 3) as u16;
                db.play(league.id, season, n as i64, home, away, hs, aws).await;
                *finished.entry(season).or_default() += 1;
            }
        }
    }
    // One unplayed fixture that must not count
    db.schedule(league.id, "2023/2024", 400, &t[0], &t[1]).await;

    let report = engine.recompute(league.id).await.unwrap();
    assert_eq!(report.matches_counted, 40);
    assert_eq!(report.seasons, 2);

    for (season, count) in finished {
        let rows: Vec<_> = db
            .snapshot(league.id)
            .await
            .into_iter()
            .filter(|s| s.season == season)
            .collect();
        let played: u32 = rows.iter().map(|s| s.played).sum();
        let gf: u32 = rows.iter().map(|s| s.gf).sum();
        let ga: u32 = rows.iter().map(|s| s.ga).sum();
        let gd: i32 = rows.iter().map(|s| s.gd).sum();

        assert_eq!(played, 2 * count, "season {season}");
        assert_eq!(gf, ga, "season {season}");
        assert_eq!(gd, 0, "season {season}");
        for s in &rows {
            assert_eq!(s.played, s.win + s.draw + s.loss);
            assert_eq!(s.points, 3 * s.win as i32 + s.draw as i32);
        }
    }
}

#[tokio::test]
async fn test_idle_league_clears_stale_rows() {
    let db = TestDb::new().await;
    let engine = db.engine();
    let league = db.league("Idle").await;
    let t = db.teams(league.id, &["A", "B"]).await;

    let report = engine.recompute(league.id).await.unwrap();
    assert_eq!(report.rows_written, 0);
    assert!(db.snapshot(league.id).await.is_empty());

    // A match played then reverted to postponed leaves nothing behind
    let id = db.play(league.id, SEASON, 0, &t[0], &t[1], 1, 0).await;
    engine.recompute(league.id).await.unwrap();
    assert_eq!(db.snapshot(league.id).await.len(), 2);

    db.store
        .set_match_result(id, MatchStatus::Postponed, None, None)
        .await
        .unwrap();
    engine.recompute(league.id).await.unwrap();
    assert!(db.snapshot(league.id).await.is_empty());
}

#[tokio::test]
async fn test_deleted_match_drops_out_of_table() {
    let db = TestDb::new().await;
    let engine = db.engine();
    let league = db.league("Shrinking").await;
    let t = db.teams(league.id, &["A", "B", "C"]).await;

    db.play(league.id, SEASON, 0, &t[0], &t[1], 2, 0).await;
    let gone = db.play(league.id, SEASON, 1, &t[2], &t[0], 1, 1).await;
    engine.recompute(league.id).await.unwrap();
    assert_eq!(db.snapshot(league.id).await.len(), 3);

    assert_eq!(db.store.delete_match(gone).await.unwrap(), league.id);
    engine.recompute(league.id).await.unwrap();

    let rows = db.snapshot(league.id).await;
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|s| s.team_id != t[2].id));
    assert_eq!(rows.iter().map(|s| s.played).sum::<u32>(), 2);
}

#[tokio::test]
async fn test_recompute_leaves_other_leagues_alone() {
    let db = TestDb::new().await;
    let engine = db.engine();
    let a = db.league("League A").await;
    let b = db.league("League B").await;
    let ta = db.teams(a.id, &["A1", "A2"]).await;
    let tb = db.teams(b.id, &["B1", "B2"]).await;

    db.play(a.id, SEASON, 0, &ta[0], &ta[1], 1, 0).await;
    db.play(b.id, SEASON, 0, &tb[0], &tb[1], 0, 2).await;
    engine.recompute(b.id).await.unwrap();
    let b_rows = db.snapshot(b.id).await;

    // League B changes without a recompute; recomputing A must not touch B
    db.play(b.id, SEASON, 1, &tb[1], &tb[0], 5, 5).await;
    engine.recompute(a.id).await.unwrap();

    assert_eq!(db.snapshot(b.id).await, b_rows);
    assert_eq!(db.snapshot(a.id).await.len(), 2);
}

#[tokio::test]
async fn test_concurrent_recomputes_of_same_league() {
    let db = TestDb::new().await;
    let engine = Arc::new(db.engine());
    let league = db.league("Busy").await;
    let t = db.teams(league.id, &["A", "B", "C"]).await;
    for n in 0..12 {
        let (h, a) = (&t[n % 3], &t[(n + 1) % 3]);
        db.play(league.id, SEASON, n as i64, h, a, (n % 4) as u16, (n % 2) as u16).await;
    }

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let league_id = league.id;
            tokio::spawn(async move { engine.recompute(league_id).await })
        })
        .collect();

    for handle in handles {
        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.rows_written, 3);
    }

    let rows = db.snapshot(league.id).await;
    assert_eq!(rows.len(), 3);
    assert_eq!(rows.iter().map(|s| s.played).sum::<u32>(), 24);
    assert!(!engine.locks().is_locked(league.id));
    assert!(engine.locks().is_empty());
}

#[tokio::test]
async fn test_failed_recompute_keeps_previous_rows() {
    let db = TestDb::new().await;
    let flaky = Arc::new(FlakyStore::new(Arc::clone(&db.store)));
    let engine = StandingsEngine::new(Arc::clone(&flaky));
    let league = db.league("Fragile").await;
    let t = db.teams(league.id, &["A", "B"]).await;

    db.play(league.id, SEASON, 0, &t[0], &t[1], 2, 1).await;
    engine.recompute(league.id).await.unwrap();
    let committed = db.snapshot(league.id).await;

    db.play(league.id, SEASON, 1, &t[1], &t[0], 3, 0).await;

    for fault in [Fault::Read, Fault::Write] {
        flaky.set_fault(Some(fault));
        let status = StandingsStatus::from(engine.recompute(league.id).await);
        assert!(status.is_stale(), "{fault:?}");
        assert_eq!(db.snapshot(league.id).await, committed, "{fault:?}");
    }

    // Once the store recovers the next recompute catches up
    flaky.set_fault(None);
    engine.recompute(league.id).await.unwrap();
    let rows = db.snapshot(league.id).await;
    assert!(rows.iter().all(|s| s.played == 2));
}

#[tokio::test]
async fn test_unknown_league_is_not_found() {
    let db = TestDb::new().await;
    let err = db.engine().recompute(4242).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_recompute_all_covers_every_league() {
    let db = TestDb::new().await;
    let a = db.league("All A").await;
    let b = db.league("All B").await;
    let ta = db.teams(a.id, &["X", "Y"]).await;
    db.teams(b.id, &["Z"]).await;
    db.play(a.id, SEASON, 0, &ta[0], &ta[1], 0, 0).await;

    let results = db.engine().recompute_all().await.unwrap();
    assert_eq!(results.len(), 2);
    for (league_id, result) in results {
        let report = result.unwrap();
        let expected = if league_id == a.id { 2 } else { 0 };
        assert_eq!(report.rows_written, expected);
    }
}

#[tokio::test]
async fn test_table_ordering_tiebreaks() {
    let db = TestDb::new().await;
    let engine = db.engine();
    let league = db.league("Ordering").await;
    let t = db.teams(league.id, &["Delta", "Alpha", "Charlie", "Bravo"]).await;

    // Delta and Alpha finish level on points, gd and gf; name decides
    db.play(league.id, SEASON, 0, &t[0], &t[2], 2, 0).await;
    db.play(league.id, SEASON, 1, &t[1], &t[3], 2, 0).await;
    engine.recompute(league.id).await.unwrap();

    let table = db.store.standings_table(league.id, SEASON).await.unwrap();
    let names: Vec<_> = table.iter().map(|r| r.team_name.as_str()).collect();
    assert_eq!(names, ["Alpha", "Delta", "Bravo", "Charlie"]);
    let positions: Vec<_> = table.iter().map(|r| r.position).collect();
    assert_eq!(positions, [1, 2, 3, 4]);
}
