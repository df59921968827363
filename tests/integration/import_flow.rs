//! CSV import from disk through to ranked tables.

use std::io::Write;
use std::path::PathBuf;
use uuid::Uuid;

use league_standings::import::{import_csv_file, ImportError, ImportOptions};
use league_standings::storage::StandingsStore;

use crate::harness::TestDb;

const RESULTS: &str = "\
season,date,home_team,away_team,goal_home_ft,goal_away_ft,home_shots,away_shots,home_possession,away_possession
2023/2024,2023-08-12,Arsenal,Brentford,2,1,14,6,61.5,38.5
2023/2024,2023-08-19,Brentford,Chelsea,0,0,9,11,44.0,56.0
2023/2024,2023-08-26,Chelsea,Arsenal,1,3,,,,
2024/2025,2024-08-17,Arsenal,Chelsea,1,1,12,12,50,50
2024/2025,2024-08-24,,Brentford,1,0,,,,
2024/2025,2024-08-31,Chelsea,Brentford,two,0,,,,
";

/// A CSV file under the system temp dir, removed on drop.
struct CsvFile(PathBuf);

impl CsvFile {
    fn new(contents: &str) -> Self {
        let path = std::env::temp_dir().join(format!("results-{}.csv", Uuid::new_v4()));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        Self(path)
    }
}

impl Drop for CsvFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

fn options() -> ImportOptions {
    ImportOptions {
        league_name: "Premier League".to_string(),
        country: "England".to_string(),
    }
}

#[tokio::test]
async fn test_import_builds_tables() {
    let db = TestDb::new().await;
    let engine = db.engine();
    let csv = CsvFile::new(RESULTS);

    let report = import_csv_file(&engine, &csv.0, &options()).await.unwrap();

    assert_eq!(report.created, 4);
    assert_eq!(report.duplicates, 0);
    assert_eq!(report.skipped_blank, 1);
    assert_eq!(report.skipped_invalid, 1);
    assert!(!report.standings.is_stale());

    let league = db.store.get_league(report.league.id).await.unwrap();
    assert_eq!(league.country, "England");

    let seasons = db.store.seasons(league.id).await.unwrap();
    assert_eq!(seasons, ["2023/2024", "2024/2025"]);

    let table = db.store.standings_table(league.id, "2023/2024").await.unwrap();
    let top = &table[0];
    assert_eq!(top.team_name, "Arsenal");
    assert_eq!((top.standing.played, top.standing.points, top.standing.gd), (2, 6, 3));
    assert_eq!(table.len(), 3);

    let latest = db.store.standings_table(league.id, "2024/2025").await.unwrap();
    assert_eq!(latest.len(), 2);
    assert!(latest.iter().all(|r| r.standing.points == 1));
}

#[tokio::test]
async fn test_reimport_is_idempotent() {
    let db = TestDb::new().await;
    let engine = db.engine();
    let csv = CsvFile::new(RESULTS);

    let first = import_csv_file(&engine, &csv.0, &options()).await.unwrap();
    let rows = db.snapshot(first.league.id).await;

    let second = import_csv_file(&engine, &csv.0, &options()).await.unwrap();
    assert_eq!(second.league.id, first.league.id);
    assert_eq!(second.created, 0);
    assert_eq!(second.duplicates, 4);
    assert_eq!(db.snapshot(first.league.id).await, rows);
}

#[tokio::test]
async fn test_missing_columns_write_nothing() {
    let db = TestDb::new().await;
    let engine = db.engine();
    let csv = CsvFile::new("season,date,home_team,away_team\n2023/2024,2023-08-12,A,B\n");

    let err = import_csv_file(&engine, &csv.0, &options()).await.unwrap_err();
    match err {
        ImportError::MissingColumns(cols) => assert_eq!(cols, ["goal_home_ft", "goal_away_ft"]),
        other => panic!("unexpected error: {other}"),
    }
    assert!(db.store.list_leagues().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_file() {
    let db = TestDb::new().await;
    let engine = db.engine();
    let path = std::env::temp_dir().join(format!("absent-{}.csv", Uuid::new_v4()));

    let err = import_csv_file(&engine, &path, &options()).await.unwrap_err();
    assert!(matches!(err, ImportError::FileNotFound(p) if p == path));
}

#[tokio::test]
async fn test_imported_stats_are_kept() {
    let db = TestDb::new().await;
    let engine = db.engine();
    let csv = CsvFile::new(RESULTS);
    let report = import_csv_file(&engine, &csv.0, &options()).await.unwrap();

    let arsenal = db.store.get_or_create_team(report.league.id, "Arsenal").await.unwrap();
    let recent = db
        .store
        .recent_results(report.league.id, "2023/2024", arsenal.id, 5)
        .await
        .unwrap();

    assert_eq!(recent.len(), 2);
    // Newest first: the away win at Chelsea had no stats columns filled
    assert_eq!(recent[0].away_stats.shots, 0);
    assert_eq!(recent[1].home_stats.shots, 14);
    assert_eq!(recent[1].home_stats.possession, 61.5);
}
