//! Shared fixtures for integration tests.
//!
//! `TestDb` owns a throwaway database file; `FlakyStore` wraps a real store
//! and can be told to fail, so recompute failure paths run against SQLite.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use league_standings::config::DatabaseConfig;
use league_standings::engine::StandingsEngine;
use league_standings::storage::{SqliteStore, StandingsStore};
use league_standings::types::*;

pub const SEASON: &str = "2024/2025";

/// A database file under the system temp dir, removed on drop.
pub struct TestDb {
    pub store: Arc<SqliteStore>,
    path: PathBuf,
}

impl TestDb {
    pub async fn new() -> Self {
        let path = std::env::temp_dir().join(format!("standings-{}.db", Uuid::new_v4()));
        let cfg = DatabaseConfig {
            url: format!("sqlite://{}", path.display()),
            max_connections: 4,
            busy_timeout_secs: 5,
            acquire_timeout_secs: 10,
        };
        let store = SqliteStore::connect(&cfg).await.unwrap();
        Self {
            store: Arc::new(store),
            path,
        }
    }

    pub fn engine(&self) -> StandingsEngine<SqliteStore> {
        StandingsEngine::new(Arc::clone(&self.store))
    }

    pub async fn league(&self, name: &str) -> League {
        self.store.get_or_create_league(name, "").await.unwrap()
    }

    pub async fn teams(&self, league_id: LeagueId, names: &[&str]) -> Vec<Team> {
        let mut teams = Vec::new();
        for name in names {
            teams.push(self.store.get_or_create_team(league_id, name).await.unwrap());
        }
        teams
    }

    /// Insert a finished match `n` days into the season.
    #[allow(clippy::too_many_arguments)]
    pub async fn play(
        &self,
        league_id: LeagueId,
        season: &str,
        n: i64,
        home: &Team,
        away: &Team,
        home_score: u16,
        away_score: u16,
    ) -> MatchId {
        let m = NewMatch::finished(league_id, season, day(n), home.id, away.id, home_score, away_score);
        self.store.insert_match_if_absent(&m).await.unwrap().unwrap()
    }

    pub async fn schedule(&self, league_id: LeagueId, season: &str, n: i64, home: &Team, away: &Team) -> MatchId {
        let m = NewMatch::finished(league_id, season, day(n), home.id, away.id, 0, 0)
            .with_status(MatchStatus::Scheduled);
        self.store.insert_match_if_absent(&m).await.unwrap().unwrap()
    }

    pub async fn standing(&self, league_id: LeagueId, season: &str, team: &Team) -> Option<Standing> {
        self.store.team_standing(league_id, season, team.id).await.unwrap()
    }

    /// League rows with ids stripped, in a stable order for comparison.
    pub async fn snapshot(&self, league_id: LeagueId) -> Vec<Standing> {
        let mut rows = self.store.league_standings(league_id).await.unwrap();
        rows.sort_by(|a, b| (&a.season, a.team_id).cmp(&(&b.season, b.team_id)));
        rows
    }
}

impl Drop for TestDb {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut p = self.path.clone().into_os_string();
            p.push(suffix);
            let _ = std::fs::remove_file(p);
        }
    }
}

pub fn day(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 8, 1, 15, 0, 0).unwrap() + Duration::days(n)
}

// ---------------------------------------------------------------------------
// Fault injection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Reading finished matches fails before anything is written
    Read,
    /// The replacement includes a row whose team doesn't exist, so the
    /// insert fails after the old rows were deleted inside the transaction
    Write,
}

/// A `StandingsStore` over a real database with switchable failures.
pub struct FlakyStore {
    inner: Arc<SqliteStore>,
    fault: Mutex<Option<Fault>>,
}

impl FlakyStore {
    pub fn new(inner: Arc<SqliteStore>) -> Self {
        Self {
            inner,
            fault: Mutex::new(None),
        }
    }

    pub fn set_fault(&self, fault: Option<Fault>) {
        *self.fault.lock().unwrap() = fault;
    }

    fn fault(&self) -> Option<Fault> {
        *self.fault.lock().unwrap()
    }
}

#[async_trait]
impl StandingsStore for FlakyStore {
    async fn get_league(&self, league_id: LeagueId) -> Result<League, StandingsError> {
        self.inner.get_league(league_id).await
    }

    async fn list_leagues(&self) -> Result<Vec<League>, StandingsError> {
        self.inner.list_leagues().await
    }

    async fn finished_matches(&self, league_id: LeagueId) -> Result<Vec<FinishedMatch>, StandingsError> {
        if self.fault() == Some(Fault::Read) {
            return Err(StandingsError::Store(sqlx::Error::PoolTimedOut));
        }
        self.inner.finished_matches(league_id).await
    }

    async fn replace_standings(&self, league_id: LeagueId, rows: &[Standing]) -> Result<u64, StandingsError> {
        if self.fault() == Some(Fault::Write) {
            let mut rows = rows.to_vec();
            rows.push(Standing {
                league_id,
                season: SEASON.to_string(),
                team_id: 9_999_999,
                played: 0,
                win: 0,
                draw: 0,
                loss: 0,
                gf: 0,
                ga: 0,
                gd: 0,
                points: 0,
            });
            return self.inner.replace_standings(league_id, &rows).await;
        }
        self.inner.replace_standings(league_id, rows).await
    }
}
