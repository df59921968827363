//! Persistence layer.
//!
//! The engine talks to storage only through [`StandingsStore`]. The SQLite
//! implementation in [`sqlite`] also carries the league/team/match
//! operations used by the importer, the CLI and the JSON API.

pub mod schema;
pub mod sqlite;

use async_trait::async_trait;

use crate::types::{FinishedMatch, League, LeagueId, Standing, StandingsError};

pub use sqlite::SqliteStore;

/// What the standings engine needs from the relational store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StandingsStore: Send + Sync {
    /// Look up a league. Fails with `LeagueNotFound` if it does not exist.
    async fn get_league(&self, league_id: LeagueId) -> Result<League, StandingsError>;

    async fn list_leagues(&self) -> Result<Vec<League>, StandingsError>;

    /// All matches of the league with status FINISHED, in no particular order.
    async fn finished_matches(&self, league_id: LeagueId) -> Result<Vec<FinishedMatch>, StandingsError>;

    /// Atomically delete every standings row of the league and insert `rows`.
    /// On failure nothing changes. Returns the number of rows written.
    async fn replace_standings(
        &self,
        league_id: LeagueId,
        rows: &[Standing],
    ) -> Result<u64, StandingsError>;
}
