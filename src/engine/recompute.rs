//! Standings recomputation.
//!
//! Reads a league's finished matches, folds them through [`tally`] and
//! replaces the league's standings in one transaction. Recomputes of the
//! same league are serialised through [`LeagueLocks`]; different leagues
//! never wait on each other.

use futures::future::join_all;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::OwnedMutexGuard;
use tracing::{error, info, instrument};

use super::tally;
use crate::storage::StandingsStore;
use crate::types::{LeagueId, StandingsError};

// ---------------------------------------------------------------------------
// Per-league locks
// ---------------------------------------------------------------------------

/// One async mutex per league id, created on first use and dropped again
/// once nobody holds or waits for it.
#[derive(Debug, Default)]
pub struct LeagueLocks {
    locks: Mutex<HashMap<LeagueId, Arc<tokio::sync::Mutex<()>>>>,
}

/// Exclusive access to one league. Releasing it prunes idle registry entries.
pub struct LeagueGuard<'a> {
    locks: &'a LeagueLocks,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for LeagueGuard<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.registry();
        drop(self.guard.take());
        // Only the map's own handle left means no holder and no waiter.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}

impl LeagueLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<LeagueId, Arc<tokio::sync::Mutex<()>>>> {
        self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Wait for exclusive access to `league_id`. Released when the guard drops.
    pub async fn acquire(&self, league_id: LeagueId) -> LeagueGuard<'_> {
        let lock = {
            let mut locks = self.registry();
            Arc::clone(locks.entry(league_id).or_default())
        };
        let guard = lock.lock_owned().await;
        LeagueGuard {
            locks: self,
            guard: Some(guard),
        }
    }

    /// Whether a recompute of `league_id` is currently running.
    pub fn is_locked(&self, league_id: LeagueId) -> bool {
        self.registry()
            .get(&league_id)
            .map(|lock| lock.try_lock().is_err())
            .unwrap_or(false)
    }

    /// Leagues with a lock currently registered.
    pub fn len(&self) -> usize {
        self.registry().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Outcome of a successful recompute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecomputeReport {
    pub league_id: LeagueId,
    /// Finished matches folded into the table
    pub matches_counted: usize,
    /// Distinct seasons with at least one row
    pub seasons: usize,
    pub rows_written: u64,
}

/// Whether a league's standings reflect its matches after a triggering change.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum StandingsStatus {
    Updated(RecomputeReport),
    Stale { reason: String },
}

impl StandingsStatus {
    pub fn is_stale(&self) -> bool {
        matches!(self, StandingsStatus::Stale { .. })
    }
}

impl From<Result<RecomputeReport, StandingsError>> for StandingsStatus {
    fn from(result: Result<RecomputeReport, StandingsError>) -> Self {
        match result {
            Ok(report) => StandingsStatus::Updated(report),
            Err(e) => StandingsStatus::Stale {
                reason: e.to_string(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct StandingsEngine<S> {
    store: Arc<S>,
    locks: LeagueLocks,
}

impl<S: StandingsStore> StandingsEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            locks: LeagueLocks::new(),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn locks(&self) -> &LeagueLocks {
        &self.locks
    }

    /// Rebuild the standings of one league from its finished matches.
    ///
    /// Either every row of the league is replaced or, on error, the previous
    /// rows remain untouched. No other league is read or written.
    #[instrument(skip(self))]
    pub async fn recompute(&self, league_id: LeagueId) -> Result<RecomputeReport, StandingsError> {
        let _guard = self.locks.acquire(league_id).await;

        let league = self.store.get_league(league_id).await?;
        let matches = self.store.finished_matches(league_id).await?;
        let rows = tally::aggregate(league_id, &matches);
        let seasons = tally::season_count(&rows);

        let rows_written = self.store.replace_standings(league_id, &rows).await?;

        let report = RecomputeReport {
            league_id,
            matches_counted: matches.len(),
            seasons,
            rows_written,
        };

        info!(
            league = %league,
            matches = report.matches_counted,
            seasons = report.seasons,
            rows = report.rows_written,
            "Standings recomputed"
        );

        Ok(report)
    }

    /// Recompute every league concurrently. One league failing doesn't stop the others.
    pub async fn recompute_all(
        &self,
    ) -> Result<Vec<(LeagueId, Result<RecomputeReport, StandingsError>)>, StandingsError> {
        let leagues = self.store.list_leagues().await?;

        let results = join_all(leagues.iter().map(|league| async move {
            let result = self.recompute(league.id).await;
            if let Err(e) = &result {
                error!(league_id = league.id, error = %e, "Recompute failed");
            }
            (league.id, result)
        }))
        .await;

        Ok(results)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
