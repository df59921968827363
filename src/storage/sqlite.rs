//! SQLite-backed store.
//!
//! Wraps a `sqlx::SqlitePool` configured with foreign keys on, WAL journal
//! and a busy timeout so that concurrent writers wait instead of failing.
//! The schema in [`super::schema`] is applied on every connect.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::{QueryBuilder, Row, Sqlite};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use super::schema::SCHEMA;
use super::StandingsStore;
use crate::config::DatabaseConfig;
use crate::engine::ranking;
use crate::types::{
    sort_seasons, FinishedMatch, League, LeagueId, Match, MatchFilter, MatchId, MatchListing,
    MatchStatus, MatchTab, NewMatch, Standing, StandingsError, TableRow, Team, TeamId,
    TeamMatchStats,
};

/// Rows per INSERT statement. 11 bound columns each keeps a statement
/// under SQLite's default limit of 999 parameters.
const INSERT_CHUNK: usize = 80;

const MATCH_COLUMNS: &str = "id, league_id, season, date, home_team_id, away_team_id, status, \
     home_score, away_score, home_stats, away_stats";

const LISTED_MATCH_COLUMNS: &str = "m.id, m.league_id, m.season, m.date, m.home_team_id, \
     m.away_team_id, m.status, m.home_score, m.away_score, m.home_stats, m.away_stats";

const STANDING_COLUMNS: &str = "s.league_id, s.season, s.team_id, s.played, s.win, s.draw, \
     s.loss, s.gf, s.ga, s.gd, s.points";

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database described by `cfg` and apply the schema.
    pub async fn connect(cfg: &DatabaseConfig) -> Result<Self, StandingsError> {
        let options = SqliteConnectOptions::from_str(&cfg.url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(cfg.busy_timeout_secs));

        let pool = SqlitePoolOptions::new()
            .max_connections(cfg.max_connections.max(1))
            .acquire_timeout(Duration::from_secs(cfg.acquire_timeout_secs))
            .connect_with(options)
            .await?;

        info!(url = %cfg.url, max_connections = cfg.max_connections, "Database pool ready");

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// A private in-memory database on a single pinned connection.
    pub async fn in_memory() -> Result<Self, StandingsError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        // The database lives only as long as its connection, so never recycle it.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn init_schema(&self) -> Result<(), StandingsError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!(statements = SCHEMA.len(), "Schema applied");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    // -- Leagues and teams -------------------------------------------------

    /// Find a league by name, creating it with `country` if absent.
    pub async fn get_or_create_league(
        &self,
        name: &str,
        country: &str,
    ) -> Result<League, StandingsError> {
        sqlx::query("INSERT INTO leagues (name, country) VALUES (?, ?) ON CONFLICT (name) DO NOTHING")
            .bind(name)
            .bind(country)
            .execute(&self.pool)
            .await?;

        let row = sqlx::query("SELECT id, name, country FROM leagues WHERE name = ?")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        league_from_row(&row)
    }

    pub async fn get_or_create_team(
        &self,
        league_id: LeagueId,
        name: &str,
    ) -> Result<Team, StandingsError> {
        sqlx::query(
            "INSERT INTO teams (league_id, name) VALUES (?, ?) ON CONFLICT (league_id, name) DO NOTHING",
        )
        .bind(league_id)
        .bind(name)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query(
            "SELECT id, league_id, name, short_name, founded_year FROM teams WHERE league_id = ? AND name = ?",
        )
        .bind(league_id)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        team_from_row(&row)
    }

    pub async fn get_team(&self, team_id: TeamId) -> Result<Team, StandingsError> {
        let row = sqlx::query(
            "SELECT id, league_id, name, short_name, founded_year FROM teams WHERE id = ?",
        )
        .bind(team_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => team_from_row(&row),
            None => Err(StandingsError::TeamNotFound(team_id)),
        }
    }

    /// One page of a league's teams ordered by name, optionally narrowed to
    /// names containing `query` (case-insensitive).
    pub async fn list_teams(
        &self,
        league_id: LeagueId,
        query: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Team>, StandingsError> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT id, league_id, name, short_name, founded_year FROM teams WHERE league_id = ",
        );
        builder.push_bind(league_id);
        if let Some(q) = query.map(str::trim).filter(|q| !q.is_empty()) {
            builder
                .push(" AND instr(lower(name), lower(")
                .push_bind(q.to_string())
                .push(")) > 0");
        }
        builder.push(" ORDER BY name LIMIT ").push_bind(limit);
        builder.push(" OFFSET ").push_bind(offset);

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(team_from_row).collect()
    }

    // -- Matches -----------------------------------------------------------

    /// Insert a match unless one with the same league, season, date and
    /// pairing already exists. Returns the new id, or `None` for a duplicate.
    pub async fn insert_match_if_absent(
        &self,
        m: &NewMatch,
    ) -> Result<Option<MatchId>, StandingsError> {
        if m.home_team_id == m.away_team_id {
            return Err(StandingsError::InvalidData(format!(
                "team {} cannot play itself",
                m.home_team_id
            )));
        }

        let result = sqlx::query(
            r#"
            INSERT INTO matches (
                league_id, season, date, home_team_id, away_team_id, status,
                home_score, away_score, home_stats, away_stats
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (league_id, season, date, home_team_id, away_team_id) DO NOTHING
            "#,
        )
        .bind(m.league_id)
        .bind(&m.season)
        .bind(m.date)
        .bind(m.home_team_id)
        .bind(m.away_team_id)
        .bind(m.status.as_str())
        .bind(m.home_score)
        .bind(m.away_score)
        .bind(encode_stats(&m.home_stats)?)
        .bind(encode_stats(&m.away_stats)?)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            Ok(None)
        } else {
            Ok(Some(result.last_insert_rowid()))
        }
    }

    pub async fn get_match(&self, match_id: MatchId) -> Result<Match, StandingsError> {
        let row = sqlx::query(&format!("SELECT {MATCH_COLUMNS} FROM matches WHERE id = ?"))
            .bind(match_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => match_from_row(&row),
            None => Err(StandingsError::MatchNotFound(match_id)),
        }
    }

    /// Update a match's status and, when given, its score. An absent score
    /// keeps the stored value. Returns the league it belongs to, whose
    /// standings are now out of date.
    pub async fn set_match_result(
        &self,
        match_id: MatchId,
        status: MatchStatus,
        home_score: Option<u16>,
        away_score: Option<u16>,
    ) -> Result<LeagueId, StandingsError> {
        let row = sqlx::query(
            r#"
            UPDATE matches
            SET status = ?,
                home_score = COALESCE(?, home_score),
                away_score = COALESCE(?, away_score)
            WHERE id = ?
            RETURNING league_id
            "#,
        )
        .bind(status.as_str())
        .bind(home_score)
        .bind(away_score)
        .bind(match_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(row.try_get("league_id")?),
            None => Err(StandingsError::MatchNotFound(match_id)),
        }
    }

    /// Delete a match. Returns the league it belonged to.
    pub async fn delete_match(&self, match_id: MatchId) -> Result<LeagueId, StandingsError> {
        let row = sqlx::query("DELETE FROM matches WHERE id = ? RETURNING league_id")
            .bind(match_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(row.try_get("league_id")?),
            None => Err(StandingsError::MatchNotFound(match_id)),
        }
    }

    /// One page of a league's matches with team names, filtered by `filter`.
    ///
    /// Upcoming matches (dated after `now`, any status) come soonest first;
    /// every other view is newest first.
    pub async fn list_matches(
        &self,
        league_id: LeagueId,
        filter: &MatchFilter,
        now: DateTime<Utc>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<MatchListing>, StandingsError> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {LISTED_MATCH_COLUMNS}, h.name AS home_name, a.name AS away_name \
             FROM matches m \
             JOIN teams h ON h.id = m.home_team_id \
             JOIN teams a ON a.id = m.away_team_id \
             WHERE m.league_id = "
        ));
        builder.push_bind(league_id);

        match filter.tab {
            MatchTab::All => {}
            MatchTab::Upcoming => {
                builder.push(" AND m.date > ").push_bind(now);
            }
            MatchTab::Finished => {
                builder.push(" AND m.status = 'FINISHED'");
            }
        }

        if let Some(team) = filter.team.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            builder
                .push(" AND (instr(lower(h.name), lower(")
                .push_bind(team.to_string())
                .push(")) > 0 OR instr(lower(a.name), lower(")
                .push_bind(team.to_string())
                .push(")) > 0)");
        }
        // Stored dates start with YYYY-MM-DD, so the calendar day is a prefix.
        if let Some(from) = filter.from {
            builder
                .push(" AND substr(m.date, 1, 10) >= ")
                .push_bind(from.format("%Y-%m-%d").to_string());
        }
        if let Some(to) = filter.to {
            builder
                .push(" AND substr(m.date, 1, 10) <= ")
                .push_bind(to.format("%Y-%m-%d").to_string());
        }

        match filter.tab {
            MatchTab::Upcoming => builder.push(" ORDER BY m.date ASC, m.id ASC"),
            _ => builder.push(" ORDER BY m.date DESC, m.id DESC"),
        };
        builder.push(" LIMIT ").push_bind(limit);
        builder.push(" OFFSET ").push_bind(offset);

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| -> Result<MatchListing, StandingsError> {
                Ok(MatchListing {
                    home_team: row.try_get("home_name")?,
                    away_team: row.try_get("away_name")?,
                    details: match_from_row(row)?,
                })
            })
            .collect()
    }

    /// Distinct season labels of the league's matches, oldest first.
    pub async fn seasons(&self, league_id: LeagueId) -> Result<Vec<String>, StandingsError> {
        let labels: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT season FROM matches WHERE league_id = ?")
                .bind(league_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(sort_seasons(labels))
    }

    /// A team's finished matches in a season, newest first.
    pub async fn recent_results(
        &self,
        league_id: LeagueId,
        season: &str,
        team_id: TeamId,
        limit: u32,
    ) -> Result<Vec<Match>, StandingsError> {
        let rows = sqlx::query(&format!(
            "SELECT {MATCH_COLUMNS} FROM matches \
             WHERE league_id = ? AND season = ? AND status = 'FINISHED' \
               AND (home_team_id = ? OR away_team_id = ?) \
             ORDER BY date DESC LIMIT ?"
        ))
        .bind(league_id)
        .bind(season)
        .bind(team_id)
        .bind(team_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(match_from_row).collect()
    }

    /// A team's scheduled matches in a season after `after`, soonest first.
    pub async fn upcoming_fixtures(
        &self,
        league_id: LeagueId,
        season: &str,
        team_id: TeamId,
        after: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Match>, StandingsError> {
        let rows = sqlx::query(&format!(
            "SELECT {MATCH_COLUMNS} FROM matches \
             WHERE league_id = ? AND season = ? AND status = 'SCHEDULED' AND date > ? \
               AND (home_team_id = ? OR away_team_id = ?) \
             ORDER BY date ASC LIMIT ?"
        ))
        .bind(league_id)
        .bind(season)
        .bind(after)
        .bind(team_id)
        .bind(team_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(match_from_row).collect()
    }

    // -- Standings (read path) ---------------------------------------------

    /// Every standings row of the league, ordered by season then team id.
    pub async fn league_standings(&self, league_id: LeagueId) -> Result<Vec<Standing>, StandingsError> {
        let rows = sqlx::query(&format!(
            "SELECT {STANDING_COLUMNS} FROM standings s WHERE s.league_id = ? ORDER BY s.season, s.team_id"
        ))
        .bind(league_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(standing_from_row).collect()
    }

    /// The ranked table for one season.
    pub async fn standings_table(
        &self,
        league_id: LeagueId,
        season: &str,
    ) -> Result<Vec<TableRow>, StandingsError> {
        let rows = sqlx::query(&format!(
            "SELECT {STANDING_COLUMNS}, t.name AS team_name \
             FROM standings s JOIN teams t ON t.id = s.team_id \
             WHERE s.league_id = ? AND s.season = ?"
        ))
        .bind(league_id)
        .bind(season)
        .fetch_all(&self.pool)
        .await?;

        let pairs = rows
            .iter()
            .map(|row| -> Result<(Standing, String), StandingsError> {
                Ok((standing_from_row(row)?, row.try_get("team_name")?))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ranking::rank(pairs))
    }

    pub async fn team_standing(
        &self,
        league_id: LeagueId,
        season: &str,
        team_id: TeamId,
    ) -> Result<Option<Standing>, StandingsError> {
        let row = sqlx::query(&format!(
            "SELECT {STANDING_COLUMNS} FROM standings s \
             WHERE s.league_id = ? AND s.season = ? AND s.team_id = ?"
        ))
        .bind(league_id)
        .bind(season)
        .bind(team_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(standing_from_row).transpose()
    }
}

#[async_trait]
impl StandingsStore for SqliteStore {
    async fn get_league(&self, league_id: LeagueId) -> Result<League, StandingsError> {
        let row = sqlx::query("SELECT id, name, country FROM leagues WHERE id = ?")
            .bind(league_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => league_from_row(&row),
            None => Err(StandingsError::LeagueNotFound(league_id)),
        }
    }

    async fn list_leagues(&self) -> Result<Vec<League>, StandingsError> {
        let rows = sqlx::query("SELECT id, name, country FROM leagues ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(league_from_row).collect()
    }

    async fn finished_matches(&self, league_id: LeagueId) -> Result<Vec<FinishedMatch>, StandingsError> {
        let rows = sqlx::query(
            r#"
            SELECT id, season, home_team_id, away_team_id, home_score, away_score
            FROM matches
            WHERE league_id = ? AND status = 'FINISHED'
            "#,
        )
        .bind(league_id)
        .fetch_all(&self.pool)
        .await?;

        let matches = rows
            .iter()
            .map(|row| -> Result<FinishedMatch, StandingsError> {
                Ok(FinishedMatch {
                    id: row.try_get("id")?,
                    season: row.try_get("season")?,
                    home_team_id: row.try_get("home_team_id")?,
                    away_team_id: row.try_get("away_team_id")?,
                    home_score: row.try_get("home_score")?,
                    away_score: row.try_get("away_score")?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(league_id, count = matches.len(), "Loaded finished matches");
        Ok(matches)
    }

    async fn replace_standings(
        &self,
        league_id: LeagueId,
        rows: &[Standing],
    ) -> Result<u64, StandingsError> {
        if let Some(stray) = rows.iter().find(|r| r.league_id != league_id) {
            return Err(StandingsError::InvalidData(format!(
                "standing for league {} passed to replace league {league_id}",
                stray.league_id
            )));
        }

        // Dropping `tx` on any early return rolls the whole replacement back.
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM standings WHERE league_id = ?")
            .bind(league_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let mut written = 0;
        for chunk in rows.chunks(INSERT_CHUNK) {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO standings (league_id, season, team_id, played, win, draw, loss, gf, ga, gd, points) ",
            );
            builder.push_values(chunk, |mut b, r| {
                b.push_bind(r.league_id)
                    .push_bind(r.season.clone())
                    .push_bind(r.team_id)
                    .push_bind(r.played)
                    .push_bind(r.win)
                    .push_bind(r.draw)
                    .push_bind(r.loss)
                    .push_bind(r.gf)
                    .push_bind(r.ga)
                    .push_bind(r.gd)
                    .push_bind(r.points);
            });
            written += builder.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;

        info!(league_id, deleted, written, "Standings replaced");
        Ok(written)
    }
}

// ---------------------------------------------------------------------------
// Row decoding
// ---------------------------------------------------------------------------

fn league_from_row(row: &SqliteRow) -> Result<League, StandingsError> {
    Ok(League {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        country: row.try_get("country")?,
    })
}

fn team_from_row(row: &SqliteRow) -> Result<Team, StandingsError> {
    Ok(Team {
        id: row.try_get("id")?,
        league_id: row.try_get("league_id")?,
        name: row.try_get("name")?,
        short_name: row.try_get("short_name")?,
        founded_year: row.try_get("founded_year")?,
    })
}

fn match_from_row(row: &SqliteRow) -> Result<Match, StandingsError> {
    let status: String = row.try_get("status")?;
    let home_stats: String = row.try_get("home_stats")?;
    let away_stats: String = row.try_get("away_stats")?;

    Ok(Match {
        id: row.try_get("id")?,
        league_id: row.try_get("league_id")?,
        season: row.try_get("season")?,
        date: row.try_get("date")?,
        home_team_id: row.try_get("home_team_id")?,
        away_team_id: row.try_get("away_team_id")?,
        status: status
            .parse()
            .map_err(|_| StandingsError::Decode(format!("match status: {status:?}")))?,
        home_score: row.try_get("home_score")?,
        away_score: row.try_get("away_score")?,
        home_stats: decode_stats(&home_stats)?,
        away_stats: decode_stats(&away_stats)?,
    })
}

fn standing_from_row(row: &SqliteRow) -> Result<Standing, StandingsError> {
    Ok(Standing {
        league_id: row.try_get("league_id")?,
        season: row.try_get("season")?,
        team_id: row.try_get("team_id")?,
        played: row.try_get("played")?,
        win: row.try_get("win")?,
        draw: row.try_get("draw")?,
        loss: row.try_get("loss")?,
        gf: row.try_get("gf")?,
        ga: row.try_get("ga")?,
        gd: row.try_get("gd")?,
        points: row.try_get("points")?,
    })
}

fn encode_stats(stats: &TeamMatchStats) -> Result<String, StandingsError> {
    stats.check()?;
    serde_json::to_string(stats)
        .map_err(|e| StandingsError::InvalidData(format!("match stats: {e}")))
}

fn decode_stats(raw: &str) -> Result<TeamMatchStats, StandingsError> {
    serde_json::from_str(raw).map_err(|e| StandingsError::Decode(format!("match stats: {e}")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
