//! Standings API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<ApiState>`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use super::error::ApiError;
use crate::config::TableConfig;
use crate::engine::{RecomputeReport, StandingsEngine, StandingsStatus};
use crate::storage::{SqliteStore, StandingsStore};
use crate::types::{
    League, LeagueId, Match, MatchFilter, MatchId, MatchListing, MatchStatus, MatchTab, NewMatch,
    Standing, TableRow, Team, TeamId, TeamMatchStats,
};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct ApiState {
    pub engine: StandingsEngine<SqliteStore>,
    pub table: TableConfig,
}

impl ApiState {
    pub fn new(store: Arc<SqliteStore>, table: TableConfig) -> Self {
        Self {
            engine: StandingsEngine::new(store),
            table,
        }
    }

    fn store(&self) -> &SqliteStore {
        self.engine.store()
    }
}

pub type AppState = Arc<ApiState>;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct SeasonQuery {
    pub season: Option<String>,
}

impl SeasonQuery {
    /// The requested season, or the latest one when none (or an empty one) is given.
    fn resolve(self, seasons: &[String]) -> Option<String> {
        self.season
            .filter(|s| !s.trim().is_empty())
            .or_else(|| seasons.last().cloned())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LeagueOverview {
    pub league: League,
    pub seasons: Vec<String>,
    pub latest_season: Option<String>,
    /// Top of the latest season's table
    pub table: Vec<TableRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StandingsResponse {
    pub league: League,
    pub seasons: Vec<String>,
    pub selected_season: Option<String>,
    pub table: Vec<TableRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TeamSeasonResponse {
    pub team: Team,
    pub seasons: Vec<String>,
    pub selected_season: Option<String>,
    pub standing: Option<Standing>,
    pub recent_results: Vec<Match>,
    pub upcoming_fixtures: Vec<Match>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MatchListQuery {
    #[serde(default)]
    pub tab: MatchTab,
    pub team: Option<String>,
    /// First day, `YYYY-MM-DD`
    pub from: Option<String>,
    /// Last day, `YYYY-MM-DD`
    pub to: Option<String>,
    /// 1-based
    pub page: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchListResponse {
    pub league: League,
    pub tab: MatchTab,
    pub page: u32,
    pub matches: Vec<MatchListing>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TeamListQuery {
    pub q: Option<String>,
    pub page: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TeamListResponse {
    pub league: League,
    pub q: String,
    pub page: u32,
    pub teams: Vec<Team>,
}

/// Body of a match creation. Status defaults to FINISHED and scores to 0.
#[derive(Debug, Clone, Deserialize)]
pub struct NewMatchRequest {
    pub season: String,
    pub date: DateTime<Utc>,
    pub home_team_id: TeamId,
    pub away_team_id: TeamId,
    #[serde(default = "finished")]
    pub status: MatchStatus,
    #[serde(default)]
    pub home_score: u16,
    #[serde(default)]
    pub away_score: u16,
    #[serde(default)]
    pub home_stats: TeamMatchStats,
    #[serde(default)]
    pub away_stats: TeamMatchStats,
}

fn finished() -> MatchStatus {
    MatchStatus::Finished
}

/// Body of a result edit. An omitted score keeps the stored one.
#[derive(Debug, Clone, Deserialize)]
pub struct ResultUpdate {
    pub status: MatchStatus,
    pub home_score: Option<u16>,
    pub away_score: Option<u16>,
}

/// Reply to any match change that triggers a recompute.
#[derive(Debug, Clone, Serialize)]
pub struct MatchChangeResponse {
    pub match_id: MatchId,
    pub league_id: LeagueId,
    pub standings: StandingsStatus,
}

fn page_offset(page: Option<u32>, per_page: u32) -> (u32, u32) {
    let page = page.unwrap_or(1).max(1);
    (page, (page - 1).saturating_mul(per_page))
}

fn parse_day(raw: Option<String>, field: &str) -> Result<Option<NaiveDate>, ApiError> {
    match raw.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(day) => NaiveDate::parse_from_str(day, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| ApiError::BadRequest(format!("{field}: expected YYYY-MM-DD, got {day:?}"))),
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/leagues
pub async fn list_leagues(State(state): State<AppState>) -> Result<Json<Vec<League>>, ApiError> {
    Ok(Json(state.store().list_leagues().await?))
}

/// GET /api/leagues/:league_id
pub async fn get_league_overview(
    State(state): State<AppState>,
    Path(league_id): Path<LeagueId>,
) -> Result<Json<LeagueOverview>, ApiError> {
    let store = state.store();
    let league = store.get_league(league_id).await?;
    let seasons = store.seasons(league_id).await?;
    let latest_season = seasons.last().cloned();

    let mut table = match &latest_season {
        Some(season) => store.standings_table(league_id, season).await?,
        None => Vec::new(),
    };
    table.truncate(state.table.overview_rows);

    Ok(Json(LeagueOverview {
        league,
        seasons,
        latest_season,
        table,
    }))
}

/// GET /api/leagues/:league_id/standings?season=
pub async fn get_standings(
    State(state): State<AppState>,
    Path(league_id): Path<LeagueId>,
    Query(query): Query<SeasonQuery>,
) -> Result<Json<StandingsResponse>, ApiError> {
    let store = state.store();
    let league = store.get_league(league_id).await?;
    let seasons = store.seasons(league_id).await?;
    let selected_season = query.resolve(&seasons);

    let table = match &selected_season {
        Some(season) => store.standings_table(league_id, season).await?,
        None => Vec::new(),
    };

    Ok(Json(StandingsResponse {
        league,
        seasons,
        selected_season,
        table,
    }))
}

/// GET /api/leagues/:league_id/teams/:team_id?season=
pub async fn get_team_season(
    State(state): State<AppState>,
    Path((league_id, team_id)): Path<(LeagueId, TeamId)>,
    Query(query): Query<SeasonQuery>,
) -> Result<Json<TeamSeasonResponse>, ApiError> {
    let store = state.store();
    store.get_league(league_id).await?;
    let team = store.get_team(team_id).await?;
    if team.league_id != league_id {
        return Err(ApiError::NotFound(format!(
            "team {team_id} does not play in league {league_id}"
        )));
    }

    let seasons = store.seasons(league_id).await?;
    let selected_season = query.resolve(&seasons);

    let (standing, recent_results, upcoming_fixtures) = match &selected_season {
        Some(season) => (
            store.team_standing(league_id, season, team_id).await?,
            store
                .recent_results(league_id, season, team_id, state.table.recent_results)
                .await?,
            store
                .upcoming_fixtures(league_id, season, team_id, Utc::now(), state.table.upcoming_fixtures)
                .await?,
        ),
        None => (None, Vec::new(), Vec::new()),
    };

    Ok(Json(TeamSeasonResponse {
        team,
        seasons,
        selected_season,
        standing,
        recent_results,
        upcoming_fixtures,
    }))
}

/// POST /api/leagues/:league_id/recompute
pub async fn recompute_league(
    State(state): State<AppState>,
    Path(league_id): Path<LeagueId>,
) -> Result<Json<RecomputeReport>, ApiError> {
    let report = state.engine.recompute(league_id).await?;
    Ok(Json(report))
}

/// GET /api/leagues/:league_id/matches?tab=&team=&from=&to=&page=
pub async fn list_matches(
    State(state): State<AppState>,
    Path(league_id): Path<LeagueId>,
    Query(query): Query<MatchListQuery>,
) -> Result<Json<MatchListResponse>, ApiError> {
    let store = state.store();
    let league = store.get_league(league_id).await?;

    let filter = MatchFilter {
        tab: query.tab,
        team: query.team,
        from: parse_day(query.from, "from")?,
        to: parse_day(query.to, "to")?,
    };
    let per_page = state.table.matches_per_page;
    let (page, offset) = page_offset(query.page, per_page);
    let matches = store
        .list_matches(league_id, &filter, Utc::now(), per_page, offset)
        .await?;

    Ok(Json(MatchListResponse {
        league,
        tab: filter.tab,
        page,
        matches,
    }))
}

/// GET /api/leagues/:league_id/teams?q=&page=
pub async fn list_teams(
    State(state): State<AppState>,
    Path(league_id): Path<LeagueId>,
    Query(query): Query<TeamListQuery>,
) -> Result<Json<TeamListResponse>, ApiError> {
    let store = state.store();
    let league = store.get_league(league_id).await?;

    let q = query.q.unwrap_or_default().trim().to_string();
    let per_page = state.table.teams_per_page;
    let (page, offset) = page_offset(query.page, per_page);
    let teams = store
        .list_teams(league_id, Some(q.as_str()), per_page, offset)
        .await?;

    Ok(Json(TeamListResponse {
        league,
        q,
        page,
        teams,
    }))
}

/// POST /api/leagues/:league_id/matches
///
/// Both teams must belong to the league and differ. The league is
/// recomputed once the match is stored.
pub async fn create_match(
    State(state): State<AppState>,
    Path(league_id): Path<LeagueId>,
    Json(req): Json<NewMatchRequest>,
) -> Result<(StatusCode, Json<MatchChangeResponse>), ApiError> {
    let store = state.store();
    store.get_league(league_id).await?;

    if req.season.trim().is_empty() {
        return Err(ApiError::BadRequest("season must not be empty".into()));
    }
    if req.home_team_id == req.away_team_id {
        return Err(ApiError::BadRequest(
            "home and away team must differ".into(),
        ));
    }
    for team_id in [req.home_team_id, req.away_team_id] {
        let in_league = match store.get_team(team_id).await {
            Ok(team) => team.league_id == league_id,
            Err(e) if e.is_not_found() => false,
            Err(e) => return Err(e.into()),
        };
        if !in_league {
            return Err(ApiError::BadRequest(format!(
                "team {team_id} does not play in league {league_id}"
            )));
        }
    }

    let new_match = NewMatch {
        league_id,
        season: req.season.trim().to_string(),
        date: req.date,
        home_team_id: req.home_team_id,
        away_team_id: req.away_team_id,
        status: req.status,
        home_score: req.home_score,
        away_score: req.away_score,
        home_stats: req.home_stats,
        away_stats: req.away_stats,
    };
    let match_id = store
        .insert_match_if_absent(&new_match)
        .await?
        .ok_or_else(|| {
            ApiError::Conflict(format!(
                "a match between teams {} and {} on {} is already recorded",
                new_match.home_team_id, new_match.away_team_id, new_match.date
            ))
        })?;
    info!(match_id, league_id, status = %new_match.status, "Match created");

    let standings = recompute_after_change(&state, match_id, league_id).await;
    Ok((
        StatusCode::CREATED,
        Json(MatchChangeResponse {
            match_id,
            league_id,
            standings,
        }),
    ))
}

/// POST /api/matches/:match_id/result
///
/// Stores the new status and score, then recomputes the match's league.
/// A failed recompute leaves the update in place and is reported as stale.
pub async fn update_match_result(
    State(state): State<AppState>,
    Path(match_id): Path<MatchId>,
    Json(update): Json<ResultUpdate>,
) -> Result<Json<MatchChangeResponse>, ApiError> {
    let league_id = state
        .store()
        .set_match_result(match_id, update.status, update.home_score, update.away_score)
        .await?;
    info!(match_id, league_id, status = %update.status, "Match result updated");

    let standings = recompute_after_change(&state, match_id, league_id).await;
    Ok(Json(MatchChangeResponse {
        match_id,
        league_id,
        standings,
    }))
}

/// DELETE /api/matches/:match_id
pub async fn delete_match(
    State(state): State<AppState>,
    Path(match_id): Path<MatchId>,
) -> Result<Json<MatchChangeResponse>, ApiError> {
    let league_id = state.store().delete_match(match_id).await?;
    info!(match_id, league_id, "Match deleted");

    let standings = recompute_after_change(&state, match_id, league_id).await;
    Ok(Json(MatchChangeResponse {
        match_id,
        league_id,
        standings,
    }))
}

async fn recompute_after_change(
    state: &ApiState,
    match_id: MatchId,
    league_id: LeagueId,
) -> StandingsStatus {
    let standings = StandingsStatus::from(state.engine.recompute(league_id).await);
    if let StandingsStatus::Stale { reason } = &standings {
        warn!(match_id, league_id, %reason, "Standings left stale after match change");
    }
    standings
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
