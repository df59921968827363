//! Shared types for the standings engine.
//!
//! These types form the data model used across all modules. The persistence
//! layer owns leagues, teams and matches; standings are derived rows that
//! only the engine writes.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

pub type LeagueId = i64;
pub type TeamId = i64;
pub type MatchId = i64;

// ---------------------------------------------------------------------------
// League / Team
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct League {
    pub id: LeagueId,
    pub name: String,
    pub country: String,
}

impl fmt::Display for League {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.country.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{} ({})", self.name, self.country)
        }
    }
}

/// A team belongs to exactly one league.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub league_id: LeagueId,
    pub name: String,
    pub short_name: String,
    pub founded_year: Option<u16>,
}

// ---------------------------------------------------------------------------
// Match
// ---------------------------------------------------------------------------

/// Lifecycle state of a match. Only `Finished` matches count towards standings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MatchStatus {
    Scheduled,
    Live,
    Finished,
    Postponed,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Scheduled => "SCHEDULED",
            MatchStatus::Live => "LIVE",
            MatchStatus::Finished => "FINISHED",
            MatchStatus::Postponed => "POSTPONED",
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchStatus {
    type Err = StandingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SCHEDULED" => Ok(MatchStatus::Scheduled),
            "LIVE" => Ok(MatchStatus::Live),
            "FINISHED" => Ok(MatchStatus::Finished),
            "POSTPONED" => Ok(MatchStatus::Postponed),
            other => Err(StandingsError::InvalidData(format!("unknown match status: {other}"))),
        }
    }
}

/// Box score for one side of a match.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamMatchStats {
    pub clearances: u32,
    pub corners: u32,
    pub fouls_conceded: u32,
    pub offsides: u32,
    pub passes: u32,
    /// Ball possession in percent (0.0–100.0)
    pub possession: f64,
    pub red_cards: u32,
    pub shots: u32,
    pub shots_on_target: u32,
    pub tackles: u32,
    pub touches: u32,
    pub yellow_cards: u32,
}

impl TeamMatchStats {
    /// Possession must be a finite percentage; anything else can't be stored as JSON.
    pub fn check(&self) -> Result<(), StandingsError> {
        if self.possession.is_finite() && (0.0..=100.0).contains(&self.possession) {
            Ok(())
        } else {
            Err(StandingsError::InvalidData(format!(
                "possession out of range: {}",
                self.possession
            )))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub league_id: LeagueId,
    /// Free-form season label, e.g. "2024/2025"
    pub season: String,
    pub date: DateTime<Utc>,
    pub home_team_id: TeamId,
    pub away_team_id: TeamId,
    pub status: MatchStatus,
    /// Full-time scores; meaningful only once the match is finished
    pub home_score: u16,
    pub away_score: u16,
    pub home_stats: TeamMatchStats,
    pub away_stats: TeamMatchStats,
}

impl Match {
    pub fn is_finished(&self) -> bool {
        self.status == MatchStatus::Finished
    }
}

/// A match as listed for a league, with both team names resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchListing {
    #[serde(flatten)]
    pub details: Match,
    pub home_team: String,
    pub away_team: String,
}

/// Which slice of a league's matches to list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchTab {
    #[default]
    All,
    /// Dated after now, whatever the status
    Upcoming,
    Finished,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchFilter {
    pub tab: MatchTab,
    /// Case-insensitive substring of either team's name
    pub team: Option<String>,
    /// Inclusive calendar-day bounds on the match date
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// A match about to be inserted; the store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMatch {
    pub league_id: LeagueId,
    pub season: String,
    pub date: DateTime<Utc>,
    pub home_team_id: TeamId,
    pub away_team_id: TeamId,
    pub status: MatchStatus,
    pub home_score: u16,
    pub away_score: u16,
    pub home_stats: TeamMatchStats,
    pub away_stats: TeamMatchStats,
}

impl NewMatch {
    /// A finished match with empty box scores.
    pub fn finished(
        league_id: LeagueId,
        season: &str,
        date: DateTime<Utc>,
        home_team_id: TeamId,
        away_team_id: TeamId,
        home_score: u16,
        away_score: u16,
    ) -> Self {
        Self {
            league_id,
            season: season.to_string(),
            date,
            home_team_id,
            away_team_id,
            status: MatchStatus::Finished,
            home_score,
            away_score,
            home_stats: TeamMatchStats::default(),
            away_stats: TeamMatchStats::default(),
        }
    }

    pub fn with_status(mut self, status: MatchStatus) -> Self {
        self.status = status;
        self
    }
}

/// The slice of a finished match that the standings engine reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedMatch {
    pub id: MatchId,
    pub season: String,
    pub home_team_id: TeamId,
    pub away_team_id: TeamId,
    pub home_score: u16,
    pub away_score: u16,
}

// ---------------------------------------------------------------------------
// Standings
// ---------------------------------------------------------------------------

/// One derived standings row, unique per (league, season, team).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standing {
    pub league_id: LeagueId,
    pub season: String,
    pub team_id: TeamId,
    pub played: u32,
    pub win: u32,
    pub draw: u32,
    pub loss: u32,
    /// Goals for
    pub gf: u32,
    /// Goals against
    pub ga: u32,
    /// Goal difference (gf - ga)
    pub gd: i32,
    pub points: i32,
}

/// A standings row as presented: ranked and joined with the team name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableRow {
    /// 1-based table position
    pub position: usize,
    pub team_name: String,
    #[serde(flatten)]
    pub standing: Standing,
}

impl fmt::Display for TableRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.standing;
        write!(
            f,
            "{:>2}. {:<24} P{:>3} W{:>3} D{:>3} L{:>3} GF{:>4} GA{:>4} GD{:>+4} {:>4} pts",
            self.position, self.team_name, s.played, s.win, s.draw, s.loss, s.gf, s.ga, s.gd, s.points,
        )
    }
}

// ---------------------------------------------------------------------------
// Season ordering
// ---------------------------------------------------------------------------

/// A season label together with its parsed starting year.
///
/// Labels are ordered by start year, not by string comparison. Accepted
/// shapes are `2024/2025`, `2024/25`, `24/25`, `2024-2025` and `2024`;
/// two-digit years below 70 land in the 2000s, the rest in the 1900s.
/// Labels that match none of these sort before every recognised season.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Season {
    label: String,
    start_year: Option<u16>,
}

const TWO_DIGIT_PIVOT: u16 = 70;

impl Season {
    pub fn parse(label: &str) -> Self {
        Self {
            label: label.to_string(),
            start_year: parse_start_year(label.trim()),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn start_year(&self) -> Option<u16> {
        self.start_year
    }
}

fn expand_year(part: &str) -> Option<u16> {
    if !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let value: u16 = part.parse().ok()?;
    match part.len() {
        4 => Some(value),
        2 if value < TWO_DIGIT_PIVOT => Some(2000 + value),
        2 => Some(1900 + value),
        _ => None,
    }
}

fn parse_start_year(label: &str) -> Option<u16> {
    let mut parts = label.split(['/', '-']);
    let first = parts.next()?;
    match (parts.next(), parts.next()) {
        (None, _) if first.len() == 4 => expand_year(first),
        (Some(second), None) => {
            expand_year(second)?;
            expand_year(first)
        }
        _ => None,
    }
}

impl Ord for Season {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.start_year, other.start_year) {
            (Some(a), Some(b)) => a.cmp(&b).then_with(|| self.label.cmp(&other.label)),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => self.label.cmp(&other.label),
        }
    }
}

impl PartialOrd for Season {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// Sort season labels oldest first, dropping duplicates.
pub fn sort_seasons<I, S>(labels: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seasons: Vec<Season> = labels.into_iter().map(|l| Season::parse(l.as_ref())).collect();
    seasons.sort();
    seasons.dedup();
    seasons.into_iter().map(|s| s.label).collect()
}

/// The most recent season among `labels`, if any.
pub fn latest_season<I, S>(labels: I) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    labels
        .into_iter()
        .map(|l| Season::parse(l.as_ref()))
        .max()
        .map(|s| s.label)
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors surfaced by the engine and the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum StandingsError {
    #[error("League not found: {0}")]
    LeagueNotFound(LeagueId),

    #[error("Team not found: {0}")]
    TeamNotFound(TeamId),

    #[error("Match not found: {0}")]
    MatchNotFound(MatchId),

    #[error("Store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// A stored row could not be decoded back into its type
    #[error("Corrupt row: {0}")]
    Decode(String),
}

impl StandingsError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::LeagueNotFound(_) | Self::TeamNotFound(_) | Self::MatchNotFound(_)
        )
    }

    /// Read or write failures of the store. Never retried here; the caller decides.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
