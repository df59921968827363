//! CSV match import.
//!
//! Loads historical results for one league from a CSV export, creating the
//! league and its teams on demand, then recomputes the league's standings.
//! A failed recompute does not undo or fail the import; the report marks
//! the standings as stale instead.
//!
//! Required columns: `season, date, home_team, away_team, goal_home_ft,
//! goal_away_ft`. Optional `home_<stat>` / `away_<stat>` columns fill the
//! per-side box score; blanks read as zero.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::engine::{StandingsEngine, StandingsStatus};
use crate::storage::SqliteStore;
use crate::types::{League, MatchStatus, NewMatch, StandingsError, TeamId, TeamMatchStats};

pub const REQUIRED_COLUMNS: &[&str] = &[
    "season",
    "date",
    "home_team",
    "away_team",
    "goal_home_ft",
    "goal_away_ft",
];

const DATE_FORMAT: &str = "%Y-%m-%d";

// ---------------------------------------------------------------------------
// Errors and reports
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Failed to open {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("CSV missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Store(#[from] StandingsError),
}

#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub league_name: String,
    pub country: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub league: League,
    pub created: usize,
    pub duplicates: usize,
    /// Rows with an empty team name
    pub skipped_blank: usize,
    /// Rows with an unparseable date or number
    pub skipped_invalid: usize,
    pub standings: StandingsStatus,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// One CSV row, validated but not yet resolved to team ids.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvMatch {
    pub season: String,
    pub date: DateTime<Utc>,
    pub home_team: String,
    pub away_team: String,
    pub home_score: u16,
    pub away_score: u16,
    pub home_stats: TeamMatchStats,
    pub away_stats: TeamMatchStats,
}

#[derive(Debug, Default)]
pub struct ParsedCsv {
    pub matches: Vec<CsvMatch>,
    pub skipped_blank: usize,
    pub skipped_invalid: usize,
}

struct Columns(HashMap<String, usize>);

impl Columns {
    fn get<'r>(&self, record: &'r csv::StringRecord, name: &str) -> &'r str {
        self.0
            .get(name)
            .and_then(|&i| record.get(i))
            .map(str::trim)
            .unwrap_or("")
    }
}

fn parse_count<T: std::str::FromStr + Default>(raw: &str, column: &str) -> Result<T, String> {
    if raw.is_empty() {
        return Ok(T::default());
    }
    raw.parse().map_err(|_| format!("{column}: not a number: {raw:?}"))
}

fn parse_side(columns: &Columns, record: &csv::StringRecord, side: &str) -> Result<TeamMatchStats, String> {
    let col = |stat: &str| format!("{side}_{stat}");
    let count = |stat: &str| -> Result<u32, String> {
        let name = col(stat);
        parse_count(columns.get(record, &name), &name)
    };

    let stats = TeamMatchStats {
        clearances: count("clearances")?,
        corners: count("corners")?,
        fouls_conceded: count("fouls_conceded")?,
        offsides: count("offsides")?,
        passes: count("passes")?,
        possession: parse_count(columns.get(record, &col("possession")), &col("possession"))?,
        red_cards: count("red_cards")?,
        shots: count("shots")?,
        shots_on_target: count("shots_on_target")?,
        tackles: count("tackles")?,
        touches: count("touches")?,
        yellow_cards: count("yellow_cards")?,
    };
    stats.check().map_err(|e| format!("{side}_possession: {e}"))?;
    Ok(stats)
}

fn parse_record(columns: &Columns, record: &csv::StringRecord) -> Result<Option<CsvMatch>, String> {
    let home_team = columns.get(record, "home_team");
    let away_team = columns.get(record, "away_team");
    if home_team.is_empty() || away_team.is_empty() {
        return Ok(None);
    }

    let raw_date = columns.get(record, "date");
    let date = NaiveDate::parse_from_str(raw_date, DATE_FORMAT)
        .map_err(|_| format!("date: expected YYYY-MM-DD, got {raw_date:?}"))?
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .ok_or_else(|| format!("date: out of range: {raw_date:?}"))?;

    Ok(Some(CsvMatch {
        season: columns.get(record, "season").to_string(),
        date,
        home_team: home_team.to_string(),
        away_team: away_team.to_string(),
        home_score: parse_count(columns.get(record, "goal_home_ft"), "goal_home_ft")?,
        away_score: parse_count(columns.get(record, "goal_away_ft"), "goal_away_ft")?,
        home_stats: parse_side(columns, record, "home")?,
        away_stats: parse_side(columns, record, "away")?,
    }))
}

/// Parse and validate a whole CSV. Fails before anything is written if a
/// required column is missing; bad rows are skipped and counted.
pub fn read_matches<R: Read>(reader: R) -> Result<ParsedCsv, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let columns = Columns(
        headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim().to_string(), i))
            .collect(),
    );

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|c| !columns.0.contains_key(**c))
        .map(|c| c.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ImportError::MissingColumns(missing));
    }

    let mut parsed = ParsedCsv::default();
    for record in reader.records() {
        let record = record?;
        match parse_record(&columns, &record) {
            Ok(Some(m)) => parsed.matches.push(m),
            Ok(None) => parsed.skipped_blank += 1,
            Err(reason) => {
                let line = record.position().map(|p| p.line()).unwrap_or_default();
                warn!(line, reason = %reason, "Skipping invalid CSV row");
                parsed.skipped_invalid += 1;
            }
        }
    }

    Ok(parsed)
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

/// Import matches from any CSV source, then recompute the league's standings.
pub async fn import_csv<R: Read>(
    engine: &StandingsEngine<SqliteStore>,
    reader: R,
    options: &ImportOptions,
) -> Result<ImportReport, ImportError> {
    let parsed = read_matches(reader)?;
    let store = engine.store();

    let league = store
        .get_or_create_league(&options.league_name, &options.country)
        .await?;

    let mut teams: HashMap<String, TeamId> = HashMap::new();
    let mut created = 0;
    let mut duplicates = 0;
    let mut skipped_invalid = parsed.skipped_invalid;

    for m in parsed.matches {
        let home_team_id = team_id(store, &mut teams, league.id, &m.home_team).await?;
        let away_team_id = team_id(store, &mut teams, league.id, &m.away_team).await?;

        let new_match = NewMatch {
            league_id: league.id,
            season: m.season,
            date: m.date,
            home_team_id,
            away_team_id,
            status: MatchStatus::Finished,
            home_score: m.home_score,
            away_score: m.away_score,
            home_stats: m.home_stats,
            away_stats: m.away_stats,
        };

        match store.insert_match_if_absent(&new_match).await {
            Ok(Some(_)) => created += 1,
            Ok(None) => duplicates += 1,
            Err(StandingsError::InvalidData(reason)) => {
                warn!(home = %m.home_team, away = %m.away_team, reason = %reason, "Skipping match");
                skipped_invalid += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    info!(
        league = %league,
        created,
        duplicates,
        skipped_blank = parsed.skipped_blank,
        skipped_invalid,
        "Matches imported"
    );

    let standings = StandingsStatus::from(engine.recompute(league.id).await);
    if let StandingsStatus::Stale { reason } = &standings {
        warn!(league_id = league.id, reason = %reason, "Standings are stale after import");
    }

    Ok(ImportReport {
        league,
        created,
        duplicates,
        skipped_blank: parsed.skipped_blank,
        skipped_invalid,
        standings,
    })
}

/// Import from a CSV file on disk.
pub async fn import_csv_file(
    engine: &StandingsEngine<SqliteStore>,
    path: &Path,
    options: &ImportOptions,
) -> Result<ImportReport, ImportError> {
    let file = File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ImportError::FileNotFound(path.to_path_buf()),
        _ => ImportError::Io {
            path: path.to_path_buf(),
            source: e,
        },
    })?;
    import_csv(engine, file, options).await
}

async fn team_id(
    store: &SqliteStore,
    cache: &mut HashMap<String, TeamId>,
    league_id: i64,
    name: &str,
) -> Result<TeamId, StandingsError> {
    if let Some(&id) = cache.get(name) {
        return Ok(id);
    }
    let team = store.get_or_create_team(league_id, name).await?;
    cache.insert(name.to_string(), team.id);
    Ok(team.id)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
