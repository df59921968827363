//! Tally: folds finished matches into per-season team records.
//!
//! Pure aggregation with no I/O. Each finished match updates exactly two
//! entries (home and away) keyed by `(season, team)`. The fold is
//! commutative, so match order never changes the totals.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::types::{FinishedMatch, LeagueId, Standing, TeamId};

pub const WIN_POINTS: i32 = 3;
pub const DRAW_POINTS: i32 = 1;

// ---------------------------------------------------------------------------
// Season tally
// ---------------------------------------------------------------------------

/// Running totals for one team in one season.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeasonTally {
    pub played: u32,
    pub win: u32,
    pub draw: u32,
    pub loss: u32,
    pub gf: u32,
    pub ga: u32,
    pub points: i32,
}

impl SeasonTally {
    /// Record one match from this team's point of view.
    pub fn record(&mut self, scored: u16, conceded: u16) {
        self.played += 1;
        self.gf += u32::from(scored);
        self.ga += u32::from(conceded);

        match scored.cmp(&conceded) {
            Ordering::Greater => {
                self.win += 1;
                self.points += WIN_POINTS;
            }
            Ordering::Less => {
                self.loss += 1;
            }
            Ordering::Equal => {
                self.draw += 1;
                self.points += DRAW_POINTS;
            }
        }
    }

    pub fn goal_difference(&self) -> i32 {
        // Goal totals stay far below i32::MAX for any real league.
        self.gf as i32 - self.ga as i32
    }

    fn into_standing(self, league_id: LeagueId, season: String, team_id: TeamId) -> Standing {
        Standing {
            league_id,
            season,
            team_id,
            played: self.played,
            win: self.win,
            draw: self.draw,
            loss: self.loss,
            gf: self.gf,
            ga: self.ga,
            gd: self.goal_difference(),
            points: self.points,
        }
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Build the full standings row set for a league from its finished matches.
///
/// Rows come out ordered by `(season, team_id)`, so identical input always
/// yields an identical `Vec`.
pub fn aggregate(league_id: LeagueId, matches: &[FinishedMatch]) -> Vec<Standing> {
    let mut table: BTreeMap<(&str, TeamId), SeasonTally> = BTreeMap::new();

    for m in matches {
        table
            .entry((m.season.as_str(), m.home_team_id))
            .or_default()
            .record(m.home_score, m.away_score);
        table
            .entry((m.season.as_str(), m.away_team_id))
            .or_default()
            .record(m.away_score, m.home_score);
    }

    table
        .into_iter()
        .map(|((season, team_id), tally)| tally.into_standing(league_id, season.to_string(), team_id))
        .collect()
}

/// Number of distinct seasons in a standings row set.
pub fn season_count(rows: &[Standing]) -> usize {
    let mut seasons: Vec<&str> = rows.iter().map(|r| r.season.as_str()).collect();
    seasons.sort_unstable();
    seasons.dedup();
    seasons.len()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
