//! Standings engine: finished matches in, per-season league tables out.

pub mod ranking;
pub mod recompute;
pub mod tally;

pub use recompute::{LeagueGuard, LeagueLocks, RecomputeReport, StandingsEngine, StandingsStatus};
