//! SQLite schema. Every statement is idempotent.

pub const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS leagues (
        id      INTEGER PRIMARY KEY AUTOINCREMENT,
        name    TEXT NOT NULL UNIQUE,
        country TEXT NOT NULL DEFAULT ''
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS teams (
        id           INTEGER PRIMARY KEY AUTOINCREMENT,
        league_id    INTEGER NOT NULL REFERENCES leagues(id) ON DELETE CASCADE,
        name         TEXT NOT NULL,
        short_name   TEXT NOT NULL DEFAULT '',
        founded_year INTEGER,
        UNIQUE (league_id, name)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS matches (
        id           INTEGER PRIMARY KEY AUTOINCREMENT,
        league_id    INTEGER NOT NULL REFERENCES leagues(id) ON DELETE CASCADE,
        season       TEXT NOT NULL,
        date         TEXT NOT NULL,
        home_team_id INTEGER NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
        away_team_id INTEGER NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
        status       TEXT NOT NULL DEFAULT 'FINISHED'
                     CHECK (status IN ('SCHEDULED', 'LIVE', 'FINISHED', 'POSTPONED')),
        home_score   INTEGER NOT NULL DEFAULT 0 CHECK (home_score >= 0),
        away_score   INTEGER NOT NULL DEFAULT 0 CHECK (away_score >= 0),
        home_stats   TEXT NOT NULL DEFAULT '{}',
        away_stats   TEXT NOT NULL DEFAULT '{}',
        CONSTRAINT not_same_team CHECK (home_team_id <> away_team_id),
        UNIQUE (league_id, season, date, home_team_id, away_team_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_matches_league_status ON matches (league_id, status)",
    r#"
    CREATE TABLE IF NOT EXISTS standings (
        id        INTEGER PRIMARY KEY AUTOINCREMENT,
        league_id INTEGER NOT NULL REFERENCES leagues(id) ON DELETE CASCADE,
        season    TEXT NOT NULL,
        team_id   INTEGER NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
        played    INTEGER NOT NULL DEFAULT 0 CHECK (played >= 0),
        win       INTEGER NOT NULL DEFAULT 0 CHECK (win >= 0),
        draw      INTEGER NOT NULL DEFAULT 0 CHECK (draw >= 0),
        loss      INTEGER NOT NULL DEFAULT 0 CHECK (loss >= 0),
        gf        INTEGER NOT NULL DEFAULT 0,
        ga        INTEGER NOT NULL DEFAULT 0,
        gd        INTEGER NOT NULL DEFAULT 0,
        points    INTEGER NOT NULL DEFAULT 0,
        UNIQUE (league_id, season, team_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_standings_league_season ON standings (league_id, season)",
];
