//! Configuration loading from TOML with environment variable overrides.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! `DATABASE_URL`, when set, takes precedence over `database.url`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub import: ImportConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub table: TableConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite connection URL, e.g. `sqlite://league_standings.db`
    pub url: String,
    pub max_connections: u32,
    pub busy_timeout_secs: u64,
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://league_standings.db".to_string(),
            max_connections: 5,
            busy_timeout_secs: 5,
            acquire_timeout_secs: 10,
        }
    }
}

/// Defaults for the CSV importer when the CLI doesn't override them.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ImportConfig {
    pub league_name: String,
    pub country: String,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            league_name: "Dataset League".to_string(),
            country: String::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 8080,
        }
    }
}

/// How much of a table the read endpoints return.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TableConfig {
    /// Rows shown in a league overview
    pub overview_rows: usize,
    /// Finished matches listed on a team page
    pub recent_results: u32,
    /// Scheduled matches listed on a team page
    pub upcoming_fixtures: u32,
    /// Matches per page of a league's match list
    pub matches_per_page: u32,
    /// Teams per page of a league's team list
    pub teams_per_page: u32,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            overview_rows: 5,
            recent_results: 5,
            upcoming_fixtures: 5,
            matches_per_page: 20,
            teams_per_page: 30,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let mut config = Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        config.apply_env();
        Ok(config)
    }

    /// Parse configuration from a TOML string. Missing sections take defaults.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// Apply environment overrides.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            if !url.is_empty() {
                self.database.url = url;
            }
        }
    }
}
