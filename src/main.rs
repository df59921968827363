//! League standings CLI.
//!
//! Entry point. Loads configuration, initialises structured logging, opens
//! the database and dispatches to the import, recompute, table or serve
//! subcommand.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use league_standings::config::AppConfig;
use league_standings::dashboard::{self, ApiState};
use league_standings::engine::StandingsEngine;
use league_standings::import::{self, ImportOptions};
use league_standings::storage::{SqliteStore, StandingsStore};
use league_standings::types::latest_season;

#[derive(Parser)]
#[command(name = "league-standings")]
#[command(about = "Compute and serve league tables from match results")]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import finished matches from a CSV file and recompute the league
    Import {
        /// CSV file with one match per row
        #[arg(long)]
        csv: PathBuf,

        /// League to import into (created if absent)
        #[arg(long)]
        league_name: Option<String>,

        #[arg(long)]
        country: Option<String>,
    },

    /// Rebuild standings from finished matches
    Recompute {
        #[arg(long, conflicts_with = "all", required_unless_present = "all")]
        league: Option<i64>,

        /// Recompute every league
        #[arg(long)]
        all: bool,
    },

    /// Print a league table
    Table {
        #[arg(long)]
        league: i64,

        /// Season label; defaults to the latest season
        #[arg(long)]
        season: Option<String>,
    },

    /// Run the JSON API server
    Serve {
        /// Overrides dashboard.port
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cli = Cli::parse();

    let cfg = if cli.config.exists() {
        AppConfig::load(&cli.config.to_string_lossy())?
    } else {
        let mut cfg = AppConfig::default();
        cfg.apply_env();
        cfg
    };

    init_logging();

    let store = SqliteStore::connect(&cfg.database)
        .await
        .with_context(|| format!("Failed to open database {}", cfg.database.url))?;
    let store = Arc::new(store);

    let result = run(cli.command, &cfg, Arc::clone(&store)).await;
    store.close().await;
    result
}

async fn run(command: Command, cfg: &AppConfig, store: Arc<SqliteStore>) -> Result<()> {
    match command {
        Command::Import {
            csv,
            league_name,
            country,
        } => {
            let options = ImportOptions {
                league_name: league_name.unwrap_or_else(|| cfg.import.league_name.clone()),
                country: country.unwrap_or_else(|| cfg.import.country.clone()),
            };
            let engine = StandingsEngine::new(store);
            let report = import::import_csv_file(&engine, &csv, &options)
                .await
                .with_context(|| format!("Import of {} failed", csv.display()))?;

            println!(
                "{}: {} created, {} duplicates, {} blank, {} invalid",
                report.league,
                report.created,
                report.duplicates,
                report.skipped_blank,
                report.skipped_invalid,
            );
            if report.standings.is_stale() {
                println!("Standings are stale; run `recompute --league {}`", report.league.id);
            }
        }

        Command::Recompute { league, all } => {
            let engine = StandingsEngine::new(store);
            if all {
                let mut failed = 0;
                for (league_id, result) in engine.recompute_all().await? {
                    match result {
                        Ok(report) => println!(
                            "league {league_id}: {} matches, {} seasons, {} rows",
                            report.matches_counted, report.seasons, report.rows_written
                        ),
                        Err(e) => {
                            failed += 1;
                            println!("league {league_id}: failed ({e})");
                        }
                    }
                }
                if failed > 0 {
                    bail!("{failed} league(s) failed to recompute");
                }
            } else if let Some(league_id) = league {
                let report = engine.recompute(league_id).await?;
                println!(
                    "league {league_id}: {} matches, {} seasons, {} rows",
                    report.matches_counted, report.seasons, report.rows_written
                );
            }
        }

        Command::Table { league, season } => {
            let league = store.get_league(league).await?;
            let season = match season {
                Some(season) => season,
                None => match latest_season(store.seasons(league.id).await?) {
                    Some(season) => season,
                    None => {
                        println!("{league}: no matches");
                        return Ok(());
                    }
                },
            };

            let table = store.standings_table(league.id, &season).await?;
            println!("{league} {season}");
            for row in &table {
                println!("{row}");
            }
        }

        Command::Serve { port } => {
            if !cfg.dashboard.enabled {
                error!("Dashboard disabled in config");
                bail!("dashboard.enabled is false");
            }
            let port = port.unwrap_or(cfg.dashboard.port);
            let state = Arc::new(ApiState::new(store, cfg.table.clone()));
            info!(port, "Serving standings API");
            dashboard::serve(state, port).await?;
            info!("Shutdown complete");
        }
    }

    Ok(())
}

/// Initialise tracing with env-filter and optional JSON output.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("league_standings=info"));

    let json_logging = std::env::var("STANDINGS_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
