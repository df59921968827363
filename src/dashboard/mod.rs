//! Dashboard: Axum web server exposing league tables and recompute triggers.
//!
//! Serves a JSON REST API. CORS enabled for local development.

pub mod error;
pub mod routes;

use anyhow::{Context, Result};
use axum::{
    http::{header, Method},
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

pub use error::ApiError;
pub use routes::{ApiState, AppState};

/// Run the API server until Ctrl+C.
pub async fn serve(state: AppState, port: u16) -> Result<()> {
    let app = build_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind dashboard port {port}"))?;
    info!(port, "Dashboard server starting on http://localhost:{port}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await
        .context("Dashboard server error")?;

    Ok(())
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/api/leagues", get(routes::list_leagues))
        .route("/api/leagues/:league_id", get(routes::get_league_overview))
        .route("/api/leagues/:league_id/standings", get(routes::get_standings))
        .route(
            "/api/leagues/:league_id/teams/:team_id",
            get(routes::get_team_season),
        )
        .route("/api/leagues/:league_id/teams", get(routes::list_teams))
        .route(
            "/api/leagues/:league_id/matches",
            get(routes::list_matches).post(routes::create_match),
        )
        .route("/api/leagues/:league_id/recompute", post(routes::recompute_league))
        .route("/api/matches/:match_id", delete(routes::delete_match))
        .route("/api/matches/:match_id/result", post(routes::update_match_result))
        .route("/health", get(routes::health))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
