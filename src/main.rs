//! Datalink Server - Main Application Entry Point
//!
//! A REST API for the data-access side of a monitoring backend: data sources,
//! correlations between them, and dashboard playlists. Every resource is
//! scoped to the organisation of the calling API key.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries)
//! - **Authentication**: API key with SHA-256 hashing, mapped to an org
//! - **Format**: JSON requests/responses
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Create database connection pool
//! 3. Run database migrations
//! 4. Build HTTP router with routes and middleware
//! 5. Start server on configured port

mod config;
mod db;
mod error;
mod handlers;
mod middleware;
mod models;
mod services;
mod state;

use tracing_subscriber::EnvFilter;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG, defaulting to "info"
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = config::Config::from_env()?;
    tracing::info!("Configuration loaded");

    let pool = db::create_pool(&config.database_url, config.database_max_connections).await?;
    tracing::info!("Database pool created");

    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    let app = router(AppState::new(pool, &config));

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the HTTP router.
///
/// Everything under `/api/v1` goes through API key authentication;
/// `/health` is public.
fn router(state: AppState) -> Router {
    let authenticated_routes = Router::new()
        // Data sources
        .route(
            "/api/v1/datasources",
            post(handlers::datasources::create_data_source)
                .get(handlers::datasources::list_data_sources),
        )
        .route(
            "/api/v1/datasources/correlations",
            get(handlers::correlations::list_correlations),
        )
        .route(
            "/api/v1/datasources/{uid}",
            get(handlers::datasources::get_data_source)
                .delete(handlers::datasources::delete_data_source),
        )
        // Correlations, addressed through their source data source
        .route(
            "/api/v1/datasources/{uid}/correlations",
            post(handlers::correlations::create_correlation)
                .get(handlers::correlations::list_source_correlations),
        )
        .route(
            "/api/v1/datasources/{uid}/correlations/{correlation_uid}",
            get(handlers::correlations::get_correlation)
                .patch(handlers::correlations::update_correlation)
                .delete(handlers::correlations::delete_correlation),
        )
        // Playlists
        .route(
            "/api/v1/playlists",
            post(handlers::playlists::create_playlist)
                .get(handlers::playlists::search_playlists),
        )
        .route(
            "/api/v1/playlists/{uid}",
            get(handlers::playlists::get_playlist)
                .put(handlers::playlists::update_playlist)
                .delete(handlers::playlists::delete_playlist),
        )
        .route(
            "/api/v1/playlists/{uid}/items",
            get(handlers::playlists::get_playlist_items),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .merge(authenticated_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
