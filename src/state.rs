//! Shared application state handed to every handler.

use axum::extract::FromRef;

use crate::{config::Config, db::DbPool};

/// State shared by all routes.
///
/// Handlers that only need the pool keep extracting `State<DbPool>`.
#[derive(Debug, Clone)]
pub struct AppState {
    pub pool: DbPool,

    /// Limit for playlist searches that don't pass one
    pub playlist_default_limit: i64,
}

impl AppState {
    pub fn new(pool: DbPool, config: &Config) -> Self {
        Self {
            pool,
            playlist_default_limit: config.playlist_default_limit,
        }
    }
}

impl FromRef<AppState> for DbPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}
