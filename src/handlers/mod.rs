//! HTTP request handlers (route handlers).
//!
//! Each handler extracts the caller's org from `AuthContext`, delegates to a
//! service and maps the result to a JSON response.

/// Correlation endpoints, nested under a source data source
pub mod correlations;
/// Data source registry endpoints
pub mod datasources;
/// Liveness probe
pub mod health;
/// Playlist endpoints
pub mod playlists;
