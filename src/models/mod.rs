//! Data models representing database entities.
//!
//! This module contains all data structures that map to database tables,
//! plus the request/response types built from them.

/// API key authentication model
pub mod api_key;
/// Correlations between data sources
pub mod correlation;
/// Data source registry
pub mod datasource;
/// Playlists and playlist items
pub mod playlist;
