//! Playlist HTTP handlers.
//!
//! This module implements the playlist endpoints:
//! - POST /api/v1/playlists - Create a playlist with items
//! - GET /api/v1/playlists - Search by name
//! - GET /api/v1/playlists/{uid} - Get a playlist with its items
//! - PUT /api/v1/playlists/{uid} - Replace name, interval and items
//! - DELETE /api/v1/playlists/{uid} - Delete a playlist
//! - GET /api/v1/playlists/{uid}/items - Items only

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    models::playlist::{Playlist, PlaylistDto, PlaylistItem, PlaylistRequest, PlaylistSearchQuery},
    services::playlist_service,
    state::AppState,
};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

/// Create a playlist.
///
/// # Request Body
///
/// ```json
/// {
///   "name": "NOC wall",
///   "interval": "5m",
///   "items": [{ "type": "dashboard_by_uid", "value": "node-exporter" }]
/// }
/// ```
///
/// # Response
///
/// - **Success (201 Created)**: the playlist, including its generated uid
pub async fn create_playlist(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<PlaylistRequest>,
) -> Result<impl IntoResponse, AppError> {
    let playlist = playlist_service::create_playlist(&state.pool, auth.org_id, request).await?;

    Ok((StatusCode::CREATED, Json(playlist)))
}

/// Search playlists.
///
/// # Query Parameters
///
/// - `name`: substring of the playlist name (optional)
/// - `limit`: maximum rows; non-positive or absent uses the configured default
pub async fn search_playlists(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<PlaylistSearchQuery>,
) -> Result<Json<Vec<Playlist>>, AppError> {
    let limit = query
        .limit
        .filter(|l| *l > 0)
        .unwrap_or(state.playlist_default_limit);

    let playlists =
        playlist_service::list_playlists(&state.pool, auth.org_id, query.name.as_deref(), limit)
            .await?;

    Ok(Json(playlists))
}

/// Get a playlist with its items.
pub async fn get_playlist(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(uid): Path<String>,
) -> Result<Json<PlaylistDto>, AppError> {
    let dto = playlist_service::get_playlist_dto(&state.pool, auth.org_id, &uid).await?;

    Ok(Json(dto))
}

/// Get only the items of a playlist, in order.
pub async fn get_playlist_items(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(uid): Path<String>,
) -> Result<Json<Vec<PlaylistItem>>, AppError> {
    let items = playlist_service::get_playlist_items(&state.pool, auth.org_id, &uid).await?;

    Ok(Json(items))
}

/// Replace a playlist.
///
/// All existing items are dropped and the request's items stored in order.
pub async fn update_playlist(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(uid): Path<String>,
    Json(request): Json<PlaylistRequest>,
) -> Result<Json<PlaylistDto>, AppError> {
    let dto = playlist_service::update_playlist(&state.pool, auth.org_id, &uid, request).await?;

    Ok(Json(dto))
}

/// Delete a playlist and its items.
///
/// # Response
///
/// - **Success (204 No Content)**
/// - **Error (404)**: no such playlist in the org
pub async fn delete_playlist(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(uid): Path<String>,
) -> Result<StatusCode, AppError> {
    playlist_service::delete_playlist(&state.pool, auth.org_id, &uid).await?;

    Ok(StatusCode::NO_CONTENT)
}
