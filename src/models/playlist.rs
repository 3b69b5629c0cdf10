//! Playlist data models and API request/response types.
//!
//! This module defines:
//! - `Playlist`: Database entity, an ordered rotation of dashboards
//! - `PlaylistItem`: One entry of a playlist
//! - `PlaylistRequest`: Body for create and update
//! - `PlaylistDto`: A playlist together with its items

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Column width of `playlist.name` and `playlist."interval"`.
pub const MAX_FIELD_LENGTH: usize = 255;

/// Represents a playlist record from the database.
///
/// # Database Table
///
/// Maps to the `playlist` table. `uid` is unique within an org and is what
/// clients address playlists by.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Playlist {
    pub id: i64,
    pub uid: String,
    pub org_id: i64,
    pub name: String,

    /// Time each dashboard stays on screen, e.g. "5m"
    pub interval: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Represents a playlist item record from the database.
///
/// # Database Table
///
/// Maps to the `playlist_item` table. `order` is 1-based and follows the
/// position the item had in the last create/update request.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct PlaylistItem {
    pub id: i64,
    pub playlist_id: i64,

    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub item_type: String,

    /// Dashboard id, uid or tag, depending on `item_type`
    pub value: String,

    pub title: String,
    pub order: i32,
}

/// What a playlist item's `value` refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaylistItemType {
    DashboardById,
    DashboardByUid,
    DashboardByTag,
}

impl PlaylistItemType {
    /// Value stored in the `type` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaylistItemType::DashboardById => "dashboard_by_id",
            PlaylistItemType::DashboardByUid => "dashboard_by_uid",
            PlaylistItemType::DashboardByTag => "dashboard_by_tag",
        }
    }
}

/// One item in a create/update request.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistItemRequest {
    #[serde(rename = "type")]
    pub item_type: PlaylistItemType,

    pub value: String,

    #[serde(default)]
    pub title: String,
}

/// Request body for creating or replacing a playlist.
///
/// # JSON Example
///
/// ```json
/// {
///   "name": "NOC wall",
///   "interval": "5m",
///   "items": [
///     { "type": "dashboard_by_uid", "value": "node-exporter", "title": "Nodes" },
///     { "type": "dashboard_by_tag", "value": "kubernetes" }
///   ]
/// }
/// ```
///
/// Items are stored in the order given; an update replaces all items.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistRequest {
    pub name: String,

    pub interval: String,

    #[serde(default)]
    pub items: Vec<PlaylistItemRequest>,
}

impl PlaylistRequest {
    /// `name` and `interval` must fit their columns.
    pub fn validate(&self) -> Result<(), AppError> {
        for (field, value) in [("name", &self.name), ("interval", &self.interval)] {
            if value.chars().count() > MAX_FIELD_LENGTH {
                return Err(AppError::InvalidRequest(format!(
                    "{} exceeds {} characters",
                    field, MAX_FIELD_LENGTH
                )));
            }
        }

        Ok(())
    }
}

/// Query string for `GET /api/v1/playlists`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlaylistSearchQuery {
    /// Substring match on the playlist name
    pub name: Option<String>,
    pub limit: Option<i64>,
}

/// A playlist with its items, as returned by get and update.
///
/// # JSON Example
///
/// ```json
/// {
///   "id": 7,
///   "uid": "d2a9c4e1-...",
///   "name": "NOC wall",
///   "interval": "5m",
///   "items": [
///     { "id": 31, "playlist_id": 7, "type": "dashboard_by_uid", "value": "node-exporter", "title": "Nodes", "order": 1 }
///   ]
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct PlaylistDto {
    pub id: i64,
    pub uid: String,
    pub name: String,
    pub interval: String,
    pub items: Vec<PlaylistItem>,
}

impl PlaylistDto {
    pub fn new(playlist: Playlist, items: Vec<PlaylistItem>) -> Self {
        Self {
            id: playlist.id,
            uid: playlist.uid,
            name: playlist.name,
            interval: playlist.interval,
            items,
        }
    }
}
