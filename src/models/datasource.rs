//! Data source models and API request types.
//!
//! Data sources are the endpoints (Prometheus, Loki, ...) that dashboards
//! query. This service only keeps the registry entries correlations point at.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::correlation::CreateCorrelationRequest;

/// Maximum length of a data source uid.
pub const MAX_UID_LENGTH: usize = 40;

/// Column widths of `data_source.name` and `data_source.type`.
pub const MAX_NAME_LENGTH: usize = 190;
pub const MAX_TYPE_LENGTH: usize = 255;

/// Uids that collide with static routes under `/api/v1/datasources`.
const RESERVED_UIDS: &[&str] = &["correlations"];

/// Represents a data source record from the database.
///
/// # Database Table
///
/// Maps to the `data_source` table. `uid` and `name` are unique per org.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct DataSource {
    pub id: i64,
    pub org_id: i64,
    pub uid: String,
    pub name: String,

    /// Plugin type, e.g. "prometheus" or "loki"
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub ds_type: String,

    pub url: String,

    /// Provisioned sources are read-only: no deletion, and correlations
    /// sourced from them can't be changed through the API.
    pub read_only: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for registering a data source.
///
/// # JSON Example
///
/// ```json
/// {
///   "name": "Loki",
///   "type": "loki",
///   "url": "http://loki:3100",
///   "read_only": true,
///   "correlations": [
///     {
///       "target_uid": "prom-main",
///       "label": "Metrics for this pod",
///       "config": { "type": "query", "field": "pod", "target": { "expr": "up" } }
///     }
///   ]
/// }
/// ```
///
/// `uid` is generated when omitted. `correlations` are created with this
/// data source as their source, bypassing the read-only check.
#[derive(Debug, Deserialize)]
pub struct CreateDataSourceRequest {
    pub uid: Option<String>,

    pub name: String,

    #[serde(rename = "type")]
    pub ds_type: String,

    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub read_only: bool,

    #[serde(default)]
    pub correlations: Vec<CreateCorrelationRequest>,
}

impl CreateDataSourceRequest {
    /// Check the request before it touches the database.
    ///
    /// # Rules
    ///
    /// - `name` and `type` must not be blank nor exceed their column width
    /// - `uid`, when given, is at most 40 chars of `[a-zA-Z0-9_-]`
    /// - `url`, when given, must be an absolute URL
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::InvalidRequest("name is required".to_string()));
        }

        if self.name.trim().chars().count() > MAX_NAME_LENGTH {
            return Err(AppError::InvalidRequest(format!(
                "name exceeds {} characters",
                MAX_NAME_LENGTH
            )));
        }

        if self.ds_type.trim().is_empty() {
            return Err(AppError::InvalidRequest("type is required".to_string()));
        }

        if self.ds_type.chars().count() > MAX_TYPE_LENGTH {
            return Err(AppError::InvalidRequest(format!(
                "type exceeds {} characters",
                MAX_TYPE_LENGTH
            )));
        }

        if let Some(uid) = &self.uid {
            validate_uid(uid)?;
        }

        if !self.url.is_empty() {
            url::Url::parse(&self.url)
                .map_err(|e| AppError::InvalidRequest(format!("invalid url: {}", e)))?;
        }

        Ok(())
    }
}

/// Validate a caller-supplied uid.
pub fn validate_uid(uid: &str) -> Result<(), AppError> {
    if uid.is_empty() {
        return Err(AppError::InvalidRequest("uid must not be empty".to_string()));
    }

    if uid.len() > MAX_UID_LENGTH {
        return Err(AppError::InvalidRequest(format!(
            "uid exceeds {} characters",
            MAX_UID_LENGTH
        )));
    }

    if !uid
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(AppError::InvalidRequest(
            "uid may only contain letters, digits, '-' and '_'".to_string(),
        ));
    }

    if RESERVED_UIDS.contains(&uid) {
        return Err(AppError::InvalidRequest(format!("uid '{}' is reserved", uid)));
    }

    Ok(())
}
