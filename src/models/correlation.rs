//! Correlation data models and API request/response types.
//!
//! A correlation links a *source* data source to a *target* data source: when a
//! user looks at a result from the source, `config` says which field to take
//! and which query to run against the target.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::types::Json;

use crate::error::AppError;

/// The only correlation config type currently understood.
pub const CONFIG_TYPE_QUERY: &str = "query";

/// Default and maximum page sizes for listing every correlation in an org.
pub const DEFAULT_LIST_LIMIT: i64 = 100;
pub const MAX_LIST_LIMIT: i64 = 1000;

/// Represents a correlation record from the database.
///
/// # Database Table
///
/// Maps to the `correlation` table, keyed by `(uid, source_uid)`.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Correlation {
    pub uid: String,
    pub org_id: i64,
    pub source_uid: String,
    pub target_uid: String,
    pub label: String,
    pub description: String,
    pub config: Option<Json<CorrelationConfig>>,
}

/// How to build the target query from a source result.
///
/// # JSON Example
///
/// ```json
/// {
///   "type": "query",
///   "field": "traceId",
///   "target": { "query": "${traceId}" },
///   "transformations": [
///     { "type": "regex", "expression": "trace=(\\w+)", "field": "line", "map_value": "traceId" }
///   ]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationConfig {
    #[serde(rename = "type", default = "default_config_type")]
    pub config_type: String,

    /// Field of the source result the correlation is attached to
    pub field: String,

    /// Target query, opaque to this service
    #[serde(default)]
    pub target: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transformations: Vec<Transformation>,
}

fn default_config_type() -> String {
    CONFIG_TYPE_QUERY.to_string()
}

/// Extracts variables from a source field before the target query runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transformation {
    #[serde(rename = "type")]
    pub kind: TransformationKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_value: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformationKind {
    Regex,
    Logfmt,
}

impl CorrelationConfig {
    /// Check the config before it is stored.
    ///
    /// # Errors
    ///
    /// - `InvalidCorrelationConfigType`: `type` is anything but "query"
    /// - `InvalidRequest`: blank `field`, or a regex transformation without expression
    pub fn validate(&self) -> Result<(), AppError> {
        if self.config_type != CONFIG_TYPE_QUERY {
            return Err(AppError::InvalidCorrelationConfigType);
        }

        if self.field.trim().is_empty() {
            return Err(AppError::InvalidRequest(
                "config.field is required".to_string(),
            ));
        }

        for transformation in &self.transformations {
            if transformation.kind == TransformationKind::Regex
                && transformation
                    .expression
                    .as_deref()
                    .is_none_or(|e| e.is_empty())
            {
                return Err(AppError::InvalidRequest(
                    "regex transformation requires an expression".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Request body for creating a correlation.
///
/// The source data source comes from the URL path.
///
/// # JSON Example
///
/// ```json
/// {
///   "target_uid": "tempo-main",
///   "label": "Open trace",
///   "description": "Jump from log line to its trace",
///   "config": { "type": "query", "field": "traceId", "target": {} }
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCorrelationRequest {
    pub target_uid: String,

    #[serde(default)]
    pub label: String,

    #[serde(default)]
    pub description: String,

    pub config: Option<CorrelationConfig>,
}

/// Request body for PATCHing a correlation. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCorrelationRequest {
    pub label: Option<String>,
    pub description: Option<String>,
    pub config: Option<CorrelationConfig>,
}

impl UpdateCorrelationRequest {
    /// True when the request would not change anything.
    pub fn is_empty(&self) -> bool {
        self.label.is_none() && self.description.is_none() && self.config.is_none()
    }
}

/// Query string for `GET /api/v1/datasources/correlations`.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct CorrelationListQuery {
    pub limit: Option<i64>,
    pub page: Option<i64>,
}

impl CorrelationListQuery {
    /// Resolve to `(limit, offset)`.
    ///
    /// Limit is clamped to 1..=1000 (default 100); pages start at 1.
    pub fn limit_offset(&self) -> (i64, i64) {
        let limit = match self.limit {
            Some(limit) if limit > 0 => limit.min(MAX_LIST_LIMIT),
            _ => DEFAULT_LIST_LIMIT,
        };
        let page = self.page.filter(|p| *p > 0).unwrap_or(1);

        (limit, (page - 1).saturating_mul(limit))
    }
}

/// Response for create/update.
///
/// ```json
/// { "message": "Correlation created", "result": { "uid": "...", ... } }
/// ```
#[derive(Debug, Serialize)]
pub struct CorrelationMutationResponse {
    pub message: &'static str,
    pub result: Correlation,
}

/// Plain acknowledgement, used for deletion.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}
