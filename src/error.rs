//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Application-wide error type.
///
/// Services return these as sentinel errors; handlers pass them through and
/// the `IntoResponse` impl below picks the status code.
///
/// # Error Categories
///
/// - **Database Errors**: Any sqlx::Error from database operations
/// - **Authentication Errors**: Invalid or missing API keys
/// - **Resource Errors**: Data sources, correlations or playlists not found
/// - **Business Logic Errors**: Read-only sources, uid exhaustion, duplicates
/// - **Validation Errors**: Invalid request data
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed (e.g., connection error, query error).
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// API key is missing, invalid, or inactive.
    #[error("Invalid API key")]
    InvalidApiKey,

    /// Request body or parameters are invalid.
    ///
    /// The String contains details about what was invalid.
    #[error("Invalid request")]
    InvalidRequest(String),

    /// A command arrived without its required identifiers (uid, org).
    #[error("command missing required fields")]
    CommandValidationFailed,

    #[error("data source not found")]
    DataSourceNotFound,

    #[error("data source with the same uid or name already exists")]
    DataSourceAlreadyExists,

    /// Provisioned data sources cannot be removed through the API.
    #[error("data source is read only")]
    DataSourceReadOnly,

    #[error("source data source does not exist")]
    SourceDataSourceDoesNotExist,

    #[error("target data source does not exist")]
    TargetDataSourceDoesNotExist,

    #[error("source data source is read only")]
    SourceDataSourceReadOnly,

    #[error("correlation not found")]
    CorrelationNotFound,

    /// PATCH with none of label, description or config.
    #[error("not enough parameters to edit correlation")]
    UpdateCorrelationEmptyParams,

    #[error("correlation contains non default value in config type")]
    InvalidCorrelationConfigType,

    #[error("playlist not found")]
    PlaylistNotFound,

    /// Every candidate uid collided with an existing playlist.
    #[error("failed to generate unique playlist uid")]
    PlaylistFailedGenerateUniqueUid,
}

impl AppError {
    /// HTTP status and machine-readable code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::InvalidApiKey => (StatusCode::UNAUTHORIZED, "invalid_api_key"),
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            AppError::CommandValidationFailed => {
                (StatusCode::BAD_REQUEST, "command_validation_failed")
            }
            AppError::UpdateCorrelationEmptyParams => {
                (StatusCode::BAD_REQUEST, "update_correlation_empty_params")
            }
            AppError::InvalidCorrelationConfigType => {
                (StatusCode::BAD_REQUEST, "invalid_correlation_config_type")
            }
            AppError::DataSourceNotFound => (StatusCode::NOT_FOUND, "data_source_not_found"),
            AppError::SourceDataSourceDoesNotExist => {
                (StatusCode::NOT_FOUND, "source_data_source_does_not_exist")
            }
            AppError::TargetDataSourceDoesNotExist => {
                (StatusCode::NOT_FOUND, "target_data_source_does_not_exist")
            }
            AppError::CorrelationNotFound => (StatusCode::NOT_FOUND, "correlation_not_found"),
            AppError::PlaylistNotFound => (StatusCode::NOT_FOUND, "playlist_not_found"),
            AppError::DataSourceReadOnly => (StatusCode::FORBIDDEN, "data_source_read_only"),
            AppError::SourceDataSourceReadOnly => {
                (StatusCode::FORBIDDEN, "source_data_source_read_only")
            }
            AppError::DataSourceAlreadyExists => {
                (StatusCode::CONFLICT, "data_source_already_exists")
            }
            AppError::PlaylistFailedGenerateUniqueUid => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "playlist_uid_generation_failed",
            ),
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// All errors return JSON in this format:
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
///
/// Database errors are logged and hidden from the client.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match self {
            AppError::InvalidRequest(msg) => msg,
            AppError::Database(ref err) => {
                tracing::error!(error = %err, "database error while handling request");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
