//! Correlation HTTP handlers.
//!
//! Correlations are addressed through their source data source:
//! - POST /api/v1/datasources/{source_uid}/correlations - Create
//! - GET /api/v1/datasources/{source_uid}/correlations - List for a source
//! - GET /api/v1/datasources/{source_uid}/correlations/{uid} - Get
//! - PATCH /api/v1/datasources/{source_uid}/correlations/{uid} - Update
//! - DELETE /api/v1/datasources/{source_uid}/correlations/{uid} - Delete
//! - GET /api/v1/datasources/correlations - List all in the org

use crate::{
    db::DbPool,
    error::AppError,
    middleware::auth::AuthContext,
    models::correlation::{
        Correlation, CorrelationListQuery, CorrelationMutationResponse, CreateCorrelationRequest,
        MessageResponse, UpdateCorrelationRequest,
    },
    services::correlation_service,
};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

/// Create a correlation from a source data source.
///
/// # Request Body
///
/// ```json
/// {
///   "target_uid": "tempo-main",
///   "label": "Open trace",
///   "config": { "type": "query", "field": "traceId", "target": {} }
/// }
/// ```
///
/// # Response
///
/// - **Success (201 Created)**: `{"message": "Correlation created", "result": {...}}`
/// - **Error (403)**: source is read-only
/// - **Error (404)**: source or target does not exist
/// - **Error (400)**: invalid config
pub async fn create_correlation(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(source_uid): Path<String>,
    Json(request): Json<CreateCorrelationRequest>,
) -> Result<impl IntoResponse, AppError> {
    // The API never skips the read-only check; only provisioning does.
    let correlation =
        correlation_service::create_correlation(&pool, auth.org_id, &source_uid, request, false)
            .await?;

    Ok((
        StatusCode::CREATED,
        Json(CorrelationMutationResponse {
            message: "Correlation created",
            result: correlation,
        }),
    ))
}

/// Delete a correlation.
///
/// # Response
///
/// - **Success (200 OK)**: `{"message": "Correlation deleted"}`
/// - **Error (403)**: source is read-only
/// - **Error (404)**: source or correlation not found
pub async fn delete_correlation(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path((source_uid, uid)): Path<(String, String)>,
) -> Result<Json<MessageResponse>, AppError> {
    correlation_service::delete_correlation(&pool, auth.org_id, &source_uid, &uid).await?;

    Ok(Json(MessageResponse {
        message: "Correlation deleted",
    }))
}

/// Update a correlation.
///
/// # Request Body
///
/// Any subset of `label`, `description`, `config`; at least one is required.
///
/// # Response
///
/// - **Success (200 OK)**: `{"message": "Correlation updated", "result": {...}}`
/// - **Error (400)**: empty body or invalid config
/// - **Error (403)**: source is read-only
/// - **Error (404)**: source or correlation not found
pub async fn update_correlation(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path((source_uid, uid)): Path<(String, String)>,
    Json(request): Json<UpdateCorrelationRequest>,
) -> Result<Json<CorrelationMutationResponse>, AppError> {
    let correlation =
        correlation_service::update_correlation(&pool, auth.org_id, &source_uid, &uid, request)
            .await?;

    Ok(Json(CorrelationMutationResponse {
        message: "Correlation updated",
        result: correlation,
    }))
}

/// Get one correlation.
pub async fn get_correlation(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path((source_uid, uid)): Path<(String, String)>,
) -> Result<Json<Correlation>, AppError> {
    let correlation =
        correlation_service::get_correlation(&pool, auth.org_id, &source_uid, &uid).await?;

    Ok(Json(correlation))
}

/// List the correlations of one source data source.
pub async fn list_source_correlations(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(source_uid): Path<String>,
) -> Result<Json<Vec<Correlation>>, AppError> {
    let correlations =
        correlation_service::list_correlations_by_source(&pool, auth.org_id, &source_uid).await?;

    Ok(Json(correlations))
}

/// List every correlation in the org.
///
/// # Query Parameters
///
/// - `limit`: page size, 1..=1000 (default 100)
/// - `page`: 1-based page number
///
/// Returns 404 when the requested page is empty.
pub async fn list_correlations(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<CorrelationListQuery>,
) -> Result<Json<Vec<Correlation>>, AppError> {
    let correlations = correlation_service::list_correlations(&pool, auth.org_id, query).await?;

    Ok(Json(correlations))
}
