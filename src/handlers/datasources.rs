//! Data source HTTP handlers.
//!
//! This module implements the data source registry endpoints:
//! - POST /api/v1/datasources - Register a data source
//! - GET /api/v1/datasources - List data sources of the org
//! - GET /api/v1/datasources/{uid} - Get one data source
//! - DELETE /api/v1/datasources/{uid} - Delete it and its correlations

use crate::{
    db::DbPool,
    error::AppError,
    middleware::auth::AuthContext,
    models::datasource::{CreateDataSourceRequest, DataSource},
    services::datasource_service,
};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

/// Register a data source.
///
/// # Request Body
///
/// ```json
/// {
///   "uid": "loki-main",
///   "name": "Loki",
///   "type": "loki",
///   "url": "http://loki:3100"
/// }
/// ```
///
/// # Response
///
/// - **Success (201 Created)**: the stored data source
/// - **Error (400)**: invalid name, type, uid or url
/// - **Error (409)**: uid or name already taken in the org
pub async fn create_data_source(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateDataSourceRequest>,
) -> Result<impl IntoResponse, AppError> {
    let data_source = datasource_service::create_data_source(&pool, auth.org_id, request).await?;

    Ok((StatusCode::CREATED, Json(data_source)))
}

/// List the org's data sources, ordered by name.
pub async fn list_data_sources(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<DataSource>>, AppError> {
    let data_sources = datasource_service::list_data_sources(&pool, auth.org_id).await?;

    Ok(Json(data_sources))
}

/// Get a data source by uid.
///
/// Returns 404 for uids of other orgs.
pub async fn get_data_source(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(uid): Path<String>,
) -> Result<Json<DataSource>, AppError> {
    let data_source = datasource_service::get_data_source(&pool, auth.org_id, &uid).await?;

    Ok(Json(data_source))
}

/// Delete a data source.
///
/// # Response
///
/// - **Success (204 No Content)**
/// - **Error (403)**: data source is read-only
/// - **Error (404)**: no such data source
///
/// Correlations from or to this data source are removed with it.
pub async fn delete_data_source(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(uid): Path<String>,
) -> Result<StatusCode, AppError> {
    datasource_service::delete_data_source(&pool, auth.org_id, &uid).await?;

    Ok(StatusCode::NO_CONTENT)
}
