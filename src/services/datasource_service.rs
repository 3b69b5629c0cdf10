//! Data source service - registry of the sources correlations point at.
//!
//! This service handles:
//! - Registration (with optional provisioned correlations)
//! - Lookup by uid, used by the correlation checks
//! - Deletion, which also removes every correlation touching the source

use sqlx::{PgConnection, PgExecutor};

use crate::{
    db::{DbPool, is_unique_violation},
    error::AppError,
    models::datasource::{CreateDataSourceRequest, DataSource},
    services::{correlation_service, uid::generate_short_uid},
};

/// Look up a data source by uid within an org.
///
/// Runs on any executor so correlation writes can check sources inside their
/// own transaction.
pub async fn find_by_uid<'e, E>(
    executor: E,
    org_id: i64,
    uid: &str,
) -> Result<Option<DataSource>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, DataSource>("SELECT * FROM data_source WHERE org_id = $1 AND uid = $2")
        .bind(org_id)
        .bind(uid)
        .fetch_optional(executor)
        .await
}

/// Like [`find_by_uid`], but holds a `FOR SHARE` lock on the row until the
/// surrounding transaction ends.
///
/// Correlation writes take this lock on the data sources they reference, so
/// a concurrent [`delete_data_source`] waits for them to commit and its
/// cascade sees their rows.
pub async fn find_by_uid_for_share(
    conn: &mut PgConnection,
    org_id: i64,
    uid: &str,
) -> Result<Option<DataSource>, sqlx::Error> {
    sqlx::query_as::<_, DataSource>(
        "SELECT * FROM data_source WHERE org_id = $1 AND uid = $2 FOR SHARE",
    )
    .bind(org_id)
    .bind(uid)
    .fetch_optional(&mut *conn)
    .await
}

/// Register a new data source.
///
/// # Process
///
/// 1. Validate the request
/// 2. Start database transaction
/// 3. Insert the data source (uid generated when absent)
/// 4. Create provisioned correlations, skipping the read-only check
/// 5. Commit
///
/// # Errors
///
/// - `InvalidRequest`: blank name/type, malformed uid or url
/// - `DataSourceAlreadyExists`: uid or name already used in the org
/// - Any correlation error for the provisioned correlations
/// - `Database`: Database error occurred
pub async fn create_data_source(
    pool: &DbPool,
    org_id: i64,
    request: CreateDataSourceRequest,
) -> Result<DataSource, AppError> {
    request.validate()?;

    let uid = request.uid.unwrap_or_else(generate_short_uid);

    let mut tx = pool.begin().await?;

    let data_source = sqlx::query_as::<_, DataSource>(
        r#"
        INSERT INTO data_source (org_id, uid, name, type, url, read_only)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(org_id)
    .bind(&uid)
    .bind(request.name.trim())
    .bind(&request.ds_type)
    .bind(&request.url)
    .bind(request.read_only)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::DataSourceAlreadyExists
        } else {
            AppError::Database(e)
        }
    })?;

    for correlation in request.correlations {
        correlation_service::insert_correlation(&mut *tx, org_id, &data_source.uid, correlation, true)
            .await?;
    }

    tx.commit().await?;

    tracing::info!(org_id, uid = %data_source.uid, "data source created");

    Ok(data_source)
}

/// Get a data source by uid.
///
/// # Errors
///
/// - `DataSourceNotFound`: no such uid in the org
pub async fn get_data_source(pool: &DbPool, org_id: i64, uid: &str) -> Result<DataSource, AppError> {
    find_by_uid(pool, org_id, uid)
        .await?
        .ok_or(AppError::DataSourceNotFound)
}

/// List every data source in an org, ordered by name.
pub async fn list_data_sources(pool: &DbPool, org_id: i64) -> Result<Vec<DataSource>, AppError> {
    let data_sources = sqlx::query_as::<_, DataSource>(
        "SELECT * FROM data_source WHERE org_id = $1 ORDER BY name",
    )
    .bind(org_id)
    .fetch_all(pool)
    .await?;

    Ok(data_sources)
}

/// Delete a data source and all correlations that use it.
///
/// # Process
///
/// 1. Lock the data source row
/// 2. Refuse read-only (provisioned) sources
/// 3. Delete the row
/// 4. Delete correlations where it is the source, then where it is the target
/// 5. Commit
///
/// # Errors
///
/// - `DataSourceNotFound`: no such uid in the org
/// - `DataSourceReadOnly`: source is provisioned
pub async fn delete_data_source(pool: &DbPool, org_id: i64, uid: &str) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;

    let data_source = sqlx::query_as::<_, DataSource>(
        "SELECT * FROM data_source WHERE org_id = $1 AND uid = $2 FOR UPDATE",
    )
    .bind(org_id)
    .bind(uid)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::DataSourceNotFound)?;

    if data_source.read_only {
        return Err(AppError::DataSourceReadOnly);
    }

    sqlx::query("DELETE FROM data_source WHERE id = $1")
        .bind(data_source.id)
        .execute(&mut *tx)
        .await?;

    let as_source = correlation_service::delete_correlations_by_source_uid(&mut *tx, org_id, uid).await?;
    let as_target = correlation_service::delete_correlations_by_target_uid(&mut *tx, org_id, uid).await?;

    tx.commit().await?;

    tracing::info!(
        org_id,
        uid,
        correlations_removed = as_source + as_target,
        "data source deleted"
    );

    Ok(())
}
