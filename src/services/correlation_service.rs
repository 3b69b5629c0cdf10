//! Correlation service - links between a source and a target data source.
//!
//! This service handles:
//! - Existence and read-only checks on the referenced data sources
//! - Transactional create/update/delete
//! - Bulk removal when a data source goes away
//!
//! Every write checks the source data source inside the same transaction as
//! the write itself, holding a share lock on it until commit.

use sqlx::{PgConnection, PgExecutor, types::Json};

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        correlation::{
            Correlation, CorrelationListQuery, CreateCorrelationRequest, UpdateCorrelationRequest,
        },
        datasource::DataSource,
    },
    services::{datasource_service, uid::generate_short_uid},
};

/// Create a correlation from `source_uid`.
///
/// # Process
///
/// 1. Start database transaction
/// 2. Check source exists (and is writable unless `skip_read_only_check`)
/// 3. Check target exists
/// 4. Insert with a fresh uid
/// 5. Commit
///
/// # Errors
///
/// - `SourceDataSourceDoesNotExist` / `TargetDataSourceDoesNotExist`
/// - `SourceDataSourceReadOnly`: source is provisioned and the check isn't skipped
/// - `InvalidCorrelationConfigType` / `InvalidRequest`: bad config
/// - `Database`: Database error occurred
pub async fn create_correlation(
    pool: &DbPool,
    org_id: i64,
    source_uid: &str,
    request: CreateCorrelationRequest,
    skip_read_only_check: bool,
) -> Result<Correlation, AppError> {
    let mut tx = pool.begin().await?;

    let correlation =
        insert_correlation(&mut *tx, org_id, source_uid, request, skip_read_only_check).await?;

    tx.commit().await?;

    tracing::info!(
        org_id,
        uid = %correlation.uid,
        source_uid,
        target_uid = %correlation.target_uid,
        "correlation created"
    );

    Ok(correlation)
}

/// Insert a correlation on an open connection, running all create checks.
///
/// Shared by [`create_correlation`] and data source provisioning, which needs
/// the data source and its correlations in one transaction.
pub async fn insert_correlation(
    conn: &mut PgConnection,
    org_id: i64,
    source_uid: &str,
    request: CreateCorrelationRequest,
    skip_read_only_check: bool,
) -> Result<Correlation, AppError> {
    let source = datasource_service::find_by_uid_for_share(&mut *conn, org_id, source_uid)
        .await?
        .ok_or(AppError::SourceDataSourceDoesNotExist)?;

    if !skip_read_only_check && source.read_only {
        return Err(AppError::SourceDataSourceReadOnly);
    }

    datasource_service::find_by_uid_for_share(&mut *conn, org_id, &request.target_uid)
        .await?
        .ok_or(AppError::TargetDataSourceDoesNotExist)?;

    if let Some(config) = &request.config {
        config.validate()?;
    }

    let correlation = sqlx::query_as::<_, Correlation>(
        r#"
        INSERT INTO correlation (uid, org_id, source_uid, target_uid, label, description, config)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(generate_short_uid())
    .bind(org_id)
    .bind(source_uid)
    .bind(&request.target_uid)
    .bind(&request.label)
    .bind(&request.description)
    .bind(request.config.map(Json))
    .fetch_one(&mut *conn)
    .await?;

    Ok(correlation)
}

/// Delete a single correlation.
///
/// # Errors
///
/// - `SourceDataSourceDoesNotExist`
/// - `SourceDataSourceReadOnly`
/// - `CorrelationNotFound`: nothing matched `(uid, source_uid)` in the org
pub async fn delete_correlation(
    pool: &DbPool,
    org_id: i64,
    source_uid: &str,
    uid: &str,
) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;

    writable_source(&mut *tx, org_id, source_uid).await?;

    let deleted = sqlx::query(
        "DELETE FROM correlation WHERE uid = $1 AND source_uid = $2 AND org_id = $3",
    )
    .bind(uid)
    .bind(source_uid)
    .bind(org_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if deleted == 0 {
        return Err(AppError::CorrelationNotFound);
    }

    tx.commit().await?;

    tracing::info!(org_id, uid, source_uid, "correlation deleted");

    Ok(())
}

/// Update label, description and/or config of a correlation.
///
/// Fields absent from the request keep their stored value.
///
/// # Errors
///
/// - `UpdateCorrelationEmptyParams`: request changes nothing
/// - `InvalidCorrelationConfigType` / `InvalidRequest`: bad config
/// - `SourceDataSourceDoesNotExist`
/// - `SourceDataSourceReadOnly`
/// - `CorrelationNotFound`
pub async fn update_correlation(
    pool: &DbPool,
    org_id: i64,
    source_uid: &str,
    uid: &str,
    request: UpdateCorrelationRequest,
) -> Result<Correlation, AppError> {
    if request.is_empty() {
        return Err(AppError::UpdateCorrelationEmptyParams);
    }

    if let Some(config) = &request.config {
        config.validate()?;
    }

    let mut tx = pool.begin().await?;

    writable_source(&mut *tx, org_id, source_uid).await?;

    let correlation = sqlx::query_as::<_, Correlation>(
        r#"
        UPDATE correlation
        SET label = COALESCE($1, label),
            description = COALESCE($2, description),
            config = COALESCE($3, config)
        WHERE uid = $4 AND source_uid = $5 AND org_id = $6
        RETURNING *
        "#,
    )
    .bind(request.label)
    .bind(request.description)
    .bind(request.config.map(Json))
    .bind(uid)
    .bind(source_uid)
    .bind(org_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::CorrelationNotFound)?;

    tx.commit().await?;

    tracing::info!(org_id, uid, source_uid, "correlation updated");

    Ok(correlation)
}

/// Get one correlation of a source.
///
/// # Errors
///
/// - `SourceDataSourceDoesNotExist`
/// - `CorrelationNotFound`
pub async fn get_correlation(
    pool: &DbPool,
    org_id: i64,
    source_uid: &str,
    uid: &str,
) -> Result<Correlation, AppError> {
    existing_source(pool, org_id, source_uid).await?;

    sqlx::query_as::<_, Correlation>(
        "SELECT * FROM correlation WHERE uid = $1 AND source_uid = $2 AND org_id = $3",
    )
    .bind(uid)
    .bind(source_uid)
    .bind(org_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::CorrelationNotFound)
}

/// List the correlations of a source. An empty list is not an error.
pub async fn list_correlations_by_source(
    pool: &DbPool,
    org_id: i64,
    source_uid: &str,
) -> Result<Vec<Correlation>, AppError> {
    existing_source(pool, org_id, source_uid).await?;

    let correlations = sqlx::query_as::<_, Correlation>(
        "SELECT * FROM correlation WHERE source_uid = $1 AND org_id = $2 ORDER BY uid",
    )
    .bind(source_uid)
    .bind(org_id)
    .fetch_all(pool)
    .await?;

    Ok(correlations)
}

/// List every correlation in an org, one page at a time.
///
/// # Errors
///
/// - `CorrelationNotFound`: the page is empty
pub async fn list_correlations(
    pool: &DbPool,
    org_id: i64,
    query: CorrelationListQuery,
) -> Result<Vec<Correlation>, AppError> {
    let (limit, offset) = query.limit_offset();

    let correlations = sqlx::query_as::<_, Correlation>(
        r#"
        SELECT * FROM correlation
        WHERE org_id = $1
        ORDER BY source_uid, uid
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(org_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    if correlations.is_empty() {
        return Err(AppError::CorrelationNotFound);
    }

    Ok(correlations)
}

/// Remove every correlation whose source is `source_uid`.
///
/// No existence or read-only checks; returns the number of rows removed.
pub async fn delete_correlations_by_source_uid<'e, E>(
    executor: E,
    org_id: i64,
    source_uid: &str,
) -> Result<u64, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query("DELETE FROM correlation WHERE source_uid = $1 AND org_id = $2")
        .bind(source_uid)
        .bind(org_id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}

/// Remove every correlation whose target is `target_uid`.
pub async fn delete_correlations_by_target_uid<'e, E>(
    executor: E,
    org_id: i64,
    target_uid: &str,
) -> Result<u64, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query("DELETE FROM correlation WHERE target_uid = $1 AND org_id = $2")
        .bind(target_uid)
        .bind(org_id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}

async fn existing_source<'e, E>(
    executor: E,
    org_id: i64,
    source_uid: &str,
) -> Result<DataSource, AppError>
where
    E: PgExecutor<'e>,
{
    datasource_service::find_by_uid(executor, org_id, source_uid)
        .await?
        .ok_or(AppError::SourceDataSourceDoesNotExist)
}

/// Source must exist and must not be read-only. Share-locks the source row.
async fn writable_source(
    conn: &mut PgConnection,
    org_id: i64,
    source_uid: &str,
) -> Result<DataSource, AppError> {
    let source = datasource_service::find_by_uid_for_share(conn, org_id, source_uid)
        .await?
        .ok_or(AppError::SourceDataSourceDoesNotExist)?;

    if source.read_only {
        return Err(AppError::SourceDataSourceReadOnly);
    }

    Ok(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        correlation::CorrelationConfig, datasource::CreateDataSourceRequest,
    };
    use serde_json::json;
    use sqlx::PgPool;

    fn lazy_pool() -> DbPool {
        sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unreachable")
            .unwrap()
    }

    fn correlation_to(target_uid: &str) -> CreateCorrelationRequest {
        CreateCorrelationRequest {
            target_uid: target_uid.to_string(),
            label: "label".to_string(),
            description: "description".to_string(),
            config: None,
        }
    }

    async fn data_source(pool: &PgPool, uid: &str, read_only: bool) {
        datasource_service::create_data_source(
            pool,
            1,
            CreateDataSourceRequest {
                uid: Some(uid.to_string()),
                name: uid.to_string(),
                ds_type: "loki".to_string(),
                url: String::new(),
                read_only,
                correlations: Vec::new(),
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn empty_update_is_rejected_before_any_query() {
        let err = update_correlation(
            &lazy_pool(),
            1,
            "source",
            "uid",
            UpdateCorrelationRequest::default(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::UpdateCorrelationEmptyParams));
    }

    #[tokio::test]
    async fn update_with_bad_config_type_is_rejected_before_any_query() {
        let request = UpdateCorrelationRequest {
            config: Some(
                serde_json::from_value::<CorrelationConfig>(json!({
                    "type": "link",
                    "field": "url"
                }))
                .unwrap(),
            ),
            ..Default::default()
        };

        let err = update_correlation(&lazy_pool(), 1, "source", "uid", request)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::InvalidCorrelationConfigType));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn create_checks_source_then_target(pool: PgPool) {
        let err = create_correlation(&pool, 1, "missing", correlation_to("also-missing"), false)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SourceDataSourceDoesNotExist));

        data_source(&pool, "loki", false).await;

        let err = create_correlation(&pool, 1, "loki", correlation_to("missing"), false)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::TargetDataSourceDoesNotExist));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn read_only_source_blocks_writes_unless_skipped(pool: PgPool) {
        data_source(&pool, "provisioned", true).await;
        data_source(&pool, "prom", false).await;

        let err = create_correlation(&pool, 1, "provisioned", correlation_to("prom"), false)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SourceDataSourceReadOnly));

        let created = create_correlation(&pool, 1, "provisioned", correlation_to("prom"), true)
            .await
            .unwrap();

        let err = delete_correlation(&pool, 1, "provisioned", &created.uid)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SourceDataSourceReadOnly));

        let err = update_correlation(
            &pool,
            1,
            "provisioned",
            &created.uid,
            UpdateCorrelationRequest {
                label: Some("changed".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::SourceDataSourceReadOnly));

        let stored = get_correlation(&pool, 1, "provisioned", &created.uid)
            .await
            .unwrap();
        assert_eq!(stored.label, "label");
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn source_delete_waits_for_in_flight_create(pool: PgPool) {
        data_source(&pool, "loki", false).await;
        data_source(&pool, "prom", false).await;

        let mut tx = pool.begin().await.unwrap();
        insert_correlation(&mut *tx, 1, "prom", correlation_to("loki"), false)
            .await
            .unwrap();

        let delete = tokio::spawn({
            let pool = pool.clone();
            async move { datasource_service::delete_data_source(&pool, 1, "prom").await }
        });

        tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        assert!(!delete.is_finished(), "delete must wait for the open create");

        tx.commit().await.unwrap();
        delete.await.unwrap().unwrap();

        let orphans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM correlation WHERE org_id = 1")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(orphans, 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn create_after_concurrent_source_delete_fails(pool: PgPool) {
        data_source(&pool, "loki", false).await;
        data_source(&pool, "prom", false).await;

        let mut tx = pool.begin().await.unwrap();
        sqlx::query("DELETE FROM data_source WHERE uid = 'prom'")
            .execute(&mut *tx)
            .await
            .unwrap();

        let create = tokio::spawn({
            let pool = pool.clone();
            async move { create_correlation(&pool, 1, "prom", correlation_to("loki"), false).await }
        });

        tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        assert!(!create.is_finished(), "create must wait for the open delete");

        tx.commit().await.unwrap();

        assert!(matches!(
            create.await.unwrap(),
            Err(AppError::SourceDataSourceDoesNotExist)
        ));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn create_update_get_delete(pool: PgPool) {
        data_source(&pool, "loki", false).await;
        data_source(&pool, "tempo", false).await;

        let mut request = correlation_to("tempo");
        request.config = Some(
            serde_json::from_value(json!({ "field": "traceId", "target": { "query": "${traceId}" } }))
                .unwrap(),
        );
        let created = create_correlation(&pool, 1, "loki", request, false)
            .await
            .unwrap();
        assert_eq!(created.source_uid, "loki");
        assert_eq!(created.config.as_ref().unwrap().field, "traceId");

        let updated = update_correlation(
            &pool,
            1,
            "loki",
            &created.uid,
            UpdateCorrelationRequest {
                label: Some("Open trace".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.label, "Open trace");
        assert_eq!(updated.description, "description");
        assert_eq!(updated.config, created.config);

        let fetched = get_correlation(&pool, 1, "loki", &created.uid).await.unwrap();
        assert_eq!(fetched.label, "Open trace");

        assert_eq!(
            list_correlations_by_source(&pool, 1, "loki").await.unwrap().len(),
            1
        );
        assert_eq!(
            list_correlations(&pool, 1, CorrelationListQuery::default())
                .await
                .unwrap()
                .len(),
            1
        );

        delete_correlation(&pool, 1, "loki", &created.uid).await.unwrap();

        assert!(matches!(
            delete_correlation(&pool, 1, "loki", &created.uid).await,
            Err(AppError::CorrelationNotFound)
        ));
        assert!(matches!(
            list_correlations(&pool, 1, CorrelationListQuery::default()).await,
            Err(AppError::CorrelationNotFound)
        ));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn update_of_missing_correlation_is_not_found(pool: PgPool) {
        data_source(&pool, "loki", false).await;

        let err = update_correlation(
            &pool,
            1,
            "loki",
            "nope",
            UpdateCorrelationRequest {
                description: Some("x".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::CorrelationNotFound));
    }
}
