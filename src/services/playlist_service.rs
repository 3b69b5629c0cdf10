//! Playlist service - ordered dashboard rotations and their items.
//!
//! This service handles:
//! - Unique uid generation with bounded retries
//! - Transactional create/update/delete of a playlist together with its items
//! - Lookups and name search scoped to an org
//!
//! # Item order
//!
//! Items are always renumbered 1..=n from their position in the request, on
//! create and on update.

use sqlx::{PgConnection, PgExecutor, QueryBuilder, Postgres};

use crate::{
    db::DbPool,
    error::AppError,
    models::playlist::{Playlist, PlaylistDto, PlaylistItem, PlaylistItemRequest, PlaylistRequest},
    services::uid::{find_free_uid, generate_short_uid},
};

/// Reject commands that don't name a playlist in an org.
fn validate_target(org_id: i64, uid: &str) -> Result<(), AppError> {
    if uid.is_empty() || org_id <= 0 {
        return Err(AppError::CommandValidationFailed);
    }
    Ok(())
}

/// Pick a uid no playlist in `org_id` uses yet.
///
/// # Errors
///
/// - `PlaylistFailedGenerateUniqueUid`: all attempts collided
/// - `Database`: the uniqueness probe failed
pub async fn generate_playlist_uid(pool: &DbPool, org_id: i64) -> Result<String, AppError> {
    find_free_uid(generate_short_uid, |uid| async move {
        find_playlist(pool, org_id, &uid).await.map(|p| p.is_some())
    })
    .await?
    .ok_or(AppError::PlaylistFailedGenerateUniqueUid)
}

/// Create a playlist and its items.
///
/// # Process
///
/// 1. Generate a unique uid
/// 2. Start database transaction
/// 3. Insert the playlist, returning its id
/// 4. Insert items under that id
/// 5. Commit
///
/// # Errors
///
/// - `CommandValidationFailed`: org id missing
/// - `InvalidRequest`: name or interval too long
/// - `PlaylistFailedGenerateUniqueUid`
/// - `Database`: Database error occurred
pub async fn create_playlist(
    pool: &DbPool,
    org_id: i64,
    request: PlaylistRequest,
) -> Result<Playlist, AppError> {
    if org_id <= 0 {
        return Err(AppError::CommandValidationFailed);
    }
    request.validate()?;

    let uid = generate_playlist_uid(pool, org_id).await?;

    let mut tx = pool.begin().await?;

    let playlist = sqlx::query_as::<_, Playlist>(
        r#"
        INSERT INTO playlist (uid, org_id, name, "interval")
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(&uid)
    .bind(org_id)
    .bind(&request.name)
    .bind(&request.interval)
    .fetch_one(&mut *tx)
    .await?;

    insert_items(&mut *tx, playlist.id, &request.items).await?;

    tx.commit().await?;

    tracing::info!(org_id, uid = %playlist.uid, items = request.items.len(), "playlist created");

    Ok(playlist)
}

/// Replace name, interval and all items of a playlist.
///
/// # Errors
///
/// - `CommandValidationFailed`
/// - `InvalidRequest`: name or interval too long
/// - `PlaylistNotFound`
pub async fn update_playlist(
    pool: &DbPool,
    org_id: i64,
    uid: &str,
    request: PlaylistRequest,
) -> Result<PlaylistDto, AppError> {
    validate_target(org_id, uid)?;
    request.validate()?;

    let mut tx = pool.begin().await?;

    let playlist = sqlx::query_as::<_, Playlist>(
        r#"
        UPDATE playlist
        SET name = $1, "interval" = $2, updated_at = NOW()
        WHERE uid = $3 AND org_id = $4
        RETURNING *
        "#,
    )
    .bind(&request.name)
    .bind(&request.interval)
    .bind(uid)
    .bind(org_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::PlaylistNotFound)?;

    sqlx::query("DELETE FROM playlist_item WHERE playlist_id = $1")
        .bind(playlist.id)
        .execute(&mut *tx)
        .await?;

    let items = insert_items(&mut *tx, playlist.id, &request.items).await?;

    tx.commit().await?;

    tracing::info!(org_id, uid, items = items.len(), "playlist updated");

    Ok(PlaylistDto::new(playlist, items))
}

/// Get a playlist by uid.
///
/// # Errors
///
/// - `CommandValidationFailed`
/// - `PlaylistNotFound`
pub async fn get_playlist(pool: &DbPool, org_id: i64, uid: &str) -> Result<Playlist, AppError> {
    validate_target(org_id, uid)?;

    find_playlist(pool, org_id, uid)
        .await?
        .ok_or(AppError::PlaylistNotFound)
}

/// Delete a playlist and its items.
///
/// # Errors
///
/// - `CommandValidationFailed`
/// - `PlaylistNotFound`
pub async fn delete_playlist(pool: &DbPool, org_id: i64, uid: &str) -> Result<(), AppError> {
    validate_target(org_id, uid)?;

    let mut tx = pool.begin().await?;

    let playlist_id: i64 =
        sqlx::query_scalar("DELETE FROM playlist WHERE uid = $1 AND org_id = $2 RETURNING id")
            .bind(uid)
            .bind(org_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(AppError::PlaylistNotFound)?;

    sqlx::query("DELETE FROM playlist_item WHERE playlist_id = $1")
        .bind(playlist_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(org_id, uid, "playlist deleted");

    Ok(())
}

/// Search playlists in an org.
///
/// An empty or absent `name` matches every playlist; otherwise the name must
/// contain it.
///
/// # Errors
///
/// - `CommandValidationFailed`: org id missing
pub async fn list_playlists(
    pool: &DbPool,
    org_id: i64,
    name: Option<&str>,
    limit: i64,
) -> Result<Vec<Playlist>, AppError> {
    if org_id <= 0 {
        return Err(AppError::CommandValidationFailed);
    }

    let mut builder = QueryBuilder::<Postgres>::new("SELECT * FROM playlist WHERE org_id = ");
    builder.push_bind(org_id);

    if let Some(name) = name.filter(|n| !n.is_empty()) {
        builder.push(" AND name LIKE ");
        builder.push_bind(format!("%{}%", name));
    }

    builder.push(" ORDER BY name LIMIT ");
    builder.push_bind(limit);

    let playlists = builder.build_query_as::<Playlist>().fetch_all(pool).await?;

    Ok(playlists)
}

/// Items of a playlist, in playlist order.
///
/// # Errors
///
/// - `CommandValidationFailed`
/// - `PlaylistNotFound`
pub async fn get_playlist_items(
    pool: &DbPool,
    org_id: i64,
    uid: &str,
) -> Result<Vec<PlaylistItem>, AppError> {
    let playlist = get_playlist(pool, org_id, uid).await?;

    let items = items_of(pool, playlist.id).await?;

    Ok(items)
}

/// A playlist together with its items.
pub async fn get_playlist_dto(
    pool: &DbPool,
    org_id: i64,
    uid: &str,
) -> Result<PlaylistDto, AppError> {
    let playlist = get_playlist(pool, org_id, uid).await?;
    let items = items_of(pool, playlist.id).await?;

    Ok(PlaylistDto::new(playlist, items))
}

async fn find_playlist<'e, E>(
    executor: E,
    org_id: i64,
    uid: &str,
) -> Result<Option<Playlist>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, Playlist>("SELECT * FROM playlist WHERE uid = $1 AND org_id = $2")
        .bind(uid)
        .bind(org_id)
        .fetch_optional(executor)
        .await
}

async fn items_of<'e, E>(executor: E, playlist_id: i64) -> Result<Vec<PlaylistItem>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, PlaylistItem>(
        r#"SELECT * FROM playlist_item WHERE playlist_id = $1 ORDER BY "order""#,
    )
    .bind(playlist_id)
    .fetch_all(executor)
    .await
}

/// Insert `items` under `playlist_id` with order = position + 1.
async fn insert_items(
    conn: &mut PgConnection,
    playlist_id: i64,
    items: &[PlaylistItemRequest],
) -> Result<Vec<PlaylistItem>, sqlx::Error> {
    if items.is_empty() {
        return Ok(Vec::new());
    }

    let mut builder = QueryBuilder::<Postgres>::new(
        r#"INSERT INTO playlist_item (playlist_id, type, value, title, "order") "#,
    );
    builder.push_values(items.iter().zip(1i32..), |mut row, (item, order)| {
        row.push_bind(playlist_id)
            .push_bind(item.item_type.as_str())
            .push_bind(item.value.clone())
            .push_bind(item.title.clone())
            .push_bind(order);
    });
    builder.push(" RETURNING *");

    let mut inserted = builder
        .build_query_as::<PlaylistItem>()
        .fetch_all(&mut *conn)
        .await?;
    inserted.sort_by_key(|item| item.order);

    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::playlist::PlaylistItemType;
    use sqlx::PgPool;

    fn lazy_pool() -> DbPool {
        sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unreachable")
            .unwrap()
    }

    fn item(item_type: PlaylistItemType, value: &str) -> PlaylistItemRequest {
        PlaylistItemRequest {
            item_type,
            value: value.to_string(),
            title: format!("{} title", value),
        }
    }

    fn request(name: &str, items: Vec<PlaylistItemRequest>) -> PlaylistRequest {
        PlaylistRequest {
            name: name.to_string(),
            interval: "5m".to_string(),
            items,
        }
    }

    #[tokio::test]
    async fn missing_identifiers_fail_validation() {
        let pool = lazy_pool();

        assert!(matches!(
            get_playlist(&pool, 1, "").await,
            Err(AppError::CommandValidationFailed)
        ));
        assert!(matches!(
            get_playlist(&pool, 0, "abc").await,
            Err(AppError::CommandValidationFailed)
        ));
        assert!(matches!(
            delete_playlist(&pool, 1, "").await,
            Err(AppError::CommandValidationFailed)
        ));
        assert!(matches!(
            get_playlist_items(&pool, 0, "abc").await,
            Err(AppError::CommandValidationFailed)
        ));
        assert!(matches!(
            update_playlist(&pool, 1, "", request("x", vec![])).await,
            Err(AppError::CommandValidationFailed)
        ));
        assert!(matches!(
            list_playlists(&pool, 0, None, 10).await,
            Err(AppError::CommandValidationFailed)
        ));
        assert!(matches!(
            create_playlist(&pool, 0, request("x", vec![])).await,
            Err(AppError::CommandValidationFailed)
        ));
    }

    #[tokio::test]
    async fn oversized_fields_are_rejected_before_any_query() {
        let pool = lazy_pool();

        assert!(matches!(
            create_playlist(&pool, 1, request(&"n".repeat(256), vec![])).await,
            Err(AppError::InvalidRequest(_))
        ));
        assert!(matches!(
            update_playlist(&pool, 1, "abc", request(&"n".repeat(256), vec![])).await,
            Err(AppError::InvalidRequest(_))
        ));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn create_then_read_back_items_in_order(pool: PgPool) {
        let playlist = create_playlist(
            &pool,
            1,
            request(
                "NOC",
                vec![
                    item(PlaylistItemType::DashboardByUid, "nodes"),
                    item(PlaylistItemType::DashboardByTag, "k8s"),
                    item(PlaylistItemType::DashboardById, "42"),
                ],
            ),
        )
        .await
        .unwrap();

        let items = get_playlist_items(&pool, 1, &playlist.uid).await.unwrap();

        assert_eq!(items.len(), 3);
        assert!(items.iter().all(|i| i.playlist_id == playlist.id));
        assert_eq!(
            items.iter().map(|i| i.order).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(items[1].item_type, "dashboard_by_tag");
        assert_eq!(items[1].value, "k8s");

        // Other orgs can't see it
        assert!(matches!(
            get_playlist(&pool, 2, &playlist.uid).await,
            Err(AppError::PlaylistNotFound)
        ));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn update_replaces_items(pool: PgPool) {
        let playlist = create_playlist(
            &pool,
            1,
            request("NOC", vec![item(PlaylistItemType::DashboardByUid, "old")]),
        )
        .await
        .unwrap();

        let dto = update_playlist(
            &pool,
            1,
            &playlist.uid,
            PlaylistRequest {
                name: "NOC v2".to_string(),
                interval: "1m".to_string(),
                items: vec![
                    item(PlaylistItemType::DashboardByUid, "a"),
                    item(PlaylistItemType::DashboardByUid, "b"),
                ],
            },
        )
        .await
        .unwrap();

        assert_eq!(dto.id, playlist.id);
        assert_eq!(dto.name, "NOC v2");
        assert_eq!(dto.interval, "1m");
        assert_eq!(
            dto.items.iter().map(|i| i.value.as_str()).collect::<Vec<_>>(),
            vec!["a", "b"]
        );

        let stored = get_playlist_dto(&pool, 1, &playlist.uid).await.unwrap();
        assert_eq!(stored.items.len(), 2);
        assert_eq!(stored.items[0].order, 1);

        assert!(matches!(
            update_playlist(&pool, 1, "missing", request("x", vec![])).await,
            Err(AppError::PlaylistNotFound)
        ));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn delete_removes_playlist_and_items(pool: PgPool) {
        let playlist = create_playlist(
            &pool,
            1,
            request("NOC", vec![item(PlaylistItemType::DashboardByTag, "k8s")]),
        )
        .await
        .unwrap();

        delete_playlist(&pool, 1, &playlist.uid).await.unwrap();

        let orphans: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM playlist_item WHERE playlist_id = $1")
                .bind(playlist.id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(orphans, 0);

        assert!(matches!(
            delete_playlist(&pool, 1, &playlist.uid).await,
            Err(AppError::PlaylistNotFound)
        ));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn list_filters_by_name_and_limit(pool: PgPool) {
        for name in ["Ops wall", "Dev wall", "Ops night"] {
            create_playlist(&pool, 1, request(name, vec![])).await.unwrap();
        }
        create_playlist(&pool, 2, request("Ops elsewhere", vec![]))
            .await
            .unwrap();

        let all = list_playlists(&pool, 1, None, 100).await.unwrap();
        assert_eq!(all.len(), 3);

        let ops = list_playlists(&pool, 1, Some("Ops"), 100).await.unwrap();
        assert_eq!(
            ops.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
            vec!["Ops night", "Ops wall"]
        );

        let limited = list_playlists(&pool, 1, Some(""), 2).await.unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn generated_uids_are_unique_per_org(pool: PgPool) {
        let a = generate_playlist_uid(&pool, 1).await.unwrap();
        let b = generate_playlist_uid(&pool, 1).await.unwrap();
        assert_ne!(a, b);
    }
}
