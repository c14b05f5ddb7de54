//! Database operations for the `tracked_targets` table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `tracked_targets` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TrackedTargetRow {
    pub id: i64,
    pub public_id: Uuid,
    pub handle: String,
    pub display_name: Option<String>,
    /// Opaque reference to the owning user; user management lives outside
    /// this service.
    pub owner_id: Option<Uuid>,
    pub last_completed_run_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Creates a tracked target, generating its `public_id` in Rust.
///
/// The handle must already be in canonical form (lowercase, no leading `@`);
/// callers normalize before insert. Returns the full newly-created row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails, including unique-violation
/// on an already-tracked handle.
pub async fn create_target(
    pool: &PgPool,
    handle: &str,
    display_name: Option<&str>,
    owner_id: Option<Uuid>,
) -> Result<TrackedTargetRow, DbError> {
    let public_id = Uuid::new_v4();

    let row = sqlx::query_as::<_, TrackedTargetRow>(
        "INSERT INTO tracked_targets (public_id, handle, display_name, owner_id) \
         VALUES ($1, $2, $3, $4) \
         RETURNING id, public_id, handle, display_name, owner_id, \
                   last_completed_run_id, created_at",
    )
    .bind(public_id)
    .bind(handle)
    .bind(display_name)
    .bind(owner_id)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Fetches a target by its canonical handle.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_target_by_handle(
    pool: &PgPool,
    handle: &str,
) -> Result<Option<TrackedTargetRow>, DbError> {
    let row = sqlx::query_as::<_, TrackedTargetRow>(
        "SELECT id, public_id, handle, display_name, owner_id, \
                last_completed_run_id, created_at \
         FROM tracked_targets \
         WHERE handle = $1",
    )
    .bind(handle)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns all tracked targets, oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_targets(pool: &PgPool) -> Result<Vec<TrackedTargetRow>, DbError> {
    let rows = sqlx::query_as::<_, TrackedTargetRow>(
        "SELECT id, public_id, handle, display_name, owner_id, \
                last_completed_run_id, created_at \
         FROM tracked_targets \
         ORDER BY created_at, id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Advances the target's last-completed-run pointer.
///
/// Called only after the run's snapshot commit and event append have both
/// committed, so the pointer always names a consistent baseline.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the target does not exist, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn set_last_completed_run(
    pool: &PgPool,
    target_id: i64,
    run_id: i64,
) -> Result<(), DbError> {
    let result = sqlx::query("UPDATE tracked_targets SET last_completed_run_id = $1 WHERE id = $2")
        .bind(run_id)
        .bind(target_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}
