//! Seeding of `tracked_targets` from the YAML targets file.

use sqlx::PgPool;

use churnwatch_core::TargetsFile;

use crate::DbError;

/// Synchronizes the targets file into `tracked_targets`.
///
/// Inserts targets that are not yet tracked and refreshes `display_name` for
/// those that are. Nothing is ever deleted here: dropping a handle from the
/// file stops future scheduled scans (the scan loop reads the database), but
/// its history stays queryable.
///
/// Returns `(inserted, updated)` counts.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails.
pub async fn sync_targets(pool: &PgPool, targets: &TargetsFile) -> Result<(u64, u64), DbError> {
    let mut inserted = 0u64;
    let mut updated = 0u64;

    for target in &targets.targets {
        let handle = target.canonical_handle();

        let is_new = sqlx::query_scalar::<_, bool>(
            "INSERT INTO tracked_targets (public_id, handle, display_name) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (handle) DO UPDATE SET \
                 display_name = EXCLUDED.display_name \
             RETURNING (xmax = 0) AS is_new",
        )
        .bind(uuid::Uuid::new_v4())
        .bind(&handle)
        .bind(&target.display_name)
        .fetch_one(pool)
        .await?;

        if is_new {
            tracing::info!(handle = %handle, "seeded new tracked target");
            inserted += 1;
        } else {
            updated += 1;
        }
    }

    Ok((inserted, updated))
}
