//! Per-target advisory locks.
//!
//! Snapshot commit and event append for one target must not interleave with a
//! second in-flight run for the same target, so the pipeline takes a session
//! advisory lock keyed by target id before reading its baseline. The event
//! ledger's uniqueness constraint remains the safety net if the lock is ever
//! bypassed.
//!
//! Session locks follow the holding connection, so callers must acquire a
//! dedicated connection, keep it alive for the run, and release on the same
//! connection.

use sqlx::pool::PoolConnection;
use sqlx::Postgres;

/// Namespace XORed into the lock key, keeping churnwatch locks disjoint from
/// any other application sharing the database.
const LOCK_NAMESPACE: i64 = 0x4357_0000_0000;

fn lock_key(target_id: i64) -> i64 {
    LOCK_NAMESPACE ^ target_id
}

/// Attempts to take the per-target lock without blocking.
///
/// Returns `false` when another session already holds it — i.e. a run for
/// this target is in flight.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn try_target_lock(
    conn: &mut PoolConnection<Postgres>,
    target_id: i64,
) -> Result<bool, sqlx::Error> {
    let acquired = sqlx::query_scalar::<_, bool>("SELECT pg_try_advisory_lock($1)")
        .bind(lock_key(target_id))
        .fetch_one(conn.as_mut())
        .await?;

    Ok(acquired)
}

/// Releases the per-target lock on the same connection that acquired it.
///
/// Returns `false` if the lock was not held, which indicates a caller bug
/// (release without acquire) rather than a data problem.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn release_target_lock(
    conn: &mut PoolConnection<Postgres>,
    target_id: i64,
) -> Result<bool, sqlx::Error> {
    let released = sqlx::query_scalar::<_, bool>("SELECT pg_advisory_unlock($1)")
        .bind(lock_key(target_id))
        .fetch_one(conn.as_mut())
        .await?;

    Ok(released)
}
