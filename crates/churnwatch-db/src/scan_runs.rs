//! Database operations for the `scan_runs` table.
//!
//! Run status moves `pending → extracting → completed | failed`. Transitions
//! are guarded UPDATEs: a run that is not in the expected source status is
//! left untouched and the caller gets [`DbError::InvalidRunTransition`].

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `scan_runs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ScanRunRow {
    pub id: i64,
    pub public_id: Uuid,
    pub target_id: i64,
    pub trigger_source: String,
    pub status: String,
    pub extracted_count: i32,
    /// Extracted/known ratio; `NULL` until the coverage gate has run.
    pub coverage_ratio: Option<f64>,
    /// Whether the gate authorized the diff; `NULL` until evaluated.
    pub trusted: Option<bool>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Creates a new scan run in `pending` status.
///
/// Generates a UUID in Rust and binds it to `public_id`. Returns the full
/// newly-created row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_scan_run(
    pool: &PgPool,
    target_id: i64,
    trigger_source: &str,
) -> Result<ScanRunRow, DbError> {
    let public_id = Uuid::new_v4();

    let row = sqlx::query_as::<_, ScanRunRow>(
        "INSERT INTO scan_runs (public_id, target_id, trigger_source, status) \
         VALUES ($1, $2, $3, 'pending') \
         RETURNING id, public_id, target_id, trigger_source, status, \
                   extracted_count, coverage_ratio, trusted, \
                   started_at, completed_at, error_message, created_at",
    )
    .bind(public_id)
    .bind(target_id)
    .bind(trigger_source)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Marks a run as `extracting` and sets `started_at = NOW()`.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not `pending`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn start_extraction(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE scan_runs \
         SET status = 'extracting', started_at = NOW() \
         WHERE id = $1 AND status = 'pending'",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "pending",
        });
    }

    Ok(())
}

/// Marks a run as `completed` with its extraction and coverage results.
///
/// A completed run with `trusted = false` is the "untrusted partial" outcome:
/// the extraction finished but its diff was skipped. Callers surface that
/// distinctly from "completed with no changes".
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not `extracting`,
/// or [`DbError::Sqlx`] if the update fails.
pub async fn complete_scan_run(
    pool: &PgPool,
    id: i64,
    extracted_count: i32,
    coverage_ratio: f64,
    trusted: bool,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE scan_runs \
         SET status = 'completed', completed_at = NOW(), \
             extracted_count = $1, coverage_ratio = $2, trusted = $3 \
         WHERE id = $4 AND status = 'extracting'",
    )
    .bind(extracted_count)
    .bind(coverage_ratio)
    .bind(trusted)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "extracting",
        });
    }

    Ok(())
}

/// Marks a run as `failed`, sets `completed_at = NOW()` and `error_message`.
///
/// Accepted from either `pending` or `extracting`: a run can fail before its
/// first page arrives (e.g. the per-target lock is held) or mid-extraction.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is already terminal,
/// or [`DbError::Sqlx`] if the update fails.
pub async fn fail_scan_run(pool: &PgPool, id: i64, error_message: &str) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE scan_runs \
         SET status = 'failed', completed_at = NOW(), error_message = $1 \
         WHERE id = $2 AND status IN ('pending', 'extracting')",
    )
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "pending or extracting",
        });
    }

    Ok(())
}

/// Fetches a single run by its external `public_id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given id, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_scan_run_by_public_id(
    pool: &PgPool,
    public_id: Uuid,
) -> Result<ScanRunRow, DbError> {
    let row = sqlx::query_as::<_, ScanRunRow>(
        "SELECT id, public_id, target_id, trigger_source, status, \
                extracted_count, coverage_ratio, trusted, \
                started_at, completed_at, error_message, created_at \
         FROM scan_runs \
         WHERE public_id = $1",
    )
    .bind(public_id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Returns the most recent `limit` runs, newest first, optionally scoped to
/// one target.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_scan_runs(
    pool: &PgPool,
    target_id: Option<i64>,
    limit: i64,
) -> Result<Vec<ScanRunRow>, DbError> {
    let rows = sqlx::query_as::<_, ScanRunRow>(
        "SELECT id, public_id, target_id, trigger_source, status, \
                extracted_count, coverage_ratio, trusted, \
                started_at, completed_at, error_message, created_at \
         FROM scan_runs \
         WHERE ($1::bigint IS NULL OR target_id = $1) \
         ORDER BY created_at DESC, id DESC \
         LIMIT $2",
    )
    .bind(target_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
