//! Database operations for the `change_events` table — the append-only
//! change ledger.
//!
//! Appends are idempotent per `(run_id, identity_key, event_type)`: a replayed
//! run's events are silently absorbed by `ON CONFLICT DO NOTHING`. Rows are
//! never updated or deleted; every behavioral report is a projection over this
//! table and can be rebuilt from scratch.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// Input record for appending one change event.
#[derive(Debug, Clone)]
pub struct NewChangeEvent {
    pub identity_key: String,
    pub event_type: String,
    /// Follower display fields frozen at detection time.
    pub display_name: Option<String>,
    pub verified: bool,
    pub followers_count: i32,
    pub following_count: i32,
    pub occurred_at: DateTime<Utc>,
}

/// A row from the `change_events` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ChangeEventRow {
    pub id: i64,
    pub run_id: i64,
    pub target_id: i64,
    pub identity_key: String,
    pub event_type: String,
    pub display_name: Option<String>,
    pub verified: bool,
    pub followers_count: i32,
    pub following_count: i32,
    pub occurred_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Appends a batch of change events for one run.
///
/// Returns the number of rows actually inserted — replayed keys conflict and
/// count zero, so appending the same run twice leaves the ledger identical to
/// appending once.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the insert fails.
pub async fn append_change_events(
    pool: &PgPool,
    run_id: i64,
    target_id: i64,
    events: &[NewChangeEvent],
) -> Result<u64, sqlx::Error> {
    if events.is_empty() {
        return Ok(0);
    }

    // Collect each column into a parallel Vec for UNNEST binding.
    let mut identity_keys: Vec<String> = Vec::with_capacity(events.len());
    let mut event_types: Vec<String> = Vec::with_capacity(events.len());
    let mut display_names: Vec<Option<String>> = Vec::with_capacity(events.len());
    let mut verifieds: Vec<bool> = Vec::with_capacity(events.len());
    let mut followers_counts: Vec<i32> = Vec::with_capacity(events.len());
    let mut following_counts: Vec<i32> = Vec::with_capacity(events.len());
    let mut occurred_ats: Vec<DateTime<Utc>> = Vec::with_capacity(events.len());

    for event in events {
        identity_keys.push(event.identity_key.clone());
        event_types.push(event.event_type.clone());
        display_names.push(event.display_name.clone());
        verifieds.push(event.verified);
        followers_counts.push(event.followers_count);
        following_counts.push(event.following_count);
        occurred_ats.push(event.occurred_at);
    }

    let rows_affected = sqlx::query(
        "INSERT INTO change_events \
             (run_id, target_id, identity_key, event_type, display_name, \
              verified, followers_count, following_count, occurred_at) \
         SELECT $1, $2, * FROM UNNEST(\
              $3::text[], $4::text[], $5::text[], \
              $6::boolean[], $7::int4[], $8::int4[], $9::timestamptz[]) \
         ON CONFLICT (run_id, identity_key, event_type) DO NOTHING",
    )
    .bind(run_id)
    .bind(target_id)
    .bind(&identity_keys)
    .bind(&event_types)
    .bind(&display_names)
    .bind(&verifieds)
    .bind(&followers_counts)
    .bind(&following_counts)
    .bind(&occurred_ats)
    .execute(pool)
    .await?
    .rows_affected();

    Ok(rows_affected)
}

/// Returns up to `limit` events for a target, most recent first.
///
/// Keyset pagination: pass the previous page's smallest `id` as `cursor` to
/// fetch the next page. The returned `next_cursor` convention is handled by
/// the caller (last row's `id` when a full page came back).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_change_events(
    pool: &PgPool,
    target_id: i64,
    limit: i64,
    cursor: Option<i64>,
) -> Result<Vec<ChangeEventRow>, DbError> {
    let rows = sqlx::query_as::<_, ChangeEventRow>(
        "SELECT id, run_id, target_id, identity_key, event_type, display_name, \
                verified, followers_count, following_count, occurred_at, created_at \
         FROM change_events \
         WHERE target_id = $1 \
           AND ($2::bigint IS NULL OR id < $2) \
         ORDER BY occurred_at DESC, id DESC \
         LIMIT $3",
    )
    .bind(target_id)
    .bind(cursor)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns the full event log for a target ordered ascending by occurrence —
/// the classifier's input projection.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_events_for_classification(
    pool: &PgPool,
    target_id: i64,
) -> Result<Vec<ChangeEventRow>, DbError> {
    let rows = sqlx::query_as::<_, ChangeEventRow>(
        "SELECT id, run_id, target_id, identity_key, event_type, display_name, \
                verified, followers_count, following_count, occurred_at, created_at \
         FROM change_events \
         WHERE target_id = $1 \
         ORDER BY occurred_at, id",
    )
    .bind(target_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
