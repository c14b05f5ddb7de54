//! Database operations for the `follower_records` table — the per-target
//! follower snapshot.
//!
//! Status only ever changes along two paths: the diff pipeline marks removed
//! identities `unfollowed`, and the batch upsert reactivates identities that
//! reappear. `first_seen_at` is written on insert and never touched again.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// Upper bound on rows per upsert statement, keeping individual write
/// transactions within storage limits on large accounts.
pub const COMMIT_BATCH_SIZE: usize = 500;

/// Input record for upserting one observed follower.
#[derive(Debug, Clone)]
pub struct NewFollowerRecord {
    pub identity_key: String,
    pub raw_identity: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub verified: bool,
    pub followers_count: i32,
    pub following_count: i32,
    pub avatar_url: Option<String>,
    pub location: Option<String>,
}

/// A row from the `follower_records` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FollowerRow {
    pub id: i64,
    pub target_id: i64,
    pub identity_key: String,
    pub raw_identity: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub verified: bool,
    pub followers_count: i32,
    pub following_count: i32,
    pub avatar_url: Option<String>,
    pub location: Option<String>,
    pub status: String,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub unfollowed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Returns the identity keys currently `active` for a target — the previous
/// snapshot baseline for the next run's diff.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_active_identities(
    pool: &PgPool,
    target_id: i64,
) -> Result<Vec<String>, DbError> {
    let keys = sqlx::query_scalar::<_, String>(
        "SELECT identity_key FROM follower_records \
         WHERE target_id = $1 AND status = 'active'",
    )
    .bind(target_id)
    .fetch_all(pool)
    .await?;

    Ok(keys)
}

/// Counts followers currently `active` for a target.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_active_followers(pool: &PgPool, target_id: i64) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM follower_records \
         WHERE target_id = $1 AND status = 'active'",
    )
    .bind(target_id)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Of `candidate_keys`, returns those recorded with status `unfollowed`.
///
/// This storage-history lookup is what separates a refollow from a
/// first-time follow: set membership alone cannot distinguish them.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_unfollowed_identities(
    pool: &PgPool,
    target_id: i64,
    candidate_keys: &[String],
) -> Result<Vec<String>, DbError> {
    if candidate_keys.is_empty() {
        return Ok(Vec::new());
    }

    let keys = sqlx::query_scalar::<_, String>(
        "SELECT identity_key FROM follower_records \
         WHERE target_id = $1 \
           AND status = 'unfollowed' \
           AND identity_key = ANY($2::text[])",
    )
    .bind(target_id)
    .bind(candidate_keys)
    .fetch_all(pool)
    .await?;

    Ok(keys)
}

/// Fetches full follower rows for the given identity keys.
///
/// Used to freeze display fields into unfollow events before the snapshot
/// commit overwrites or deactivates the rows.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_followers_by_keys(
    pool: &PgPool,
    target_id: i64,
    keys: &[String],
) -> Result<Vec<FollowerRow>, DbError> {
    if keys.is_empty() {
        return Ok(Vec::new());
    }

    let rows = sqlx::query_as::<_, FollowerRow>(
        "SELECT id, target_id, identity_key, raw_identity, display_name, bio, \
                verified, followers_count, following_count, avatar_url, location, \
                status, first_seen_at, last_seen_at, unfollowed_at, \
                created_at, updated_at \
         FROM follower_records \
         WHERE target_id = $1 AND identity_key = ANY($2::text[])",
    )
    .bind(target_id)
    .bind(keys)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Upserts a batch of observed followers for a target.
///
/// Returns `(new_count, refreshed_count)` where:
/// - `new_count`: identities that did not exist before (inserted);
/// - `refreshed_count`: identities that already existed (updated).
///
/// Each chunk of at most [`COMMIT_BATCH_SIZE`] rows is written with a single
/// `INSERT … SELECT * FROM UNNEST(…) ON CONFLICT` round-trip. Conflicts on
/// `(target_id, identity_key)` refresh `last_seen_at`, force the record back
/// to `active`, clear `unfollowed_at`, and update the display fields;
/// `first_seen_at` is never part of the update list.
///
/// The upsert is idempotent — replaying a run's commit refreshes the same
/// rows again without creating duplicates.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if any chunk fails.
pub async fn upsert_followers(
    pool: &PgPool,
    target_id: i64,
    followers: &[NewFollowerRecord],
) -> Result<(u64, u64), sqlx::Error> {
    let mut new_count = 0u64;
    let mut refreshed_count = 0u64;

    for chunk in followers.chunks(COMMIT_BATCH_SIZE) {
        let (chunk_new, chunk_refreshed) = upsert_follower_chunk(pool, target_id, chunk).await?;
        new_count += chunk_new;
        refreshed_count += chunk_refreshed;
    }

    Ok((new_count, refreshed_count))
}

async fn upsert_follower_chunk(
    pool: &PgPool,
    target_id: i64,
    followers: &[NewFollowerRecord],
) -> Result<(u64, u64), sqlx::Error> {
    if followers.is_empty() {
        return Ok((0, 0));
    }

    // Collect each column into a parallel Vec for UNNEST binding.
    let mut identity_keys: Vec<String> = Vec::with_capacity(followers.len());
    let mut raw_identities: Vec<String> = Vec::with_capacity(followers.len());
    let mut display_names: Vec<Option<String>> = Vec::with_capacity(followers.len());
    let mut bios: Vec<Option<String>> = Vec::with_capacity(followers.len());
    let mut verifieds: Vec<bool> = Vec::with_capacity(followers.len());
    let mut followers_counts: Vec<i32> = Vec::with_capacity(followers.len());
    let mut following_counts: Vec<i32> = Vec::with_capacity(followers.len());
    let mut avatar_urls: Vec<Option<String>> = Vec::with_capacity(followers.len());
    let mut locations: Vec<Option<String>> = Vec::with_capacity(followers.len());

    for follower in followers {
        identity_keys.push(follower.identity_key.clone());
        raw_identities.push(follower.raw_identity.clone());
        display_names.push(follower.display_name.clone());
        bios.push(follower.bio.clone());
        verifieds.push(follower.verified);
        followers_counts.push(follower.followers_count);
        following_counts.push(follower.following_count);
        avatar_urls.push(follower.avatar_url.clone());
        locations.push(follower.location.clone());
    }

    let rows: Vec<bool> = sqlx::query_scalar::<_, bool>(
        "INSERT INTO follower_records \
             (target_id, identity_key, raw_identity, display_name, bio, \
              verified, followers_count, following_count, avatar_url, location) \
         SELECT $1, * FROM UNNEST(\
              $2::text[], $3::text[], $4::text[], $5::text[], \
              $6::boolean[], $7::int4[], $8::int4[], $9::text[], $10::text[]) \
         ON CONFLICT (target_id, identity_key) DO UPDATE SET \
             last_seen_at    = NOW(), \
             status          = 'active', \
             unfollowed_at   = NULL, \
             updated_at      = NOW(), \
             raw_identity    = EXCLUDED.raw_identity, \
             display_name    = EXCLUDED.display_name, \
             bio             = EXCLUDED.bio, \
             verified        = EXCLUDED.verified, \
             followers_count = EXCLUDED.followers_count, \
             following_count = EXCLUDED.following_count, \
             avatar_url      = EXCLUDED.avatar_url, \
             location        = EXCLUDED.location \
         RETURNING (xmax = 0) AS is_new",
    )
    .bind(target_id)
    .bind(&identity_keys)
    .bind(&raw_identities)
    .bind(&display_names)
    .bind(&bios)
    .bind(&verifieds)
    .bind(&followers_counts)
    .bind(&following_counts)
    .bind(&avatar_urls)
    .bind(&locations)
    .fetch_all(pool)
    .await?;

    let new_count = rows.iter().filter(|&&is_new| is_new).count() as u64;
    let refreshed_count = rows.len() as u64 - new_count;

    Ok((new_count, refreshed_count))
}

/// Flips the given identities to `unfollowed` and stamps `unfollowed_at`.
///
/// The only mutation path to `unfollowed` status; fed exclusively by the
/// diff's removed set. Identities already `unfollowed` are left untouched,
/// preserving their original `unfollowed_at` on replay.
///
/// Returns the number of rows actually flipped.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the update fails.
pub async fn mark_unfollowed(
    pool: &PgPool,
    target_id: i64,
    keys: &[String],
) -> Result<u64, sqlx::Error> {
    if keys.is_empty() {
        return Ok(0);
    }

    let rows_affected = sqlx::query(
        "UPDATE follower_records \
         SET status = 'unfollowed', unfollowed_at = NOW(), updated_at = NOW() \
         WHERE target_id = $1 \
           AND status = 'active' \
           AND identity_key = ANY($2::text[])",
    )
    .bind(target_id)
    .bind(keys)
    .execute(pool)
    .await?
    .rows_affected();

    Ok(rows_affected)
}

/// Returns up to `limit` unfollowed records, most recent unfollow first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_unfollowers(
    pool: &PgPool,
    target_id: i64,
    limit: i64,
) -> Result<Vec<FollowerRow>, DbError> {
    let rows = sqlx::query_as::<_, FollowerRow>(
        "SELECT id, target_id, identity_key, raw_identity, display_name, bio, \
                verified, followers_count, following_count, avatar_url, location, \
                status, first_seen_at, last_seen_at, unfollowed_at, \
                created_at, updated_at \
         FROM follower_records \
         WHERE target_id = $1 AND status = 'unfollowed' \
         ORDER BY unfollowed_at DESC, id DESC \
         LIMIT $2",
    )
    .bind(target_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
