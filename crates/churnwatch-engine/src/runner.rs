//! Run pipeline: one scan from extraction to committed diff.
//!
//! Ordering is load-bearing. The baseline is read before any write; the
//! snapshot commit lands before the event append; the target's
//! last-completed-run pointer moves only after both. A crash between commit
//! and append is recovered by simply scanning again: the re-diff against the
//! already-updated snapshot is empty and the ledger's idempotent append
//! absorbs anything replayed.

use std::collections::HashSet;

use chrono::Utc;
use sqlx::{Connection, PgPool};

use churnwatch_db::{
    DbError, NewChangeEvent, NewFollowerRecord, ScanRunRow, TrackedTargetRow,
};
use churnwatch_extract::{CandidateProfile, DeduplicatedSet, ExtractionClient, RawProfile};

use crate::coverage::{self, CoverageDecision};
use crate::diff::{self, DiffResult};
use crate::error::RunError;

/// Scan-time knobs threaded in from `AppConfig`.
#[derive(Debug, Clone, Copy)]
pub struct ScanSettings {
    pub coverage_trust_threshold: f64,
    pub page_size: u32,
    pub inter_request_delay_ms: u64,
}

/// How one scan ended, for callers that need to surface run quality.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RunOutcome {
    /// Trusted run: diff committed, ledger appended.
    Completed {
        coverage: CoverageDecision,
        unfollows: usize,
        new_follows: usize,
        refollows: usize,
    },
    /// Extraction finished but coverage fell below the threshold; change
    /// detection was skipped for this run. Distinct from "no changes".
    UntrustedPartial { coverage: CoverageDecision },
}

/// Runs one full scan for a target: run bookkeeping, per-target lock,
/// extraction, and the diff pipeline.
///
/// The per-target advisory lock is held for the entire scan; a concurrent
/// scan for the same target fails fast with [`RunError::TargetBusy`] and its
/// run row is marked failed with that reason.
///
/// # Errors
///
/// Returns [`RunError`] when the lock is contended, extraction fails, the
/// fold produces zero profiles, or any storage operation fails. In the first
/// three cases the scan run has already been marked `failed`.
pub async fn execute_scan(
    pool: &PgPool,
    client: &ExtractionClient,
    settings: ScanSettings,
    target: &TrackedTargetRow,
    trigger_source: &str,
) -> Result<RunOutcome, RunError> {
    let run = churnwatch_db::create_scan_run(pool, target.id, trigger_source).await?;

    let mut lock_conn = pool.acquire().await.map_err(DbError::from)?;
    if !churnwatch_db::try_target_lock(&mut lock_conn, target.id)
        .await
        .map_err(DbError::from)?
    {
        churnwatch_db::fail_scan_run(pool, run.id, "another scan is already in flight").await?;
        return Err(RunError::TargetBusy {
            target_id: target.id,
        });
    }

    let result = scan_locked(pool, client, settings, target, &run).await;

    // Session locks survive the connection's return to the pool, so a failed
    // release must close the connection rather than recycle it.
    match churnwatch_db::release_target_lock(&mut lock_conn, target.id).await {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!(target_id = target.id, "target lock was not held at release");
        }
        Err(e) => {
            tracing::warn!(
                target_id = target.id,
                error = %e,
                "failed to release target lock; closing the holding connection"
            );
            let _ = lock_conn.detach().close().await;
        }
    }

    result
}

async fn scan_locked(
    pool: &PgPool,
    client: &ExtractionClient,
    settings: ScanSettings,
    target: &TrackedTargetRow,
    run: &ScanRunRow,
) -> Result<RunOutcome, RunError> {
    churnwatch_db::start_extraction(pool, run.id).await?;

    let pages = match client
        .fetch_all_follower_pages(&target.handle, settings.page_size, settings.inter_request_delay_ms)
        .await
    {
        Ok(pages) => pages,
        Err(e) => {
            churnwatch_db::fail_scan_run(pool, run.id, &e.to_string()).await?;
            return Err(RunError::Extract(e));
        }
    };

    process_extracted(pool, target, run, pages, settings.coverage_trust_threshold).await
}

/// The diff pipeline for an already-extracted run: fold → gate → diff →
/// snapshot commit → event append → run completion.
///
/// Exposed separately from [`execute_scan`] so the pipeline can be driven
/// with synthetic pages in tests and by any future push-style ingestion.
/// Expects the run to be in `extracting` status and the caller to hold the
/// per-target lock.
///
/// # Errors
///
/// Returns [`RunError::EmptyExtraction`] (after marking the run failed) when
/// the fold yields zero profiles, or [`RunError::Db`] if storage fails.
pub async fn process_extracted(
    pool: &PgPool,
    target: &TrackedTargetRow,
    run: &ScanRunRow,
    pages: Vec<Vec<RawProfile>>,
    coverage_trust_threshold: f64,
) -> Result<RunOutcome, RunError> {
    let folded = churnwatch_extract::fold_pages(pages);

    for rejected in folded.rejected() {
        tracing::warn!(
            target = %target.handle,
            raw_identity = %rejected.raw_identity,
            reason = %rejected.reason,
            "rejected extracted profile"
        );
    }

    if folded.is_empty() {
        churnwatch_db::fail_scan_run(pool, run.id, "extraction returned no profiles").await?;
        return Err(RunError::EmptyExtraction {
            target_id: target.id,
        });
    }

    // Baseline must be read before any write for this run.
    let previous: HashSet<String> = churnwatch_db::list_active_identities(pool, target.id)
        .await?
        .into_iter()
        .collect();

    let extracted_count = folded.len();
    let decision = coverage::evaluate(previous.len(), extracted_count, coverage_trust_threshold);

    let current: HashSet<String> = folded.identity_keys().cloned().collect();
    let additions: Vec<String> = current.difference(&previous).cloned().collect();
    let previously_unfollowed: HashSet<String> =
        churnwatch_db::list_unfollowed_identities(pool, target.id, &additions)
            .await?
            .into_iter()
            .collect();

    let snapshot_diff = match diff::diff(&previous, &current, &previously_unfollowed, decision.trusted) {
        DiffResult::Skipped => {
            churnwatch_db::complete_scan_run(
                pool,
                run.id,
                count_to_i32(extracted_count),
                decision.ratio,
                false,
            )
            .await?;
            tracing::warn!(
                target = %target.handle,
                run_id = %run.public_id,
                ratio = decision.ratio,
                "coverage below threshold — diff skipped for this run"
            );
            return Ok(RunOutcome::UntrustedPartial { coverage: decision });
        }
        DiffResult::Computed(diff) => diff,
    };

    // Freeze display fields for unfollow events before the snapshot commit
    // deactivates those rows.
    let removed_keys: Vec<String> = snapshot_diff.removed.iter().cloned().collect();
    let removed_rows = churnwatch_db::get_followers_by_keys(pool, target.id, &removed_keys).await?;

    // Snapshot commit first...
    let records: Vec<NewFollowerRecord> = folded.profiles().map(to_record).collect();
    let (new_count, refreshed_count) = churnwatch_db::upsert_followers(pool, target.id, &records)
        .await
        .map_err(DbError::from)?;
    churnwatch_db::mark_unfollowed(pool, target.id, &removed_keys)
        .await
        .map_err(DbError::from)?;

    // ...then the ledger append.
    let occurred_at = Utc::now();
    let mut events: Vec<NewChangeEvent> =
        Vec::with_capacity(removed_rows.len() + snapshot_diff.added.len() + snapshot_diff.readded.len());

    for row in &removed_rows {
        events.push(NewChangeEvent {
            identity_key: row.identity_key.clone(),
            event_type: "unfollow".to_string(),
            display_name: row.display_name.clone(),
            verified: row.verified,
            followers_count: row.followers_count,
            following_count: row.following_count,
            occurred_at,
        });
    }
    push_candidate_events(&mut events, &folded, &snapshot_diff.added, "new_follow", occurred_at);
    push_candidate_events(&mut events, &folded, &snapshot_diff.readded, "refollow", occurred_at);

    let appended = churnwatch_db::append_change_events(pool, run.id, target.id, &events)
        .await
        .map_err(DbError::from)?;

    churnwatch_db::complete_scan_run(
        pool,
        run.id,
        count_to_i32(extracted_count),
        decision.ratio,
        true,
    )
    .await?;
    churnwatch_db::set_last_completed_run(pool, target.id, run.id).await?;

    tracing::info!(
        target = %target.handle,
        run_id = %run.public_id,
        extracted = extracted_count,
        new = new_count,
        refreshed = refreshed_count,
        unfollows = snapshot_diff.removed.len(),
        new_follows = snapshot_diff.added.len(),
        refollows = snapshot_diff.readded.len(),
        appended,
        ratio = decision.ratio,
        "scan committed"
    );

    Ok(RunOutcome::Completed {
        coverage: decision,
        unfollows: snapshot_diff.removed.len(),
        new_follows: snapshot_diff.added.len(),
        refollows: snapshot_diff.readded.len(),
    })
}

fn push_candidate_events(
    events: &mut Vec<NewChangeEvent>,
    folded: &DeduplicatedSet,
    keys: &HashSet<String>,
    event_type: &str,
    occurred_at: chrono::DateTime<Utc>,
) {
    for key in keys {
        // Diff additions are drawn from the folded set, so the lookup holds.
        let Some(profile) = folded.get(key) else {
            tracing::error!(identity_key = %key, "diff addition missing from folded set");
            continue;
        };
        events.push(NewChangeEvent {
            identity_key: profile.identity_key.clone(),
            event_type: event_type.to_string(),
            display_name: Some(profile.display_name.clone()),
            verified: profile.verified,
            followers_count: profile.followers_count,
            following_count: profile.following_count,
            occurred_at,
        });
    }
}

fn to_record(profile: &CandidateProfile) -> NewFollowerRecord {
    NewFollowerRecord {
        identity_key: profile.identity_key.clone(),
        raw_identity: profile.raw_identity.clone(),
        display_name: Some(profile.display_name.clone()),
        bio: profile.bio.clone(),
        verified: profile.verified,
        followers_count: profile.followers_count,
        following_count: profile.following_count,
        avatar_url: profile.avatar_url.clone(),
        location: profile.location.clone(),
    }
}

fn count_to_i32(count: usize) -> i32 {
    i32::try_from(count).unwrap_or(i32::MAX)
}
