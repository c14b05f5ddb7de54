//! Scan command handler.
//!
//! Per-target failures are logged and skipped rather than propagated so a
//! single bad target does not abort the full sweep.

use futures::stream::{self, StreamExt};

use churnwatch_engine::{RunError, RunOutcome, ScanSettings};
use churnwatch_extract::ExtractionClient;

/// Load the targets to scan.
///
/// If `target_filter` is `Some(handle)`, fetches that single target and
/// returns an error if it is not tracked. If `None`, returns all tracked
/// targets.
pub(crate) async fn load_targets_for_scan(
    pool: &sqlx::PgPool,
    target_filter: Option<&str>,
) -> anyhow::Result<Vec<churnwatch_db::TrackedTargetRow>> {
    match target_filter {
        Some(handle) => {
            let canonical = handle.trim().trim_start_matches('@').to_lowercase();
            let target = churnwatch_db::get_target_by_handle(pool, &canonical)
                .await?
                .ok_or_else(|| anyhow::anyhow!("target '{canonical}' is not tracked"))?;
            Ok(vec![target])
        }
        None => Ok(churnwatch_db::list_targets(pool).await?),
    }
}

/// Scan tracked targets for follower changes.
///
/// When `dry_run` is `true` the function prints what would be scanned and
/// returns without touching the database or the extraction service.
///
/// Targets are scanned with bounded concurrency
/// (`CHURNWATCH_EXTRACTOR_MAX_CONCURRENT_TARGETS`); each target's pipeline is
/// still serialized internally by its per-target lock.
///
/// # Errors
///
/// Returns an error if the target filter resolves to nothing or the
/// extraction client cannot be constructed. Per-target scan failures are
/// logged and skipped, not propagated.
pub(crate) async fn run_scan(
    pool: &sqlx::PgPool,
    config: &churnwatch_core::AppConfig,
    target_filter: Option<&str>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let targets = load_targets_for_scan(pool, target_filter).await?;

    if dry_run {
        let handles: Vec<&str> = targets.iter().map(|t| t.handle.as_str()).collect();
        println!(
            "dry-run: would scan {} targets: [{}]",
            targets.len(),
            handles.join(", ")
        );
        return Ok(());
    }

    let client = ExtractionClient::new(
        &config.extractor_base_url,
        config.extractor_api_key.as_deref(),
        config.extractor_request_timeout_secs,
        &config.extractor_user_agent,
        config.extractor_max_retries,
        config.extractor_retry_backoff_base_secs,
    )
    .map_err(|e| anyhow::anyhow!("failed to build extraction client: {e}"))?;

    let settings = ScanSettings {
        coverage_trust_threshold: config.coverage_trust_threshold,
        page_size: config.extractor_page_size,
        inter_request_delay_ms: config.extractor_inter_request_delay_ms,
    };

    let target_count = targets.len();
    let mut committed = 0usize;
    let mut skipped = 0usize;
    let mut failed = 0usize;

    let mut scans = stream::iter(targets.iter().map(|target| {
        let client = &client;
        async move {
            let outcome = scan_target(pool, client, settings, target).await;
            (target, outcome)
        }
    }))
    .buffer_unordered(config.extractor_max_concurrent_targets.max(1));

    while let Some((target, outcome)) = scans.next().await {
        match outcome {
            Ok(RunOutcome::Completed {
                coverage,
                unfollows,
                new_follows,
                refollows,
            }) => {
                committed += 1;
                println!(
                    "{}: committed (coverage {:.0}%) — {unfollows} unfollows, \
                     {new_follows} new follows, {refollows} refollows",
                    target.handle,
                    coverage.ratio * 100.0
                );
            }
            Ok(RunOutcome::UntrustedPartial { coverage }) => {
                skipped += 1;
                println!(
                    "{}: detection skipped — scan was only {:.0}% complete",
                    target.handle,
                    coverage.ratio * 100.0
                );
            }
            Err(e) => {
                failed += 1;
                eprintln!("error: scan failed for {}: {e}", target.handle);
            }
        }
    }

    println!(
        "scanned {target_count} targets: {committed} committed, {skipped} untrusted-partial, \
         {failed} failed"
    );

    Ok(())
}

/// Scan one target, logging its reported size beforehand for coverage
/// context. The profile fetch is best-effort; its failure does not block the
/// follower scan.
async fn scan_target(
    pool: &sqlx::PgPool,
    client: &ExtractionClient,
    settings: ScanSettings,
    target: &churnwatch_db::TrackedTargetRow,
) -> Result<RunOutcome, RunError> {
    match client.fetch_target_profile(&target.handle).await {
        Ok(profile) => {
            tracing::info!(
                target = %target.handle,
                reported_followers = profile.followers_count,
                "target profile fetched"
            );
        }
        Err(e) => {
            tracing::warn!(target = %target.handle, error = %e, "target profile fetch failed");
        }
    }

    churnwatch_engine::execute_scan(pool, client, settings, target, "cli").await
}
