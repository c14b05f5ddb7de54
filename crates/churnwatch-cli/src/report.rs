//! Read-side report command handlers: scan runs and pattern buckets.

use churnwatch_engine::{classify, BehavioralProfile, EventKind, IdentityEvent};

/// Print recent scan runs, newest first, with coverage/trust status.
pub(crate) async fn run_runs(
    pool: &sqlx::PgPool,
    limit: i64,
    target_filter: Option<&str>,
) -> anyhow::Result<()> {
    let target_id = match target_filter {
        Some(handle) => {
            let canonical = handle.trim().trim_start_matches('@').to_lowercase();
            let target = churnwatch_db::get_target_by_handle(pool, &canonical)
                .await?
                .ok_or_else(|| anyhow::anyhow!("target '{canonical}' is not tracked"))?;
            Some(target.id)
        }
        None => None,
    };

    let runs = churnwatch_db::list_scan_runs(pool, target_id, limit).await?;

    if runs.is_empty() {
        println!("no scan runs recorded");
        return Ok(());
    }

    for run in &runs {
        let coverage = match (run.coverage_ratio, run.trusted) {
            (Some(ratio), Some(true)) => format!("{:.0}% trusted", ratio * 100.0),
            (Some(ratio), Some(false)) => {
                format!("{:.0}% — detection skipped", ratio * 100.0)
            }
            _ => "-".to_string(),
        };
        println!(
            "{}  {:<10} {:>6} extracted  {}  {}",
            run.created_at.format("%Y-%m-%d %H:%M"),
            run.status,
            run.extracted_count,
            coverage,
            run.error_message.as_deref().unwrap_or("")
        );
    }

    Ok(())
}

/// Print the behavioral pattern report for one target.
pub(crate) async fn run_patterns(
    pool: &sqlx::PgPool,
    config: &churnwatch_core::AppConfig,
    target_handle: &str,
) -> anyhow::Result<()> {
    let canonical = target_handle.trim().trim_start_matches('@').to_lowercase();
    let target = churnwatch_db::get_target_by_handle(pool, &canonical)
        .await?
        .ok_or_else(|| anyhow::anyhow!("target '{canonical}' is not tracked"))?;

    let rows = churnwatch_db::list_events_for_classification(pool, target.id).await?;
    let events: Vec<IdentityEvent> = rows
        .into_iter()
        .filter_map(|row| {
            EventKind::parse(&row.event_type).map(|kind| IdentityEvent {
                identity_key: row.identity_key,
                kind,
                occurred_at: row.occurred_at,
            })
        })
        .collect();

    let report = classify(&events, config.quick_unfollow_window_days);

    print_bucket("serial unfollowers", &report.serial_unfollowers);
    print_bucket(
        &format!(
            "quick unfollowers (within {} days)",
            config.quick_unfollow_window_days
        ),
        &report.quick_unfollowers,
    );
    print_bucket("loyal refollowers", &report.loyal_refollowers);

    Ok(())
}

fn print_bucket(label: &str, profiles: &[BehavioralProfile]) {
    println!("{label}: {}", profiles.len());
    for profile in profiles {
        let gap = profile
            .days_between_follow_and_unfollow
            .map_or(String::new(), |days| format!(", last cycle {days}d"));
        println!(
            "  {} ({} unfollows, {} refollows{gap})",
            profile.identity_key, profile.unfollow_count, profile.refollow_count
        );
    }
}
