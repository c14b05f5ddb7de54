//! Background job scheduler.
//!
//! Initialises a [`JobScheduler`] at server startup and registers the
//! recurring scan job when `CHURNWATCH_SCAN_CRON` is configured.

use std::sync::Arc;

use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use churnwatch_engine::{RunError, RunOutcome, ScanSettings};
use churnwatch_extract::ExtractionClient;

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive for
/// the lifetime of the process — dropping it shuts down all scheduled jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised, the
/// job cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(
    pool: PgPool,
    config: Arc<churnwatch_core::AppConfig>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    if let Some(cron) = config.scan_cron.clone() {
        register_scan_job(&scheduler, &cron, pool, config).await?;
    } else {
        tracing::info!("CHURNWATCH_SCAN_CRON not set; scheduled scans disabled");
    }

    scheduler.start().await?;
    Ok(scheduler)
}

/// Register the recurring all-targets scan job.
async fn register_scan_job(
    scheduler: &JobScheduler,
    cron: &str,
    pool: PgPool,
    config: Arc<churnwatch_core::AppConfig>,
) -> Result<(), JobSchedulerError> {
    let pool = Arc::new(pool);

    let job = Job::new_async(cron, move |_uuid, _lock| {
        let pool = Arc::clone(&pool);
        let config = Arc::clone(&config);

        Box::pin(async move {
            tracing::info!("scheduler: starting scan run over all tracked targets");
            run_scan_job(&pool, &config).await;
            tracing::info!("scheduler: scan run complete");
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron = %cron, "scheduler: registered scan job");
    Ok(())
}

/// Drive one scan per tracked target. Per-target failures are logged and
/// skipped so a single bad target does not abort the sweep.
async fn run_scan_job(pool: &PgPool, config: &churnwatch_core::AppConfig) {
    let targets = match churnwatch_db::list_targets(pool).await {
        Ok(t) => t,
        Err(e) => {
            tracing::error!(error = %e, "scheduler: failed to load tracked targets");
            return;
        }
    };

    if targets.is_empty() {
        tracing::info!("scheduler: no tracked targets; skipping scan run");
        return;
    }

    let client = match ExtractionClient::new(
        &config.extractor_base_url,
        config.extractor_api_key.as_deref(),
        config.extractor_request_timeout_secs,
        &config.extractor_user_agent,
        config.extractor_max_retries,
        config.extractor_retry_backoff_base_secs,
    ) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "scheduler: failed to build extraction client");
            return;
        }
    };

    let settings = ScanSettings {
        coverage_trust_threshold: config.coverage_trust_threshold,
        page_size: config.extractor_page_size,
        inter_request_delay_ms: config.extractor_inter_request_delay_ms,
    };

    tracing::info!(count = targets.len(), "scheduler: scanning targets");

    for target in &targets {
        match churnwatch_engine::execute_scan(pool, &client, settings, target, "scheduler").await {
            Ok(RunOutcome::Completed {
                unfollows,
                new_follows,
                refollows,
                ..
            }) => {
                tracing::info!(
                    target = %target.handle,
                    unfollows,
                    new_follows,
                    refollows,
                    "scheduler: scan committed"
                );
            }
            Ok(RunOutcome::UntrustedPartial { coverage }) => {
                tracing::warn!(
                    target = %target.handle,
                    ratio = coverage.ratio,
                    "scheduler: scan completed but untrusted — diff skipped"
                );
            }
            Err(RunError::TargetBusy { .. }) => {
                tracing::warn!(
                    target = %target.handle,
                    "scheduler: scan skipped — another scan is in flight"
                );
            }
            Err(e) => {
                tracing::error!(target = %target.handle, error = %e, "scheduler: scan failed");
            }
        }
    }
}
