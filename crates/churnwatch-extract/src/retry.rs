//! Retry with exponential backoff for transient extraction-service errors.
//!
//! Non-retriable errors (404s, parse failures, unexpected statuses) are
//! propagated immediately without retrying.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::error::ExtractError;

/// Returns `true` if `err` represents a transient condition that should be
/// retried after a backoff delay.
///
/// Retriable errors:
/// - [`ExtractError::RateLimited`] — HTTP 429; the service has asked us to back off.
/// - [`ExtractError::Http`] — network-level failure (connection reset, timeout, etc.).
fn is_retriable(err: &ExtractError) -> bool {
    matches!(
        err,
        ExtractError::RateLimited { .. } | ExtractError::Http(_)
    )
}

/// Executes `operation` with exponential backoff retries on transient errors.
///
/// On a retriable error the function sleeps for `backoff_base_secs *
/// 2^attempt` seconds plus up to one second of random jitter, then tries
/// again, up to `max_retries` additional attempts after the first try. If all
/// retries are exhausted the last error is returned. Non-retriable errors are
/// returned immediately.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_secs: u64,
    mut operation: F,
) -> Result<T, ExtractError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ExtractError>>,
{
    let mut last_err;
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                last_err = err;
            }
        }

        // Exponential backoff: base * 2^attempt seconds, capped to avoid
        // overflow on extreme configs, plus jitter so that concurrent target
        // scans don't retry in lockstep.
        let delay_secs = backoff_base_secs.saturating_mul(1u64 << attempt.min(62));
        let jitter_ms = rand::rng().random_range(0..1000);
        tracing::warn!(
            attempt,
            max_retries,
            delay_secs,
            error = %last_err,
            "transient extraction error — retrying after backoff"
        );
        tokio::time::sleep(Duration::from_secs(delay_secs) + Duration::from_millis(jitter_ms))
            .await;
        attempt += 1;
    }
}
