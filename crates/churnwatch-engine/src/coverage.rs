//! Coverage gate: decides whether a completed extraction is complete enough
//! for its diff to be trusted.
//!
//! A partial extraction (rate-limited early termination, mid-scan failure)
//! "loses" every follower past the point it stopped. Diffing against it would
//! manufacture mass false unfollow events, so runs below the threshold keep
//! their snapshot and ledger untouched. The threshold trades detection
//! latency for that protection and is a tunable, not a platform constant.

/// Outcome of evaluating one run's coverage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoverageDecision {
    pub trusted: bool,
    /// Extracted count over previously known active count (floored at 1).
    pub ratio: f64,
}

/// Evaluates extraction coverage against the previous active baseline.
///
/// `ratio = extracted_count / max(previous_active_count, 1)`; the run is
/// trusted when the ratio clears `trust_threshold`. A target with no
/// baseline (first-ever run) is always trusted — there is nothing a partial
/// scan could betray.
#[must_use]
pub fn evaluate(
    previous_active_count: usize,
    extracted_count: usize,
    trust_threshold: f64,
) -> CoverageDecision {
    #[allow(clippy::cast_precision_loss)]
    let ratio = extracted_count as f64 / previous_active_count.max(1) as f64;
    let trusted = previous_active_count == 0 || ratio >= trust_threshold;

    CoverageDecision { trusted, ratio }
}
