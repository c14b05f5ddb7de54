//! Behavioral pattern classification over the change-event ledger.
//!
//! A read-side projection: the ledger is the system of record and this module
//! never writes back, so reports can be rebuilt from scratch at any time and
//! a classification bug cannot corrupt ground truth.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Typed view of `change_events.event_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Unfollow,
    NewFollow,
    Refollow,
}

impl EventKind {
    /// Parses the ledger's string representation. Unknown strings return
    /// `None` and are skipped by the classifier rather than failing a whole
    /// report.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unfollow" => Some(Self::Unfollow),
            "new_follow" => Some(Self::NewFollow),
            "refollow" => Some(Self::Refollow),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unfollow => "unfollow",
            Self::NewFollow => "new_follow",
            Self::Refollow => "refollow",
        }
    }
}

/// One ledger event reduced to what classification needs.
#[derive(Debug, Clone)]
pub struct IdentityEvent {
    pub identity_key: String,
    pub kind: EventKind,
    pub occurred_at: DateTime<Utc>,
}

/// Per-identity counters derived from the ledger. Never stored.
#[derive(Debug, Clone, Serialize)]
pub struct BehavioralProfile {
    pub identity_key: String,
    pub unfollow_count: u32,
    pub refollow_count: u32,
    /// Day gap of the most recent follow→unfollow pair, when both sides of
    /// the pair appear in the ledger.
    pub days_between_follow_and_unfollow: Option<i64>,
}

/// The three behavioral buckets consumed by reporting.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PatternReport {
    /// Unfollowed at least twice — implies at least one refollow in between.
    pub serial_unfollowers: Vec<BehavioralProfile>,
    /// Most recent unfollow landed within the configured window of the
    /// follow that preceded it.
    pub quick_unfollowers: Vec<BehavioralProfile>,
    /// Came back at least once and stayed.
    pub loyal_refollowers: Vec<BehavioralProfile>,
}

/// Classifies a target's event log into behavioral buckets.
///
/// Events may arrive in any order; each identity's history is replayed in
/// ascending `occurred_at` order. An identity can land in more than one
/// bucket (a serial unfollower whose latest cycle was quick is both serial
/// and quick). Bucket contents are sorted by identity key so reports are
/// stable across rebuilds.
#[must_use]
pub fn classify(events: &[IdentityEvent], quick_unfollow_window_days: i64) -> PatternReport {
    use std::collections::HashMap;

    let mut by_identity: HashMap<&str, Vec<&IdentityEvent>> = HashMap::new();
    for event in events {
        by_identity
            .entry(event.identity_key.as_str())
            .or_default()
            .push(event);
    }

    let mut report = PatternReport::default();

    for (identity_key, mut history) in by_identity {
        history.sort_by_key(|e| e.occurred_at);

        let mut unfollow_count = 0u32;
        let mut refollow_count = 0u32;
        let mut last_follow: Option<DateTime<Utc>> = None;
        let mut last_refollow: Option<DateTime<Utc>> = None;
        let mut last_unfollow: Option<DateTime<Utc>> = None;
        let mut most_recent_gap_days: Option<i64> = None;

        for event in history {
            match event.kind {
                EventKind::NewFollow => {
                    last_follow = Some(event.occurred_at);
                }
                EventKind::Refollow => {
                    refollow_count += 1;
                    last_follow = Some(event.occurred_at);
                    last_refollow = Some(event.occurred_at);
                }
                EventKind::Unfollow => {
                    unfollow_count += 1;
                    last_unfollow = Some(event.occurred_at);
                    most_recent_gap_days =
                        last_follow.map(|followed| (event.occurred_at - followed).num_days());
                }
            }
        }

        let profile = BehavioralProfile {
            identity_key: identity_key.to_string(),
            unfollow_count,
            refollow_count,
            days_between_follow_and_unfollow: most_recent_gap_days,
        };

        if unfollow_count >= 2 {
            report.serial_unfollowers.push(profile.clone());
        }

        if unfollow_count >= 1
            && most_recent_gap_days.is_some_and(|days| days <= quick_unfollow_window_days)
        {
            report.quick_unfollowers.push(profile.clone());
        }

        let stayed = match (last_refollow, last_unfollow) {
            (Some(refollowed), Some(unfollowed)) => unfollowed < refollowed,
            (Some(_), None) => true,
            _ => false,
        };
        if refollow_count >= 1 && stayed {
            report.loyal_refollowers.push(profile);
        }
    }

    report
        .serial_unfollowers
        .sort_by(|a, b| a.identity_key.cmp(&b.identity_key));
    report
        .quick_unfollowers
        .sort_by(|a, b| a.identity_key.cmp(&b.identity_key));
    report
        .loyal_refollowers
        .sort_by(|a, b| a.identity_key.cmp(&b.identity_key));

    report
}
