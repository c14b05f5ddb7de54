//! Batch ingestor: folds raw extraction pages into a deduplicated candidate
//! set keyed by normalized identity.
//!
//! The fold is pure — no I/O, no persistence — so parallel page fetchers can
//! hand their output here in any order. For distinct identities the result is
//! order-independent; for repeat sightings of one identity the later-folded
//! occurrence's fields win, which callers accept because any complete
//! occurrence of a profile is equally current within one run.

use std::collections::HashMap;

use crate::normalize::{normalize_identity, source_form};
use crate::types::RawProfile;

/// One deduplicated follower candidate, ready for snapshot commit.
#[derive(Debug, Clone)]
pub struct CandidateProfile {
    pub identity_key: String,
    pub raw_identity: String,
    pub display_name: String,
    pub bio: Option<String>,
    pub verified: bool,
    pub followers_count: i32,
    pub following_count: i32,
    pub avatar_url: Option<String>,
    pub location: Option<String>,
}

/// A profile the fold refused to merge, kept for data-quality logging.
#[derive(Debug, Clone)]
pub struct RejectedProfile {
    pub raw_identity: String,
    pub reason: String,
}

/// Result of folding one run's pages.
#[derive(Debug, Default)]
pub struct DeduplicatedSet {
    profiles: HashMap<String, CandidateProfile>,
    rejected: Vec<RejectedProfile>,
}

impl DeduplicatedSet {
    #[must_use]
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    #[must_use]
    pub fn get(&self, identity_key: &str) -> Option<&CandidateProfile> {
        self.profiles.get(identity_key)
    }

    /// Normalized identity keys in the set.
    pub fn identity_keys(&self) -> impl Iterator<Item = &String> {
        self.profiles.keys()
    }

    pub fn profiles(&self) -> impl Iterator<Item = &CandidateProfile> {
        self.profiles.values()
    }

    #[must_use]
    pub fn rejected(&self) -> &[RejectedProfile] {
        &self.rejected
    }
}

/// Folds extraction pages into a [`DeduplicatedSet`].
///
/// Repeat sightings of the same source identity (extraction retries re-fetch
/// overlapping ranges) replace the previously folded fields. Two *different*
/// source identities whose normalized keys collide are a data-quality
/// problem: the identity seen later in fold order is rejected rather than
/// merged, so one follower can never absorb another's record.
pub fn fold_pages<P>(pages: P) -> DeduplicatedSet
where
    P: IntoIterator<Item = Vec<RawProfile>>,
{
    let mut set = DeduplicatedSet::default();

    for page in pages {
        for profile in page {
            fold_profile(&mut set, profile);
        }
    }

    set
}

fn fold_profile(set: &mut DeduplicatedSet, profile: RawProfile) {
    let identity_key = match normalize_identity(&profile.identity) {
        Ok(key) => key,
        Err(err) => {
            set.rejected.push(RejectedProfile {
                raw_identity: profile.identity,
                reason: err.to_string(),
            });
            return;
        }
    };

    let candidate = CandidateProfile {
        identity_key: identity_key.clone(),
        raw_identity: profile.identity,
        display_name: profile.display_name,
        bio: profile.bio,
        verified: profile.verified,
        followers_count: profile.followers_count,
        following_count: profile.following_count,
        avatar_url: profile.avatar_url,
        location: profile.location,
    };

    let collision = set.profiles.get(&identity_key).and_then(|existing| {
        (source_form(&existing.raw_identity) != source_form(&candidate.raw_identity))
            .then(|| existing.raw_identity.clone())
    });

    if let Some(existing_raw) = collision {
        set.rejected.push(RejectedProfile {
            reason: format!(
                "identity key '{identity_key}' collides with previously seen '{existing_raw}'"
            ),
            raw_identity: candidate.raw_identity,
        });
        return;
    }

    // First sighting, or the same account seen again — latest occurrence wins.
    set.profiles.insert(identity_key, candidate);
}
