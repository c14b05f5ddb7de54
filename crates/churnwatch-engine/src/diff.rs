//! Set diff between the previous active snapshot and the current extraction.

use std::collections::HashSet;

/// Identity movements detected by one trusted run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotDiff {
    /// Active before, absent now — unfollow candidates.
    pub removed: HashSet<String>,
    /// Present now, never seen before — new follows.
    pub added: HashSet<String>,
    /// Present now, previously recorded as unfollowed — refollows.
    pub readded: HashSet<String>,
}

/// Result of a diff attempt.
///
/// `Skipped` is not the same as an empty diff: callers must be able to tell
/// "changes were not evaluated" apart from "no changes occurred".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffResult {
    Skipped,
    Computed(SnapshotDiff),
}

/// Computes the diff between the previous active set and the current
/// extraction, honoring the coverage gate's decision.
///
/// `previously_unfollowed` is the storage-history lookup for the candidate
/// additions: membership there turns an addition into a re-add (refollow
/// rather than new follow). Set membership in the two live snapshots alone
/// cannot make that distinction.
#[must_use]
pub fn diff(
    previous_active: &HashSet<String>,
    current: &HashSet<String>,
    previously_unfollowed: &HashSet<String>,
    trusted: bool,
) -> DiffResult {
    if !trusted {
        return DiffResult::Skipped;
    }

    let removed: HashSet<String> = previous_active.difference(current).cloned().collect();

    let mut added = HashSet::new();
    let mut readded = HashSet::new();
    for key in current.difference(previous_active) {
        if previously_unfollowed.contains(key) {
            readded.insert(key.clone());
        } else {
            added.insert(key.clone());
        }
    }

    DiffResult::Computed(SnapshotDiff {
        removed,
        added,
        readded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(keys: &[&str]) -> HashSet<String> {
        keys.iter().map(|k| (*k).to_string()).collect()
    }

    #[test]
    fn untrusted_run_is_skipped_not_empty() {
        let result = diff(&set(&["a", "b"]), &set(&["a"]), &set(&[]), false);
        assert_eq!(result, DiffResult::Skipped);
        assert_ne!(result, DiffResult::Computed(SnapshotDiff::default()));
    }

    #[test]
    fn removal_and_addition_in_one_run() {
        let previous = set(&["a", "b", "c"]);
        let current = set(&["b", "c", "d"]);

        let DiffResult::Computed(diff) = diff(&previous, &current, &set(&[]), true) else {
            panic!("trusted diff must be computed");
        };

        assert_eq!(diff.removed, set(&["a"]));
        assert_eq!(diff.added, set(&["d"]));
        assert!(diff.readded.is_empty());
    }

    #[test]
    fn readded_identity_is_split_from_new_follows() {
        let previous = set(&["b"]);
        let current = set(&["a", "b", "d"]);
        // "a" unfollowed at some point in the past; "d" has never been seen.
        let history = set(&["a"]);

        let DiffResult::Computed(diff) = diff(&previous, &current, &history, true) else {
            panic!("trusted diff must be computed");
        };

        assert_eq!(diff.readded, set(&["a"]));
        assert_eq!(diff.added, set(&["d"]));
        assert!(diff.removed.is_empty());
    }

    #[test]
    fn union_law_every_identity_accounted_for() {
        let previous = set(&["a", "b", "c", "e"]);
        let current = set(&["b", "c", "d", "f"]);
        let history = set(&["f"]);

        let DiffResult::Computed(diff) = diff(&previous, &current, &history, true) else {
            panic!("trusted diff must be computed");
        };

        // previous ∪ (added ∪ readded) == current ∪ removed
        let mut lhs = previous.clone();
        lhs.extend(diff.added.iter().cloned());
        lhs.extend(diff.readded.iter().cloned());
        let mut rhs = current.clone();
        rhs.extend(diff.removed.iter().cloned());
        assert_eq!(lhs, rhs);
    }

    #[test]
    fn identical_sets_diff_to_empty() {
        let previous = set(&["a", "b"]);
        let current = set(&["a", "b"]);

        let DiffResult::Computed(diff) = diff(&previous, &current, &set(&[]), true) else {
            panic!("trusted diff must be computed");
        };

        assert!(diff.removed.is_empty());
        assert!(diff.added.is_empty());
        assert!(diff.readded.is_empty());
    }

    #[test]
    fn first_run_everything_is_added() {
        let previous = set(&[]);
        let current = set(&["a", "b"]);

        let DiffResult::Computed(diff) = diff(&previous, &current, &set(&[]), true) else {
            panic!("trusted diff must be computed");
        };

        assert_eq!(diff.added, set(&["a", "b"]));
        assert!(diff.removed.is_empty());
        assert!(diff.readded.is_empty());
    }
}
