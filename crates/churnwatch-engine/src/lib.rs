//! Follower snapshot change-detection engine.
//!
//! Pure decision logic (coverage gate, set diff, pattern classification) plus
//! the run pipeline that sequences gate → diff → snapshot commit → event
//! append against the database.

pub mod classify;
pub mod coverage;
pub mod diff;
pub mod error;
pub mod runner;

pub use classify::{classify, BehavioralProfile, EventKind, IdentityEvent, PatternReport};
pub use coverage::{evaluate, CoverageDecision};
pub use diff::{diff, DiffResult, SnapshotDiff};
pub use error::RunError;
pub use runner::{execute_scan, process_extracted, RunOutcome, ScanSettings};
