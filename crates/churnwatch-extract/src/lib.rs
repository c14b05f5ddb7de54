pub mod client;
pub mod error;
pub mod ingest;
pub mod normalize;
mod retry;
pub mod types;

pub use client::ExtractionClient;
pub use error::ExtractError;
pub use ingest::{fold_pages, CandidateProfile, DeduplicatedSet, RejectedProfile};
pub use normalize::normalize_identity;
pub use types::{FollowerPage, RawProfile, TargetProfile};
