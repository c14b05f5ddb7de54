//! Wire types for the extraction service's HTTP API.

use serde::Deserialize;

/// One follower profile as delivered by the extraction service.
///
/// Field names are camelCase on the wire. `identity` arrives raw — the
/// platform handle as scraped — and is normalized by [`crate::normalize`]
/// before it becomes a storage key.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawProfile {
    pub identity: String,
    pub display_name: String,
    pub bio: Option<String>,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub followers_count: i32,
    #[serde(default)]
    pub following_count: i32,
    pub avatar_url: Option<String>,
    pub location: Option<String>,
}

/// One page of followers. An empty `profiles` array is a valid page, not an
/// error; `next_cursor` is `null` on the last page.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowerPage {
    #[serde(default)]
    pub profiles: Vec<RawProfile>,
    pub next_cursor: Option<String>,
}

/// The tracked account's own profile metadata.
///
/// Fetched through a dedicated endpoint — the follower list never carries the
/// target's profile as an incidental first element.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetProfile {
    pub identity: String,
    pub display_name: String,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub followers_count: i32,
    #[serde(default)]
    pub following_count: i32,
    pub avatar_url: Option<String>,
}
