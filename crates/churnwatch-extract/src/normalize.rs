//! Identity normalization.
//!
//! Raw identities from the extraction service are platform handles with
//! inconsistent casing, stray `@` prefixes, and decorative separator
//! characters at the edges. Storage keys must be stable across scrapes of the
//! same account, so everything that can vary between two sightings of one
//! account is folded away here.
//!
//! Normalization is deliberately lossy: `User_` and `user` produce the same
//! key. The ingest fold treats that as a collision between two distinct
//! source identities and rejects the later one — it never silently merges two
//! different followers onto one record.

use crate::error::ExtractError;

/// Characters stripped from the edges of an identity. These are valid inside
/// a handle but platforms treat edge occurrences as decoration.
const EDGE_SEPARATORS: &[char] = &['.', '_', '-'];

/// Normalizes a raw identity into its storage key form.
///
/// Steps: trim whitespace, drop any leading `@`, lowercase, strip separator
/// characters from both edges, then validate the remainder against the
/// handle charset (`a-z`, `0-9`, `.`, `_`, `-`).
///
/// # Errors
///
/// Returns [`ExtractError::InvalidIdentity`] if nothing remains after
/// stripping or the remainder contains unsupported characters.
pub fn normalize_identity(raw: &str) -> Result<String, ExtractError> {
    let key = raw
        .trim()
        .trim_start_matches('@')
        .to_lowercase()
        .trim_matches(EDGE_SEPARATORS)
        .to_string();

    if key.is_empty() {
        return Err(ExtractError::InvalidIdentity {
            raw_identity: raw.to_string(),
            reason: "empty after normalization".to_string(),
        });
    }

    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(ExtractError::InvalidIdentity {
            raw_identity: raw.to_string(),
            reason: "contains unsupported characters".to_string(),
        });
    }

    Ok(key)
}

/// The raw identity reduced to source-comparison form: trimmed, `@`-less,
/// lowercased — but with edge separators kept.
///
/// Two raw strings with the same source form are two sightings of one
/// account; the same *key* with different source forms is a collision.
pub(crate) fn source_form(raw: &str) -> String {
    raw.trim().trim_start_matches('@').to_lowercase()
}
