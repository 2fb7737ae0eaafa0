//! Shared helpers and constants.

use chrono::Utc;

pub fn now_utc_iso() -> String {
    Utc::now().to_rfc3339()
}

/// Deterministic key for an unordered participant pair. Both orderings of
/// the same two identifiers produce the same key, which is what the store's
/// uniqueness constraints on friendships and conversations hang off.
pub fn canonical_pair_key(a: &str, b: &str) -> String {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    format!("{lo}:{hi}")
}
