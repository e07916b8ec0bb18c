//! Staleness decision
//!
//! A cached entry is fresh only when the remote descriptor matches the
//! stored one on both `content_hash` and `size`. `modified_time` never
//! participates: remote clock and timestamp granularity are not trustworthy
//! for equality, so it rides along as informational data only.

use crate::store::ObjectMeta;

/// Decide whether a cache entry needs a refresh.
///
/// `local` is the sidecar record from the last successful sync, or `None`
/// when there has never been one (or it was unreadable).
pub fn is_stale(remote: &ObjectMeta, local: Option<&ObjectMeta>) -> bool {
    match local {
        None => true,
        Some(local) => {
            !(remote.content_hash == local.content_hash && remote.size == local.size)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(size: u64, hash: &str, modified: f64) -> ObjectMeta {
        ObjectMeta {
            size,
            content_hash: hash.to_string(),
            modified_time: modified,
        }
    }

    #[test]
    fn test_absent_is_stale() {
        assert!(is_stale(&meta(1000, "abc", 1.0), None));
    }

    #[test]
    fn test_matching_hash_and_size_is_fresh() {
        let remote = meta(1000, "abc", 2.0);
        let local = meta(1000, "abc", 1.0);
        assert!(!is_stale(&remote, Some(&local)));
    }

    #[test]
    fn test_modified_time_alone_never_forces_refresh() {
        // Same identity, wildly different timestamps: still fresh
        let remote = meta(1000, "abc", 9999999.0);
        let local = meta(1000, "abc", 1.0);
        assert!(!is_stale(&remote, Some(&local)));
    }

    #[test]
    fn test_hash_mismatch_is_stale() {
        let remote = meta(1000, "def", 1.0);
        let local = meta(1000, "abc", 1.0);
        assert!(is_stale(&remote, Some(&local)));
    }

    #[test]
    fn test_size_mismatch_is_stale() {
        // Same hash token but different size still forces a refresh
        let remote = meta(1200, "abc", 1.0);
        let local = meta(1000, "abc", 1.0);
        assert!(is_stale(&remote, Some(&local)));
    }
}
