//! Cache entry path mapping
//!
//! Derives the local path for a (bucket, key) pair. Pure and deterministic:
//! the same pair always maps to the same path, and separator characters in
//! either input can never escape the cache directory.

use std::path::{Path, PathBuf};

/// Local body path for a (bucket, key) pair.
///
/// Bucket and key are sanitized independently and joined with a double
/// underscore. A single separator sanitizes to a single `_`, so
/// `("a/b", "c")` → `a_b__c` and `("a", "b/c")` → `a__b_c` stay distinct.
pub fn entry_path(cache_dir: &Path, bucket: &str, key: &str) -> PathBuf {
    cache_dir.join(format!("{}__{}", sanitize(bucket), sanitize(key)))
}

/// Sidecar path for a cache entry: `<entry>.meta`.
///
/// Appended to the full file name rather than replacing the extension, so
/// `stocks__daily.parquet` pairs with `stocks__daily.parquet.meta`.
pub fn sidecar_path(entry: &Path) -> PathBuf {
    let mut name = entry.as_os_str().to_os_string();
    name.push(".meta");
    PathBuf::from(name)
}

/// Replace characters that would alter the containing directory
fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c => c,
        })
        .collect()
}
