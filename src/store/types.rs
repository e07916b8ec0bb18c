//! Object store descriptor types
//!
//! Defines the remote object identity snapshot and the header parsing used
//! to build it from a metadata-only (HEAD) response.

use chrono::DateTime;
use serde::{Deserialize, Serialize};

/// Identity snapshot of a remote object.
///
/// `size` and `content_hash` together are the authoritative "unchanged"
/// signal for the cache layer. `modified_time` is informational only:
/// remote timestamp granularity is not trustworthy for equality checks.
///
/// This record is persisted verbatim as the cache sidecar, so the field
/// names and types here are the on-disk format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// Object size in bytes
    pub size: u64,
    /// Remote content-identity token (ETag with quotes stripped). Opaque:
    /// never compared against locally computed hashes.
    pub content_hash: String,
    /// Remote modification time, seconds since epoch
    pub modified_time: f64,
}

/// Strip the surrounding quotes an ETag header carries on the wire.
///
/// `"76a4deff-2"` and `W/"76a4deff-2"` both reduce to `76a4deff-2`.
pub fn normalize_etag(raw: &str) -> String {
    raw.trim_start_matches("W/").trim_matches('"').to_string()
}

/// Parse an HTTP `Last-Modified` header into epoch seconds.
///
/// Returns 0.0 when the header is missing or malformed; the value is
/// informational and must not block a fetch.
pub fn parse_http_date(raw: Option<&str>) -> f64 {
    raw.and_then(|s| DateTime::parse_from_rfc2822(s).ok())
        .map(|dt| dt.timestamp() as f64)
        .unwrap_or(0.0)
}
