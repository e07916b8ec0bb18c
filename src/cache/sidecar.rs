//! Metadata sidecar persistence
//!
//! Each cached body file pairs with a `<entry>.meta` JSON record holding the
//! remote descriptor from the download that produced the body. A sidecar
//! that is missing, unreadable, or unparsable reads as absent; the entry
//! then re-syncs on next access instead of being trusted.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tracing::{debug, warn};

use super::paths;
use crate::store::ObjectMeta;

/// Load the sidecar record for a cache entry.
///
/// Returns `None` for anything short of a well-formed record. Corruption is
/// logged and coerced to absent, never surfaced as an error.
pub fn load(entry: &Path) -> Option<ObjectMeta> {
    let path = paths::sidecar_path(entry);

    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Sidecar unreadable, treating entry as absent");
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(meta) => Some(meta),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Sidecar malformed, treating entry as absent");
            None
        }
    }
}

/// Write the sidecar record for a cache entry.
///
/// Written to a temp file in the same directory and persisted over the
/// final name, so a crash mid-write never leaves a truncated record that a
/// later load could half-parse.
pub fn save(entry: &Path, meta: &ObjectMeta) -> io::Result<()> {
    let path = paths::sidecar_path(entry);
    let parent = entry.parent().unwrap_or_else(|| Path::new("."));

    let encoded = serde_json::to_vec(meta).map_err(io::Error::other)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(&encoded)?;
    tmp.persist(&path).map_err(|e| e.error)?;

    debug!(path = %path.display(), size = meta.size, content_hash = %meta.content_hash, "Saved sidecar record");
    Ok(())
}

/// Remove the sidecar record, ignoring a missing file
pub fn remove(entry: &Path) {
    let path = paths::sidecar_path(entry);
    if let Err(e) = fs::remove_file(&path) {
        if e.kind() != io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove sidecar");
        }
    }
}
