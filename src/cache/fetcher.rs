//! Synced fetcher
//!
//! Orchestrates the cache-consistency subsystem: given (bucket, key), return
//! the object's bytes from the local cache when it is verifiably current,
//! and download + record fresh metadata when it is not.
//!
//! The body file and its sidecar are a pair: they are only ever updated
//! together, and any partial failure leaves the entry reading as absent on
//! the next access rather than as fresh.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tokio::sync::Mutex as EntryLock;
use tracing::{debug, info, warn};

use super::{paths, sidecar, staleness};
use crate::store::{ObjectStore, StoreError};

/// Fetch failure taxonomy.
///
/// Every variant carries the (bucket, key) pair so the caller can log or
/// display it without re-deriving context.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Store unreachable (network, auth, permission, server failure).
    /// Recoverable: retry later, or a previous call may have served the
    /// stale local copy instead of raising this.
    #[error("Store unavailable for {bucket}/{key}: {source}")]
    RemoteUnavailable {
        bucket: String,
        key: String,
        #[source]
        source: StoreError,
    },

    /// The object does not exist remotely. Fatal for the call; the local
    /// cache entry is left untouched.
    #[error("Remote object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    /// Local write failed mid-transfer. No partial file survives.
    #[error("Download failed for {bucket}/{key}: {source}")]
    DownloadFailed {
        bucket: String,
        key: String,
        #[source]
        source: io::Error,
    },
}

/// How the returned bytes were obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSource {
    /// Local copy verified unchanged against the remote descriptor
    CacheHit,
    /// Body downloaded during this call
    Downloaded,
    /// Store unreachable; existing local copy served without a freshness
    /// check. This is the caller-visible warning condition.
    StaleFallback,
}

/// A successfully served cache entry
#[derive(Debug)]
pub struct Fetched {
    /// Local body path
    pub path: PathBuf,
    /// Body bytes
    pub bytes: Vec<u8>,
    /// How the bytes were obtained
    pub source: FetchSource,
}

impl Fetched {
    /// True when freshness could not be verified (degraded serving)
    pub fn served_stale(&self) -> bool {
        self.source == FetchSource::StaleFallback
    }
}

/// Cache-synchronizing fetcher over an object store
pub struct SyncedFetcher<S> {
    /// Remote store the cache mirrors
    store: S,
    /// Root directory for cached bodies and sidecars
    cache_dir: PathBuf,
    /// Per-entry locks so at most one download proceeds per local path
    locks: Mutex<HashMap<PathBuf, Arc<EntryLock<()>>>>,
}

impl<S: ObjectStore> SyncedFetcher<S> {
    /// Create a fetcher rooted at `cache_dir`, creating the directory if
    /// absent
    pub fn new(store: S, cache_dir: impl Into<PathBuf>) -> Result<Self> {
        let cache_dir = cache_dir.into();
        fs::create_dir_all(&cache_dir)
            .with_context(|| format!("Failed to create cache directory: {:?}", cache_dir))?;

        info!(cache_dir = %cache_dir.display(), "Object cache initialized");

        Ok(Self {
            store,
            cache_dir,
            locks: Mutex::new(HashMap::new()),
        })
    }

    /// Root directory of the cache
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Local body path for a (bucket, key) pair
    pub fn entry_path(&self, bucket: &str, key: &str) -> PathBuf {
        paths::entry_path(&self.cache_dir, bucket, key)
    }

    /// Last synced descriptor for a (bucket, key) pair, if any
    pub fn stored_meta(&self, bucket: &str, key: &str) -> Option<crate::store::ObjectMeta> {
        sidecar::load(&self.entry_path(bucket, key))
    }

    fn entry_lock(&self, path: &Path) -> Arc<EntryLock<()>> {
        let mut locks = self.locks.lock().unwrap();
        locks.entry(path.to_path_buf()).or_default().clone()
    }

    /// Fetch an object, downloading only when required.
    ///
    /// * `force_refresh` - skip the staleness check and always download
    ///
    /// With `force_refresh` false and a body on disk, the remote descriptor
    /// decides: unchanged hash+size serves the local copy as-is, and an
    /// unreachable store degrades to serving the local copy with
    /// `FetchSource::StaleFallback`. Everything else downloads.
    pub async fn fetch(
        &self,
        bucket: &str,
        key: &str,
        force_refresh: bool,
    ) -> Result<Fetched, FetchError> {
        let path = self.entry_path(bucket, key);
        let lock = self.entry_lock(&path);
        let _guard = lock.lock().await;

        if !force_refresh && path.exists() {
            match self.store.head(bucket, key).await {
                Ok(remote) => {
                    let local = sidecar::load(&path);
                    if !staleness::is_stale(&remote, local.as_ref()) {
                        match fs::read(&path) {
                            Ok(bytes) => {
                                debug!(bucket = bucket, key = key, "Cache HIT");
                                return Ok(Fetched {
                                    path,
                                    bytes,
                                    source: FetchSource::CacheHit,
                                });
                            }
                            Err(e) => {
                                warn!(
                                    path = %path.display(),
                                    error = %e,
                                    "Cached body unreadable, re-downloading"
                                );
                            }
                        }
                    } else {
                        debug!(bucket = bucket, key = key, "Cache entry stale");
                    }
                }
                Err(e) if e.is_not_found() => {
                    // Gone remotely: fatal for this call, cache untouched
                    return Err(FetchError::NotFound {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    });
                }
                Err(e) => {
                    // Availability over freshness: serve what we have
                    match fs::read(&path) {
                        Ok(bytes) => {
                            warn!(
                                bucket = bucket,
                                key = key,
                                error = %e,
                                "Store unreachable, serving cached copy without freshness check"
                            );
                            return Ok(Fetched {
                                path,
                                bytes,
                                source: FetchSource::StaleFallback,
                            });
                        }
                        Err(read_err) => {
                            warn!(
                                path = %path.display(),
                                error = %read_err,
                                "Store unreachable and cached body unreadable"
                            );
                            return Err(FetchError::RemoteUnavailable {
                                bucket: bucket.to_string(),
                                key: key.to_string(),
                                source: e,
                            });
                        }
                    }
                }
            }
        }

        self.download(bucket, key, path).await
    }

    /// Download the body and record its descriptor.
    ///
    /// The persisted descriptor comes from the HEAD issued here, in the same
    /// remote exchange as the body download, never from the earlier
    /// staleness snapshot, which may race with a remote update.
    async fn download(&self, bucket: &str, key: &str, path: PathBuf) -> Result<Fetched, FetchError> {
        debug!(bucket = bucket, key = key, "Cache MISS, downloading");

        let descriptor = self
            .store
            .head(bucket, key)
            .await
            .map_err(|e| store_error(bucket, key, e))?;

        let bytes = self
            .store
            .get(bucket, key)
            .await
            .map_err(|e| store_error(bucket, key, e))?;

        write_atomic(&path, &bytes).map_err(|e| FetchError::DownloadFailed {
            bucket: bucket.to_string(),
            key: key.to_string(),
            source: e,
        })?;

        // Pairing invariant: a failed sidecar write leaves the entry reading
        // as absent next time, which re-downloads. Not fatal now.
        if let Err(e) = sidecar::save(&path, &descriptor) {
            warn!(
                bucket = bucket,
                key = key,
                error = %e,
                "Metadata write failed; entry will re-sync on next access"
            );
        }

        info!(
            bucket = bucket,
            key = key,
            size = descriptor.size,
            content_hash = %descriptor.content_hash,
            "Synced object into cache"
        );

        Ok(Fetched {
            path,
            bytes,
            source: FetchSource::Downloaded,
        })
    }

    /// Evict a cache entry: body and sidecar are removed together
    pub fn evict(&self, bucket: &str, key: &str) {
        let path = self.entry_path(bucket, key);
        if let Err(e) = fs::remove_file(&path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "Failed to remove cached body");
            }
        }
        sidecar::remove(&path);
        debug!(bucket = bucket, key = key, "Evicted cache entry");
    }
}

fn store_error(bucket: &str, key: &str, source: StoreError) -> FetchError {
    if source.is_not_found() {
        FetchError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    } else {
        FetchError::RemoteUnavailable {
            bucket: bucket.to_string(),
            key: key.to_string(),
            source,
        }
    }
}

/// Write `data` to `path` via a temp file in the same directory.
///
/// A failure at any point drops the temp file; `path` is either the old
/// content or the new content, never a partial write.
fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ObjectMeta;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::TempDir;

    const BUCKET: &str = "stocks";
    const KEY: &str = "daily/ohlcv.parquet";

    /// In-memory store: one object, switchable identity and availability
    #[derive(Default)]
    struct MockStore {
        /// Current remote object, or None for NotFound
        remote: Mutex<Option<(ObjectMeta, Vec<u8>)>>,
        /// When true, every call fails with a network error
        unavailable: Mutex<bool>,
        head_calls: AtomicU32,
        get_calls: AtomicU32,
    }

    impl MockStore {
        fn serving(meta: ObjectMeta, body: &[u8]) -> Self {
            let store = Self::default();
            store.set_remote(Some((meta, body.to_vec())));
            store
        }

        fn set_remote(&self, remote: Option<(ObjectMeta, Vec<u8>)>) {
            *self.remote.lock().unwrap() = remote;
        }

        fn set_unavailable(&self, down: bool) {
            *self.unavailable.lock().unwrap() = down;
        }

        fn head_count(&self) -> u32 {
            self.head_calls.load(Ordering::Relaxed)
        }

        fn get_count(&self) -> u32 {
            self.get_calls.load(Ordering::Relaxed)
        }
    }

    #[async_trait]
    impl ObjectStore for Arc<MockStore> {
        async fn head(&self, _bucket: &str, _key: &str) -> Result<ObjectMeta, StoreError> {
            self.head_calls.fetch_add(1, Ordering::Relaxed);
            if *self.unavailable.lock().unwrap() {
                return Err(StoreError::Network("connection refused".to_string()));
            }
            match &*self.remote.lock().unwrap() {
                Some((meta, _)) => Ok(meta.clone()),
                None => Err(StoreError::NotFound("no such key".to_string())),
            }
        }

        async fn get(&self, _bucket: &str, _key: &str) -> Result<Vec<u8>, StoreError> {
            self.get_calls.fetch_add(1, Ordering::Relaxed);
            if *self.unavailable.lock().unwrap() {
                return Err(StoreError::Network("connection refused".to_string()));
            }
            match &*self.remote.lock().unwrap() {
                Some((_, body)) => Ok(body.clone()),
                None => Err(StoreError::NotFound("no such key".to_string())),
            }
        }
    }

    fn meta(size: u64, hash: &str) -> ObjectMeta {
        ObjectMeta {
            size,
            content_hash: hash.to_string(),
            modified_time: 1750911842.0,
        }
    }

    fn fetcher(store: &Arc<MockStore>) -> (SyncedFetcher<Arc<MockStore>>, TempDir) {
        let dir = TempDir::new().unwrap();
        let fetcher = SyncedFetcher::new(Arc::clone(store), dir.path()).unwrap();
        (fetcher, dir)
    }

    #[tokio::test]
    async fn test_first_fetch_downloads_then_hits() {
        let store = Arc::new(MockStore::serving(meta(4, "abc"), b"data"));
        let (fetcher, _dir) = fetcher(&store);

        let first = fetcher.fetch(BUCKET, KEY, false).await.unwrap();
        assert_eq!(first.source, FetchSource::Downloaded);
        assert_eq!(first.bytes, b"data");
        assert_eq!(store.get_count(), 1);

        // Identical remote state: immediate hit, one HEAD, zero downloads
        let heads_before = store.head_count();
        let second = fetcher.fetch(BUCKET, KEY, false).await.unwrap();
        assert_eq!(second.source, FetchSource::CacheHit);
        assert_eq!(second.bytes, b"data");
        assert_eq!(store.get_count(), 1);
        assert_eq!(store.head_count(), heads_before + 1);
    }

    #[tokio::test]
    async fn test_unchanged_remote_never_redownloads() {
        let store = Arc::new(MockStore::serving(meta(4, "abc"), b"data"));
        let (fetcher, _dir) = fetcher(&store);

        for _ in 0..3 {
            fetcher.fetch(BUCKET, KEY, false).await.unwrap();
        }
        assert_eq!(store.get_count(), 1);
    }

    #[tokio::test]
    async fn test_remote_change_downloads_once_and_updates_metadata() {
        let store = Arc::new(MockStore::serving(meta(4, "abc"), b"data"));
        let (fetcher, _dir) = fetcher(&store);

        fetcher.fetch(BUCKET, KEY, false).await.unwrap();
        assert_eq!(fetcher.stored_meta(BUCKET, KEY).unwrap(), meta(4, "abc"));

        store.set_remote(Some((meta(5, "def"), b"data2".to_vec())));

        let refreshed = fetcher.fetch(BUCKET, KEY, false).await.unwrap();
        assert_eq!(refreshed.source, FetchSource::Downloaded);
        assert_eq!(refreshed.bytes, b"data2");
        assert_eq!(store.get_count(), 2);
        // Stored metadata now matches the new remote descriptor exactly
        assert_eq!(fetcher.stored_meta(BUCKET, KEY).unwrap(), meta(5, "def"));

        // And the next call is a hit again
        let after = fetcher.fetch(BUCKET, KEY, false).await.unwrap();
        assert_eq!(after.source, FetchSource::CacheHit);
        assert_eq!(store.get_count(), 2);
    }

    #[tokio::test]
    async fn test_size_only_change_forces_refresh() {
        let store = Arc::new(MockStore::serving(meta(4, "abc"), b"data"));
        let (fetcher, _dir) = fetcher(&store);

        fetcher.fetch(BUCKET, KEY, false).await.unwrap();
        store.set_remote(Some((meta(6, "abc"), b"data++".to_vec())));

        let refreshed = fetcher.fetch(BUCKET, KEY, false).await.unwrap();
        assert_eq!(refreshed.source, FetchSource::Downloaded);
    }

    #[tokio::test]
    async fn test_force_refresh_always_downloads() {
        let store = Arc::new(MockStore::serving(meta(4, "abc"), b"data"));
        let (fetcher, _dir) = fetcher(&store);

        fetcher.fetch(BUCKET, KEY, false).await.unwrap();

        let forced = fetcher.fetch(BUCKET, KEY, true).await.unwrap();
        assert_eq!(forced.source, FetchSource::Downloaded);
        assert_eq!(store.get_count(), 2);
    }

    #[tokio::test]
    async fn test_deleted_sidecar_forces_redownload() {
        let store = Arc::new(MockStore::serving(meta(4, "abc"), b"data"));
        let (fetcher, _dir) = fetcher(&store);

        let first = fetcher.fetch(BUCKET, KEY, false).await.unwrap();
        sidecar::remove(&first.path);

        // Body intact, sidecar gone: pairing invariant says re-download
        let second = fetcher.fetch(BUCKET, KEY, false).await.unwrap();
        assert_eq!(second.source, FetchSource::Downloaded);
        assert_eq!(store.get_count(), 2);
    }

    #[tokio::test]
    async fn test_corrupt_sidecar_forces_redownload() {
        let store = Arc::new(MockStore::serving(meta(4, "abc"), b"data"));
        let (fetcher, _dir) = fetcher(&store);

        let first = fetcher.fetch(BUCKET, KEY, false).await.unwrap();
        fs::write(paths::sidecar_path(&first.path), b"{garbage").unwrap();

        let second = fetcher.fetch(BUCKET, KEY, false).await.unwrap();
        assert_eq!(second.source, FetchSource::Downloaded);
        assert_eq!(store.get_count(), 2);
    }

    #[tokio::test]
    async fn test_unavailable_store_serves_stale_copy() {
        let store = Arc::new(MockStore::serving(meta(4, "abc"), b"data"));
        let (fetcher, _dir) = fetcher(&store);

        fetcher.fetch(BUCKET, KEY, false).await.unwrap();
        store.set_unavailable(true);

        let degraded = fetcher.fetch(BUCKET, KEY, false).await.unwrap();
        assert_eq!(degraded.source, FetchSource::StaleFallback);
        assert!(degraded.served_stale());
        assert_eq!(degraded.bytes, b"data");
        assert_eq!(store.get_count(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_store_without_cache_fails() {
        let store = Arc::new(MockStore::serving(meta(4, "abc"), b"data"));
        store.set_unavailable(true);
        let (fetcher, _dir) = fetcher(&store);

        let err = fetcher.fetch(BUCKET, KEY, false).await.unwrap_err();
        assert!(matches!(err, FetchError::RemoteUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_forced_refresh_does_not_degrade() {
        let store = Arc::new(MockStore::serving(meta(4, "abc"), b"data"));
        let (fetcher, _dir) = fetcher(&store);

        fetcher.fetch(BUCKET, KEY, false).await.unwrap();
        store.set_unavailable(true);

        // The caller asked for fresh bytes; stale serving stays on the
        // unforced path
        let err = fetcher.fetch(BUCKET, KEY, true).await.unwrap_err();
        assert!(matches!(err, FetchError::RemoteUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_not_found_surfaces_and_leaves_cache_untouched() {
        let store = Arc::new(MockStore::serving(meta(4, "abc"), b"data"));
        let (fetcher, _dir) = fetcher(&store);

        let first = fetcher.fetch(BUCKET, KEY, false).await.unwrap();
        store.set_remote(None);

        let err = fetcher.fetch(BUCKET, KEY, false).await.unwrap_err();
        assert!(matches!(err, FetchError::NotFound { .. }));

        // Body and sidecar both still present
        assert!(first.path.exists());
        assert!(fetcher.stored_meta(BUCKET, KEY).is_some());
    }

    #[tokio::test]
    async fn test_not_found_on_empty_cache() {
        let store = Arc::new(MockStore::default());
        let (fetcher, _dir) = fetcher(&store);

        let err = fetcher.fetch(BUCKET, KEY, false).await.unwrap_err();
        assert!(matches!(err, FetchError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_missing_body_redownloads_despite_sidecar() {
        let store = Arc::new(MockStore::serving(meta(4, "abc"), b"data"));
        let (fetcher, _dir) = fetcher(&store);

        let first = fetcher.fetch(BUCKET, KEY, false).await.unwrap();
        fs::remove_file(&first.path).unwrap();

        let second = fetcher.fetch(BUCKET, KEY, false).await.unwrap();
        assert_eq!(second.source, FetchSource::Downloaded);
    }

    #[tokio::test]
    async fn test_evict_removes_body_and_sidecar_together() {
        let store = Arc::new(MockStore::serving(meta(4, "abc"), b"data"));
        let (fetcher, _dir) = fetcher(&store);

        let first = fetcher.fetch(BUCKET, KEY, false).await.unwrap();
        fetcher.evict(BUCKET, KEY);

        assert!(!first.path.exists());
        assert!(fetcher.stored_meta(BUCKET, KEY).is_none());

        let next = fetcher.fetch(BUCKET, KEY, false).await.unwrap();
        assert_eq!(next.source, FetchSource::Downloaded);
    }

    #[tokio::test]
    async fn test_failed_body_write_reports_download_failed() {
        let store = Arc::new(MockStore::serving(meta(4, "abc"), b"data"));
        let dir = TempDir::new().unwrap();
        let cache_dir = dir.path().join("cache");
        let fetcher = SyncedFetcher::new(Arc::clone(&store), &cache_dir).unwrap();

        // Yank the cache directory out from under the write
        fs::remove_dir_all(&cache_dir).unwrap();

        let err = fetcher.fetch(BUCKET, KEY, false).await.unwrap_err();
        assert!(matches!(err, FetchError::DownloadFailed { .. }));

        // No partial file or sidecar was left behind
        assert!(!fetcher.entry_path(BUCKET, KEY).exists());
        assert!(fetcher.stored_meta(BUCKET, KEY).is_none());
    }
}
