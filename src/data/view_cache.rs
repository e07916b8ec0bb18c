//! Decoded series cache
//!
//! In-memory TTL cache of per-symbol bar slices so repeated views of the
//! same ticker skip re-filtering the full dataset. Entries are shared
//! `Arc`s: serving a view never clones the bars.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;
use tracing::{debug, trace};

use super::series::Bar;

/// Default TTL: series are cheap to rebuild, keep them briefly
const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Per-symbol series cache with hit/miss accounting
pub struct SeriesCache {
    /// Cached slices by ticker
    series: Cache<String, Arc<Vec<Bar>>>,
    /// Cache hit counter
    hits: AtomicU64,
    /// Cache miss counter
    misses: AtomicU64,
}

impl SeriesCache {
    /// Create a cache with the default TTL
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    /// Create a cache with a custom TTL
    pub fn with_ttl(ttl: Duration) -> Self {
        let series = Cache::builder()
            .time_to_live(ttl)
            .name("series_cache")
            .build();

        Self {
            series,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Get the cached series for a ticker, updating hit/miss counters
    pub fn get(&self, ticker: &str) -> Option<Arc<Vec<Bar>>> {
        match self.series.get(ticker) {
            Some(bars) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                trace!(ticker = ticker, "Series cache HIT");
                Some(bars)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                trace!(ticker = ticker, "Series cache MISS");
                None
            }
        }
    }

    /// Insert a ticker's series, returning the shared slice
    pub fn insert(&self, ticker: &str, bars: Vec<Bar>) -> Arc<Vec<Bar>> {
        debug!(ticker = ticker, bars = bars.len(), "Cached series");
        let shared = Arc::new(bars);
        self.series.insert(ticker.to_string(), Arc::clone(&shared));
        shared
    }

    /// Drop every cached series.
    ///
    /// Call after the underlying dataset is re-downloaded: every slice may
    /// be out of date.
    pub fn invalidate_all(&self) {
        self.series.invalidate_all();
        debug!("Invalidated all cached series");
    }

    /// Get cache statistics
    ///
    /// Returns (hits, misses, hit_rate)
    pub fn stats(&self) -> (u64, u64, f64) {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        (hits, misses, hit_rate)
    }

    /// Log current cache metrics
    pub fn log_metrics(&self) {
        let (hits, misses, hit_rate) = self.stats();
        debug!(
            hits = hits,
            misses = misses,
            hit_rate = format!("{:.1}%", hit_rate),
            entries = self.series.entry_count(),
            "Series cache metrics"
        );
    }
}

impl Default for SeriesCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_series(ticker: &str) -> Vec<Bar> {
        vec![Bar {
            ticker: ticker.to_string(),
            date: NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
            open: 100.0,
            high: 102.0,
            low: 99.0,
            close: 101.0,
            volume: 1000,
        }]
    }

    #[test]
    fn test_cache_hit_miss() {
        let cache = SeriesCache::new();

        // Initially miss
        assert!(cache.get("FPT").is_none());
        let (_, _, hit_rate) = cache.stats();
        assert_eq!(hit_rate, 0.0);

        // Insert and hit
        cache.insert("FPT", sample_series("FPT"));
        assert!(cache.get("FPT").is_some());

        let (hits, misses, hit_rate) = cache.stats();
        assert_eq!(hits, 1);
        assert_eq!(misses, 1);
        assert!(hit_rate > 49.0 && hit_rate < 51.0); // ~50%
    }

    #[test]
    fn test_invalidate_all() {
        let cache = SeriesCache::new();

        cache.insert("FPT", sample_series("FPT"));
        cache.insert("VNM", sample_series("VNM"));
        assert!(cache.get("FPT").is_some());

        cache.invalidate_all();

        assert!(cache.get("FPT").is_none());
        assert!(cache.get("VNM").is_none());
    }

    #[test]
    fn test_shared_slices() {
        let cache = SeriesCache::new();
        cache.insert("FPT", sample_series("FPT"));

        let a = cache.get("FPT").unwrap();
        let b = cache.get("FPT").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
