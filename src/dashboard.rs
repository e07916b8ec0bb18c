//! Dashboard service
//!
//! Ties the cache-synced dataset to the per-symbol views the CLI prints:
//! load (fetch + decode), list tickers, slice series, refresh from the
//! store. Owns the in-memory series cache so repeated views of one ticker
//! skip re-filtering.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::{info, warn};

use crate::cache::{FetchSource, SyncedFetcher};
use crate::data::{self, Bar, SeriesCache};
use crate::store::ObjectStore;

/// Loaded dataset plus the machinery to keep it current
pub struct Dashboard<S> {
    fetcher: SyncedFetcher<S>,
    bucket: String,
    key: String,
    bars: Vec<Bar>,
    views: SeriesCache,
    /// True when the last load could not verify freshness
    served_stale: bool,
}

impl<S: ObjectStore> Dashboard<S> {
    /// Fetch and decode the dataset.
    ///
    /// A schema problem fails here, before any view is attempted.
    pub async fn load(
        fetcher: SyncedFetcher<S>,
        bucket: &str,
        key: &str,
        force_refresh: bool,
    ) -> Result<Self> {
        let fetched = fetcher
            .fetch(bucket, key, force_refresh)
            .await
            .context("Failed to fetch dataset")?;

        if fetched.served_stale() {
            warn!(
                bucket = bucket,
                key = key,
                "Serving cached dataset without freshness check"
            );
        }

        let bars = data::decode(&fetched.bytes).context("Failed to decode dataset")?;
        info!(bars = bars.len(), "Dataset loaded");

        Ok(Self {
            fetcher,
            bucket: bucket.to_string(),
            key: key.to_string(),
            bars,
            views: SeriesCache::new(),
            served_stale: fetched.served_stale(),
        })
    }

    /// True when the loaded dataset could not be verified against the store
    pub fn served_stale(&self) -> bool {
        self.served_stale
    }

    /// Number of bars in the loaded dataset
    pub fn bar_count(&self) -> usize {
        self.bars.len()
    }

    /// Unique tickers in the dataset
    pub fn tickers(&self) -> Vec<String> {
        data::series::tickers(&self.bars)
    }

    /// Full series for one ticker, via the in-memory cache
    pub fn series(&self, ticker: &str) -> Arc<Vec<Bar>> {
        if let Some(bars) = self.views.get(ticker) {
            return bars;
        }
        let filtered = data::series::filter(&self.bars, Some(ticker), None, None);
        self.views.insert(ticker, filtered)
    }

    /// Date-bounded view of one ticker's series (inclusive bounds)
    pub fn view(&self, ticker: &str, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Vec<Bar> {
        let series = self.series(ticker);
        data::series::filter(&series, None, start, end)
    }

    /// Re-check the store and reload the dataset if it changed.
    ///
    /// Returns how the bytes were obtained; on a fresh download every
    /// cached view is dropped.
    pub async fn refresh(&mut self, force_refresh: bool) -> Result<FetchSource> {
        let fetched = self
            .fetcher
            .fetch(&self.bucket, &self.key, force_refresh)
            .await
            .context("Failed to refresh dataset")?;

        self.served_stale = fetched.served_stale();

        if fetched.source == FetchSource::Downloaded {
            self.bars = data::decode(&fetched.bytes).context("Failed to decode dataset")?;
            self.views.invalidate_all();
            info!(bars = self.bars.len(), "Dataset refreshed");
        }

        Ok(fetched.source)
    }

    /// Log series-cache metrics (called on shutdown)
    pub fn log_metrics(&self) {
        self.views.log_metrics();
    }
}
