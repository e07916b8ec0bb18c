//! Per-symbol time-series views
//!
//! Stateless filtering over the decoded dataset. The decoder guarantees
//! (ticker, date) order, so per-symbol slices come out chronological.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One daily OHLCV bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub ticker: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Unique tickers in first-appearance order
pub fn tickers(bars: &[Bar]) -> Vec<String> {
    let mut seen = Vec::new();
    for bar in bars {
        if !seen.contains(&bar.ticker) {
            seen.push(bar.ticker.clone());
        }
    }
    seen
}

/// Filter bars by symbol and inclusive date range.
///
/// Every argument is optional; `None` means "no constraint", matching how a
/// dashboard narrows a view one control at a time.
pub fn filter(
    bars: &[Bar],
    ticker: Option<&str>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Vec<Bar> {
    bars.iter()
        .filter(|bar| ticker.map_or(true, |t| bar.ticker == t))
        .filter(|bar| start.map_or(true, |s| bar.date >= s))
        .filter(|bar| end.map_or(true, |e| bar.date <= e))
        .cloned()
        .collect()
}
