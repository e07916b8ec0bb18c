//! Columnar dataset decoder
//!
//! Decodes the Parquet export the dashboard consumes. The file carries
//! angle-bracketed column names from the upstream exporter; a file missing
//! any required column is rejected before filtering ever sees it.

use std::io::Cursor;

use chrono::NaiveDate;
use polars::prelude::*;
use thiserror::Error;

use super::series::Bar;

/// Columns every dataset file must carry
pub const REQUIRED_COLUMNS: [&str; 7] = [
    "<Ticker>",
    "<DTYYYYMMDD>",
    "<Open>",
    "<High>",
    "<Low>",
    "<Close>",
    "<Volume>",
];

/// Decoder error types
#[derive(Debug, Error)]
pub enum DataError {
    #[error("dataset missing required columns: {}", missing.join(", "))]
    SchemaMismatch { missing: Vec<String> },

    #[error("dataset decode error: {0}")]
    Decode(String),

    #[error("invalid trading date {0} (expected YYYYMMDD)")]
    InvalidDate(i64),
}

/// Decode dataset bytes into bars sorted by (ticker, date).
///
/// The sort is the canonical order every downstream view relies on; input
/// row order is not trusted.
pub fn decode(bytes: &[u8]) -> Result<Vec<Bar>, DataError> {
    let df = ParquetReader::new(Cursor::new(bytes))
        .finish()
        .map_err(|e| DataError::Decode(format!("parquet read: {e}")))?;

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|name| df.column(name).is_err())
        .map(|name| name.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(DataError::SchemaMismatch { missing });
    }

    let mut bars = dataframe_to_bars(&df)?;
    bars.sort_by(|a, b| (&a.ticker, a.date).cmp(&(&b.ticker, b.date)));
    Ok(bars)
}

/// Convert the validated DataFrame into bars
fn dataframe_to_bars(df: &DataFrame) -> Result<Vec<Bar>, DataError> {
    let column = |name: &str| {
        df.column(name)
            .map_err(|e| DataError::Decode(format!("column '{name}': {e}")))
    };
    fn cast_err(name: &str) -> impl Fn(PolarsError) -> DataError + '_ {
        move |e| DataError::Decode(format!("column '{name}' type: {e}"))
    }

    let tickers = column("<Ticker>")?
        .cast(&DataType::String)
        .map_err(cast_err("<Ticker>"))?;
    let tickers = tickers.str().map_err(cast_err("<Ticker>"))?;

    let dates = column("<DTYYYYMMDD>")?
        .cast(&DataType::Int64)
        .map_err(cast_err("<DTYYYYMMDD>"))?;
    let dates = dates.i64().map_err(cast_err("<DTYYYYMMDD>"))?;

    let opens = column("<Open>")?
        .cast(&DataType::Float64)
        .map_err(cast_err("<Open>"))?;
    let opens = opens.f64().map_err(cast_err("<Open>"))?;

    let highs = column("<High>")?
        .cast(&DataType::Float64)
        .map_err(cast_err("<High>"))?;
    let highs = highs.f64().map_err(cast_err("<High>"))?;

    let lows = column("<Low>")?
        .cast(&DataType::Float64)
        .map_err(cast_err("<Low>"))?;
    let lows = lows.f64().map_err(cast_err("<Low>"))?;

    let closes = column("<Close>")?
        .cast(&DataType::Float64)
        .map_err(cast_err("<Close>"))?;
    let closes = closes.f64().map_err(cast_err("<Close>"))?;

    let volumes = column("<Volume>")?
        .cast(&DataType::Int64)
        .map_err(cast_err("<Volume>"))?;
    let volumes = volumes.i64().map_err(cast_err("<Volume>"))?;

    let n = df.height();
    let mut bars = Vec::with_capacity(n);

    for i in 0..n {
        let ticker = tickers
            .get(i)
            .ok_or_else(|| DataError::Decode(format!("null ticker at row {i}")))?;
        let raw_date = dates
            .get(i)
            .ok_or_else(|| DataError::Decode(format!("null date at row {i}")))?;

        bars.push(Bar {
            ticker: ticker.to_string(),
            date: trading_date(raw_date)?,
            open: opens.get(i).unwrap_or(f64::NAN),
            high: highs.get(i).unwrap_or(f64::NAN),
            low: lows.get(i).unwrap_or(f64::NAN),
            close: closes.get(i).unwrap_or(f64::NAN),
            volume: volumes.get(i).unwrap_or(0).max(0) as u64,
        });
    }

    Ok(bars)
}

/// Parse a YYYYMMDD integer into a calendar date
fn trading_date(value: i64) -> Result<NaiveDate, DataError> {
    if !(1000_01_01..=9999_12_31).contains(&value) {
        return Err(DataError::InvalidDate(value));
    }
    let year = (value / 10_000) as i32;
    let month = (value / 100 % 100) as u32;
    let day = (value % 100) as u32;
    NaiveDate::from_ymd_opt(year, month, day).ok_or(DataError::InvalidDate(value))
}
