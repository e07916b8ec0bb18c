//! Dataset decoding and per-symbol views

pub mod schema;
pub mod series;
pub mod view_cache;

pub use schema::{decode, DataError};
pub use series::Bar;
pub use view_cache::SeriesCache;
