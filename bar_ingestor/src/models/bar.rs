//! Canonical in-memory representation of a time-series bar (OHLCV).
//!
//! This struct is the common currency between the [`DataProvider`](crate::providers::DataProvider)
//! implementations, the merge engine and the on-disk series files.

use chrono::{DateTime, Utc};

/// A single time-series bar (OHLCV) for a given timestamp.
///
/// The timestamp is the uniqueness key of a bar within one ticker's series.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    /// The start of the bar interval (UTC).
    pub timestamp: DateTime<Utc>,

    /// Opening price.
    pub open: f64,

    /// Highest price during the bar interval.
    pub high: f64,

    /// Lowest price during the bar interval.
    pub low: f64,

    /// Closing price.
    pub close: f64,

    /// Volume traded during the bar interval.
    pub volume: f64,
}

impl Bar {
    pub fn new(timestamp: DateTime<Utc>, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}
