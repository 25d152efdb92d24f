//! A collection of time-series bars for a specific symbol and timeframe.

use chrono::{DateTime, Utc};

use crate::models::{bar::Bar, timeframe::TimeFrame};

/// Represents a complete set of time-series data for a single symbol.
///
/// This struct groups a vector of [`Bar`]s with their corresponding symbol
/// and [`TimeFrame`], making the data set self-describing.
#[derive(Debug, Clone, PartialEq)]
pub struct BarSeries {
    /// The symbol this data represents (e.g., "QQQ", "SPY").
    pub symbol: String,
    /// The time interval for each bar in the series.
    pub timeframe: TimeFrame,
    /// The collection of OHLCV bars.
    pub bars: Vec<Bar>,
}

impl BarSeries {
    pub fn new(symbol: impl Into<String>, timeframe: TimeFrame, bars: Vec<Bar>) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
            bars,
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Earliest and latest timestamps present, in whatever order the bars are stored.
    pub fn span(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let first = self.bars.iter().map(|b| b.timestamp).min()?;
        let last = self.bars.iter().map(|b| b.timestamp).max()?;
        Some((first, last))
    }

    /// `true` when timestamps are strictly increasing, i.e. sorted with no duplicates.
    pub fn is_strictly_ascending(&self) -> bool {
        self.bars.windows(2).all(|w| w[0].timestamp < w[1].timestamp)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn bar(minute: u32) -> Bar {
        let ts = Utc.with_ymd_and_hms(2024, 6, 3, 14, minute, 0).unwrap();
        Bar::new(ts, 1.0, 1.0, 1.0, 1.0, 0.0)
    }

    #[test]
    fn ascending_check_rejects_duplicates_and_disorder() {
        let tf = TimeFrame::minutes(1).unwrap();
        assert!(BarSeries::new("QQQ", tf.clone(), vec![bar(30), bar(31), bar(32)]).is_strictly_ascending());
        assert!(!BarSeries::new("QQQ", tf.clone(), vec![bar(30), bar(30)]).is_strictly_ascending());
        assert!(!BarSeries::new("QQQ", tf, vec![bar(31), bar(30)]).is_strictly_ascending());
    }

    #[test]
    fn span_ignores_storage_order() {
        let tf = TimeFrame::minutes(1).unwrap();
        let series = BarSeries::new("SPY", tf, vec![bar(40), bar(30), bar(35)]);
        let (first, last) = series.span().unwrap();
        assert_eq!(first, bar(30).timestamp);
        assert_eq!(last, bar(40).timestamp);
    }
}
