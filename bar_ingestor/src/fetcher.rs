//! Retrieves the recent bars of one symbol and turns them into a
//! [`BarSeries`].

use tracing::{debug, info, warn};

use crate::{
    io::merge::dedup_sorted,
    models::{
        bar_series::BarSeries,
        request_params::BarsRequestParams,
        symbol::validate_symbol,
        table::{normalize_columns, Normalization},
        timeframe::{TimeFrame, TimeFrameUnit},
    },
    providers::{DataProvider, InternalSnafu, ProviderError, ValidationSnafu},
};

/// What to ask the provider for on every fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSettings {
    pub window_days: u32,
    pub timeframe: TimeFrame,
    pub include_extended_hours: bool,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            window_days: 5,
            timeframe: TimeFrame {
                amount: 1,
                unit: TimeFrameUnit::Minute,
            },
            include_extended_hours: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Data(BarSeries),
    /// The provider had no bars for the symbol in the window.
    Empty,
}

pub struct Fetcher {
    provider: Box<dyn DataProvider + Send + Sync>,
    settings: FetchSettings,
}

impl Fetcher {
    pub fn new(provider: Box<dyn DataProvider + Send + Sync>, settings: FetchSettings) -> Self {
        Self { provider, settings }
    }

    /// Fetches the configured window of bars for `symbol`.
    ///
    /// Nested column labels are collapsed first. Bars come back sorted by
    /// timestamp with duplicate timestamps reduced to the last one seen.
    pub async fn fetch(&self, symbol: &str) -> Result<FetchOutcome, ProviderError> {
        validate_symbol(symbol).map_err(|e| {
            ValidationSnafu {
                message: e.to_string(),
            }
            .build()
        })?;

        let params = BarsRequestParams {
            symbol: symbol.to_string(),
            timeframe: self.settings.timeframe.clone(),
            window_days: self.settings.window_days,
            include_extended_hours: self.settings.include_extended_hours,
        };

        let table = self.provider.fetch_bars(params).await?;
        if table.is_empty() {
            return Ok(FetchOutcome::Empty);
        }

        let table = match normalize_columns(table) {
            Normalization::Collapsed(table) => {
                debug!(symbol, "collapsed nested column labels");
                table
            }
            Normalization::AlreadyFlat(table) => table,
            Normalization::Unchanged { table, reason } => {
                warn!(symbol, %reason, "column labels left nested");
                table
            }
        };

        let bars = table.to_bars(symbol).map_err(|e| {
            InternalSnafu {
                message: format!("unusable table for {symbol}: {e}"),
            }
            .build()
        })?;
        if bars.is_empty() {
            debug!(symbol, rows = table.len(), "every row lacks a price");
            return Ok(FetchOutcome::Empty);
        }

        let series = BarSeries::new(symbol, self.settings.timeframe.clone(), dedup_sorted(bars));
        if let Some((first, last)) = series.span() {
            info!(symbol, rows = series.len(), %first, %last, "fetched bars");
        }
        Ok(FetchOutcome::Data(series))
    }
}
