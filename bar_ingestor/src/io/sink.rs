use std::path::PathBuf;

use snafu::{Backtrace, Snafu};

use crate::{io::series_file::SeriesWriteError, models::bar_series::BarSeries};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SinkError {
    /// The symbol cannot be used as part of a file name.
    #[snafu(display("Symbol {symbol:?} cannot be stored: {source}"))]
    InvalidSymbol {
        symbol: String,
        source: crate::models::symbol::SymbolError,
        backtrace: Backtrace,
    },

    #[snafu(display("Failed to create data directory {}: {source}", path.display()))]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    /// Writing the series file itself failed.
    #[snafu(display("Failed to write {}: {source}", path.display()))]
    Write {
        path: PathBuf,
        source: SeriesWriteError,
        backtrace: Backtrace,
    },
}

/// A destination for fetched series.
///
/// Writes are blocking; the archive runs them on the scheduler's own thread
/// between fetches.
pub trait DataSink {
    /// The type of output returned after a successful write operation.
    ///
    /// A file sink might report the paths it touched, a database sink the
    /// number of rows inserted.
    type Output;

    /// Persists one series.
    fn write(&self, series: &BarSeries) -> Result<Self::Output, SinkError>;
}
