//! One CSV file per symbol under a data directory, merged on every write.

use std::{
    fs,
    path::{Path, PathBuf},
};

use snafu::ResultExt;
use tracing::debug;

use crate::{
    io::{
        merge::{dedup_sorted, merge_bars, MergeStats},
        series_file::{read_series, write_series, SeriesLoadError},
        sink::{CreateDirSnafu, DataSink, InvalidSymbolSnafu, SinkError, WriteSnafu},
    },
    models::{bar::Bar, bar_series::BarSeries, symbol::validate_symbol, timeframe::TimeFrame},
};

/// Suffix of the file written when the canonical file cannot be loaded.
pub const BACKUP_SUFFIX: &str = ".new";

/// What a write did to the archive.
#[derive(Debug)]
pub enum MergeOutcome {
    /// No file existed; it now holds exactly the fresh bars.
    Created { path: PathBuf, rows: usize },
    /// The existing file was merged with the fresh bars and replaced.
    Merged { path: PathBuf, stats: MergeStats },
    /// The existing file could not be loaded. It was left untouched and the
    /// fresh bars went to `backup` instead.
    FailedWithBackup {
        canonical: PathBuf,
        backup: PathBuf,
        rows: usize,
        cause: SeriesLoadError,
    },
}

#[derive(Debug, Clone)]
pub struct CsvArchive {
    data_dir: PathBuf,
}

impl CsvArchive {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// `{data_dir}/{symbol}_{timeframe}_data.csv`
    pub fn canonical_path(&self, symbol: &str, timeframe: &TimeFrame) -> PathBuf {
        self.data_dir.join(format!("{symbol}_{timeframe}_data.csv"))
    }

    pub fn backup_path(canonical: &Path) -> PathBuf {
        let mut name = canonical.as_os_str().to_owned();
        name.push(BACKUP_SUFFIX);
        PathBuf::from(name)
    }
}

impl DataSink for CsvArchive {
    type Output = MergeOutcome;

    fn write(&self, series: &BarSeries) -> Result<MergeOutcome, SinkError> {
        let symbol = series.symbol.as_str();
        validate_symbol(symbol).context(InvalidSymbolSnafu { symbol })?;
        fs::create_dir_all(&self.data_dir).context(CreateDirSnafu {
            path: &self.data_dir,
        })?;

        let path = self.canonical_path(symbol, &series.timeframe);
        if !path.exists() {
            let bars = ordered_bars(series);
            write_series(&path, &bars).context(WriteSnafu { path: &path })?;
            debug!(symbol, path = %path.display(), rows = bars.len(), "created series file");
            return Ok(MergeOutcome::Created {
                path,
                rows: bars.len(),
            });
        }

        match read_series(&path) {
            Ok(existing) => {
                let (merged, stats) = merge_bars(existing, series.bars.clone());
                write_series(&path, &merged).context(WriteSnafu { path: &path })?;
                debug!(
                    symbol,
                    path = %path.display(),
                    rows = stats.combined,
                    added = stats.added,
                    replaced = stats.replaced,
                    "merged series file"
                );
                Ok(MergeOutcome::Merged { path, stats })
            }
            Err(cause) => {
                debug!(symbol, path = %path.display(), error = %cause, "existing file unreadable, writing backup");
                let backup = Self::backup_path(&path);
                let bars = ordered_bars(series);
                write_series(&backup, &bars).context(WriteSnafu { path: &backup })?;
                Ok(MergeOutcome::FailedWithBackup {
                    canonical: path,
                    backup,
                    rows: bars.len(),
                    cause,
                })
            }
        }
    }
}

/// Bars of `series` sorted with unique timestamps, keeping the last duplicate.
fn ordered_bars(series: &BarSeries) -> Vec<Bar> {
    if series.is_strictly_ascending() {
        series.bars.clone()
    } else {
        dedup_sorted(series.bars.clone())
    }
}
