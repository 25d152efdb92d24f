//! On-disk format of one symbol's bar history.
//!
//! Files are plain CSV with a `timestamp,open,high,low,close,volume` header
//! and timestamps in RFC 3339 UTC. The reader is more forgiving than the
//! writer: column order and case do not matter, a few timestamp column
//! aliases are recognised and unknown columns are ignored, so files written
//! by other tools in the same layout still load.

use std::{
    fs::File,
    io::{Read, Write},
    path::{Path, PathBuf},
};

use chrono::{DateTime, SecondsFormat, Utc};
use snafu::{Backtrace, ResultExt, Snafu};
use tempfile::NamedTempFile;

use crate::models::bar::Bar;

pub const HEADER: [&str; 6] = ["timestamp", "open", "high", "low", "close", "volume"];

const TIMESTAMP_ALIASES: &[&str] = &["timestamp", "datetime", "date", "time"];

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SeriesLoadError {
    #[snafu(display("Failed to open {}: {source}", path.display()))]
    Open {
        path: PathBuf,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    /// Malformed CSV, including rows with the wrong number of fields.
    #[snafu(display("Malformed CSV in {origin}: {source}"))]
    Csv {
        origin: String,
        source: csv::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("{origin} has no header row"))]
    EmptyHeader { origin: String, backtrace: Backtrace },

    #[snafu(display("{origin} has no {column} column"))]
    MissingColumn {
        origin: String,
        column: &'static str,
        backtrace: Backtrace,
    },

    #[snafu(display("{origin} line {line}: invalid {column} value {value:?}"))]
    InvalidValue {
        origin: String,
        line: u64,
        column: &'static str,
        value: String,
        backtrace: Backtrace,
    },
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SeriesWriteError {
    #[snafu(display("Failed to create a temporary file in {}: {source}", dir.display()))]
    CreateTemp {
        dir: PathBuf,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("Failed to encode rows: {source}"))]
    Encode {
        source: csv::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("Failed to flush {}: {source}", path.display()))]
    Flush {
        path: PathBuf,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("Failed to replace {}: {source}", path.display()))]
    Persist {
        path: PathBuf,
        source: tempfile::PersistError,
        backtrace: Backtrace,
    },
}

/// Reads every bar stored at `path`, in file order.
pub fn read_series(path: &Path) -> Result<Vec<Bar>, SeriesLoadError> {
    let file = File::open(path).context(OpenSnafu { path })?;
    read_series_from(file, &path.display().to_string())
}

/// Reads bars from any CSV source. `origin` names the source in errors.
pub fn read_series_from<R: Read>(source: R, origin: &str) -> Result<Vec<Bar>, SeriesLoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(source);

    let headers = reader.headers().context(CsvSnafu { origin })?.clone();
    if headers.iter().all(|h| h.is_empty()) {
        return EmptyHeaderSnafu { origin }.fail();
    }

    let position = |aliases: &[&str], column: &'static str| {
        headers
            .iter()
            .position(|h| aliases.iter().any(|a| h.eq_ignore_ascii_case(a)))
            .ok_or_else(|| MissingColumnSnafu { origin, column }.build())
    };
    let ts_col = position(TIMESTAMP_ALIASES, "timestamp")?;
    let open_col = position(&["open"], "open")?;
    let high_col = position(&["high"], "high")?;
    let low_col = position(&["low"], "low")?;
    let close_col = position(&["close"], "close")?;
    let volume_col = position(&["volume"], "volume")?;

    let mut bars = Vec::new();
    for record in reader.records() {
        let record = record.context(CsvSnafu { origin })?;
        let line = record.position().map_or(0, |p| p.line());
        let cell = |idx: usize| record.get(idx).unwrap_or_default();

        let number = |idx: usize, column: &'static str| {
            let raw = cell(idx);
            raw.parse::<f64>().map_err(|_| {
                InvalidValueSnafu {
                    origin,
                    line,
                    column,
                    value: raw,
                }
                .build()
            })
        };

        let raw_ts = cell(ts_col);
        let timestamp = parse_timestamp(raw_ts).ok_or_else(|| {
            InvalidValueSnafu {
                origin,
                line,
                column: "timestamp",
                value: raw_ts,
            }
            .build()
        })?;

        bars.push(Bar {
            timestamp,
            open: number(open_col, "open")?,
            high: number(high_col, "high")?,
            low: number(low_col, "low")?,
            close: number(close_col, "close")?,
            volume: number(volume_col, "volume")?,
        });
    }
    Ok(bars)
}

/// Parses an RFC 3339 timestamp or the `YYYY-MM-DD HH:MM:SS±HH:MM` form.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%:z"))
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%z"))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Writes `bars` to `path`, replacing any previous content atomically.
///
/// The rows go to a temporary file in the same directory which is then
/// renamed over `path`, so readers never observe a partial file.
pub fn write_series(path: &Path, bars: &[Bar]) -> Result<(), SeriesWriteError> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).context(CreateTempSnafu { dir })?;

    {
        let mut writer = csv::Writer::from_writer(tmp.as_file_mut());
        writer.write_record(HEADER).context(EncodeSnafu)?;
        for bar in bars {
            writer
                .write_record([
                    format_timestamp(&bar.timestamp),
                    bar.open.to_string(),
                    bar.high.to_string(),
                    bar.low.to_string(),
                    bar.close.to_string(),
                    bar.volume.to_string(),
                ])
                .context(EncodeSnafu)?;
        }
        writer.flush().context(FlushSnafu { path })?;
    }
    tmp.as_file_mut().flush().context(FlushSnafu { path })?;
    tmp.as_file().sync_all().context(FlushSnafu { path })?;

    tmp.persist(path).context(PersistSnafu { path })?;
    Ok(())
}
