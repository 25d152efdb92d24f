use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::{
    models::table::{BarTable, ColumnKey, CLOSE, HIGH, LOW, OPEN, VOLUME},
    providers::{ApiSnafu, InternalSnafu, ProviderError},
};

/// Error code the chart endpoint uses for unknown or delisted symbols.
pub const NOT_FOUND_CODE: &str = "Not Found";

#[derive(Deserialize, Debug)]
pub struct ChartResponse {
    pub chart: Chart,
}

#[derive(Deserialize, Debug)]
pub struct Chart {
    pub result: Option<Vec<ChartResult>>,
    pub error: Option<ChartError>,
}

#[derive(Deserialize, Debug)]
pub struct ChartError {
    pub code: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct ChartResult {
    /// Bar open times, epoch seconds. Absent when the window has no bars.
    #[serde(default)]
    pub timestamp: Option<Vec<i64>>,
    pub indicators: Indicators,
}

#[derive(Deserialize, Debug)]
pub struct Indicators {
    #[serde(default)]
    pub quote: Vec<Quote>,
}

#[derive(Deserialize, Debug)]
pub struct Quote {
    #[serde(default)]
    pub open: Vec<Option<f64>>,
    #[serde(default)]
    pub high: Vec<Option<f64>>,
    #[serde(default)]
    pub low: Vec<Option<f64>>,
    #[serde(default)]
    pub close: Vec<Option<f64>>,
    #[serde(default)]
    pub volume: Vec<Option<f64>>,
}

impl ChartResponse {
    /// Converts the payload into a table with `(field, symbol)` columns.
    ///
    /// Only two payloads mean "no data": a `Not Found` error and a result
    /// without timestamps. A payload with neither a result nor an error, or
    /// with timestamps but no quote series, is malformed.
    pub fn into_table(self, symbol: &str) -> Result<BarTable, ProviderError> {
        if let Some(error) = self.chart.error {
            if error.code == NOT_FOUND_CODE {
                return Ok(BarTable::default());
            }
            return ApiSnafu {
                message: match error.description {
                    Some(description) => format!("{}: {description}", error.code),
                    None => error.code,
                },
            }
            .fail();
        }

        let Some(result) = self.chart.result.and_then(|r| r.into_iter().next()) else {
            return InternalSnafu {
                message: format!("chart for {symbol} has neither a result nor an error"),
            }
            .fail();
        };
        let timestamps = match result.timestamp {
            Some(ts) if !ts.is_empty() => ts,
            _ => return Ok(BarTable::default()),
        };
        let Some(quote) = result.indicators.quote.into_iter().next() else {
            return InternalSnafu {
                message: format!(
                    "chart for {symbol} has {} timestamps but no quote series",
                    timestamps.len()
                ),
            }
            .fail();
        };

        let index = timestamps
            .iter()
            .map(|secs| {
                DateTime::<Utc>::from_timestamp(*secs, 0).ok_or_else(|| {
                    InternalSnafu {
                        message: format!("timestamp {secs} is out of range"),
                    }
                    .build()
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let rows = index.len();
        let mut table = BarTable::new(index);
        for (field, values) in [
            (OPEN, quote.open),
            (HIGH, quote.high),
            (LOW, quote.low),
            (CLOSE, quote.close),
            (VOLUME, quote.volume),
        ] {
            // Missing series come back as empty arrays; treat them as all blank.
            let values = if values.is_empty() {
                vec![None; rows]
            } else {
                values
            };
            let key = ColumnKey::Composite {
                field: field.to_string(),
                symbol: symbol.to_string(),
            };
            table = table.with_column(key, values).map_err(|e| {
                InternalSnafu {
                    message: e.to_string(),
                }
                .build()
            })?;
        }
        Ok(table)
    }
}
