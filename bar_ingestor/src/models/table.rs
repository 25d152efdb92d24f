//! Column-labelled bar tables, as handed back by providers.
//!
//! Some providers label columns with a nested `(field, symbol)` scheme even
//! when a single symbol was requested. [`normalize_columns`] collapses that
//! scheme to plain field names, and leaves the table as it was when the
//! collapse would be lossy. [`BarTable::to_bars`] copes with either shape.

use std::{collections::HashSet, fmt};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::bar::Bar;

pub const OPEN: &str = "Open";
pub const HIGH: &str = "High";
pub const LOW: &str = "Low";
pub const CLOSE: &str = "Close";
pub const VOLUME: &str = "Volume";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableError {
    #[error("column {column} has {found} values but the index has {expected} rows")]
    LengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },

    #[error("no {field} column for the requested symbol")]
    MissingColumn { field: &'static str },

    #[error("more than one {field} column matches the requested symbol")]
    AmbiguousColumn { field: &'static str },
}

/// Label of one table column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnKey {
    /// Plain field name, e.g. `Close`.
    Field(String),
    /// Provider-native nested label, e.g. `(Close, SPY)`.
    Composite { field: String, symbol: String },
}

impl ColumnKey {
    pub fn field(&self) -> &str {
        match self {
            ColumnKey::Field(field) => field,
            ColumnKey::Composite { field, .. } => field,
        }
    }

    fn matches(&self, field: &str, symbol: &str) -> bool {
        match self {
            ColumnKey::Field(f) => f.eq_ignore_ascii_case(field),
            ColumnKey::Composite { field: f, symbol: s } => {
                f.eq_ignore_ascii_case(field) && s == symbol
            }
        }
    }
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnKey::Field(field) => write!(f, "{field}"),
            ColumnKey::Composite { field, symbol } => write!(f, "({field}, {symbol})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub key: ColumnKey,
    pub values: Vec<Option<f64>>,
}

/// A timestamp index plus any number of labelled numeric columns.
///
/// Every column has exactly one value slot per index entry; `None` marks a
/// value the provider left blank.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BarTable {
    index: Vec<DateTime<Utc>>,
    columns: Vec<Column>,
}

impl BarTable {
    pub fn new(index: Vec<DateTime<Utc>>) -> Self {
        Self {
            index,
            columns: Vec::new(),
        }
    }

    pub fn with_column(
        mut self,
        key: ColumnKey,
        values: Vec<Option<f64>>,
    ) -> Result<Self, TableError> {
        if values.len() != self.index.len() {
            return Err(TableError::LengthMismatch {
                column: key.to_string(),
                expected: self.index.len(),
                found: values.len(),
            });
        }
        self.columns.push(Column { key, values });
        Ok(self)
    }

    /// Builds a table from bars, labelling columns `(field, symbol)` when a
    /// symbol is given and with plain field names otherwise.
    pub fn from_bars(bars: &[Bar], symbol: Option<&str>) -> Self {
        let key = |field: &str| match symbol {
            Some(symbol) => ColumnKey::Composite {
                field: field.to_string(),
                symbol: symbol.to_string(),
            },
            None => ColumnKey::Field(field.to_string()),
        };
        let column = |field: &str, get: fn(&Bar) -> f64| Column {
            key: key(field),
            values: bars.iter().map(|b| Some(get(b))).collect(),
        };

        Self {
            index: bars.iter().map(|b| b.timestamp).collect(),
            columns: vec![
                column(OPEN, |b| b.open),
                column(HIGH, |b| b.high),
                column(LOW, |b| b.low),
                column(CLOSE, |b| b.close),
                column(VOLUME, |b| b.volume),
            ],
        }
    }

    pub fn index(&self) -> &[DateTime<Utc>] {
        &self.index
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Whether any column still carries a `(field, symbol)` label.
    pub fn is_nested(&self) -> bool {
        self.columns
            .iter()
            .any(|c| matches!(c.key, ColumnKey::Composite { .. }))
    }

    /// Extracts the OHLCV bars of `symbol`.
    ///
    /// Rows missing any of open/high/low/close are skipped; providers pad
    /// minutes without trades that way. A missing volume counts as zero.
    pub fn to_bars(&self, symbol: &str) -> Result<Vec<Bar>, TableError> {
        let open = self.require(OPEN, symbol)?;
        let high = self.require(HIGH, symbol)?;
        let low = self.require(LOW, symbol)?;
        let close = self.require(CLOSE, symbol)?;
        let volume = self.find(VOLUME, symbol)?;

        let bars = self
            .index
            .iter()
            .enumerate()
            .filter_map(|(row, ts)| {
                let value = |col: &Column| col.values[row].filter(|v| v.is_finite());
                Some(Bar {
                    timestamp: *ts,
                    open: value(open)?,
                    high: value(high)?,
                    low: value(low)?,
                    close: value(close)?,
                    volume: volume.and_then(value).unwrap_or(0.0),
                })
            })
            .collect();
        Ok(bars)
    }

    fn find(&self, field: &'static str, symbol: &str) -> Result<Option<&Column>, TableError> {
        let mut matches = self.columns.iter().filter(|c| c.key.matches(field, symbol));
        let first = matches.next();
        if matches.next().is_some() {
            return Err(TableError::AmbiguousColumn { field });
        }
        Ok(first)
    }

    fn require(&self, field: &'static str, symbol: &str) -> Result<&Column, TableError> {
        self.find(field, symbol)?
            .ok_or(TableError::MissingColumn { field })
    }
}

/// Result of [`normalize_columns`].
#[derive(Debug, Clone, PartialEq)]
pub enum Normalization {
    /// No nested labels were present.
    AlreadyFlat(BarTable),
    /// Nested labels were collapsed to their field names.
    Collapsed(BarTable),
    /// Collapsing was not possible; the table is returned as it came in.
    Unchanged { table: BarTable, reason: String },
}

/// Collapses `(field, symbol)` column labels to plain field names.
///
/// The collapse is refused when two columns would end up with the same field
/// name (case-insensitively), which happens when the table holds more than
/// one symbol.
pub fn normalize_columns(table: BarTable) -> Normalization {
    if !table.is_nested() {
        return Normalization::AlreadyFlat(table);
    }

    let mut seen = HashSet::new();
    let duplicate = table
        .columns
        .iter()
        .map(|c| c.key.field())
        .find(|field| !seen.insert(field.to_ascii_lowercase()))
        .map(str::to_string);
    if let Some(field) = duplicate {
        let reason = format!("collapsing would produce a duplicate {field} column");
        return Normalization::Unchanged { table, reason };
    }

    let BarTable { index, columns } = table;
    let columns = columns
        .into_iter()
        .map(|c| Column {
            key: match c.key {
                ColumnKey::Composite { field, .. } => ColumnKey::Field(field),
                flat => flat,
            },
            values: c.values,
        })
        .collect();
    Normalization::Collapsed(BarTable { index, columns })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn ts(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 13, minute, 0).unwrap()
    }

    fn bars() -> Vec<Bar> {
        vec![
            Bar::new(ts(30), 480.0, 481.0, 479.5, 480.5, 120_000.0),
            Bar::new(ts(31), 480.5, 482.0, 480.1, 481.7, 98_000.0),
        ]
    }

    #[test]
    fn nested_single_symbol_collapses() {
        let table = BarTable::from_bars(&bars(), Some("QQQ"));
        assert!(table.is_nested());

        let flat = match normalize_columns(table) {
            Normalization::Collapsed(flat) => flat,
            other => panic!("expected a collapsed table, got {other:?}"),
        };
        assert!(!flat.is_nested());
        let fields: Vec<_> = flat.columns().iter().map(|c| c.key.to_string()).collect();
        assert_eq!(fields, vec!["Open", "High", "Low", "Close", "Volume"]);
        assert_eq!(flat.to_bars("QQQ").unwrap(), bars());
    }

    #[test]
    fn flat_table_passes_through() {
        let table = BarTable::from_bars(&bars(), None);
        assert!(matches!(normalize_columns(table), Normalization::AlreadyFlat(_)));
    }

    #[test]
    fn multi_symbol_table_is_left_unchanged() {
        let qqq = BarTable::from_bars(&bars(), Some("QQQ"));
        let spy = BarTable::from_bars(&bars(), Some("SPY"));
        let mut table = qqq.clone();
        for column in spy.columns() {
            table = table.with_column(column.key.clone(), column.values.clone()).unwrap();
        }

        match normalize_columns(table.clone()) {
            Normalization::Unchanged { table: same, reason } => {
                assert_eq!(same, table);
                assert!(reason.contains("duplicate"));
            }
            other => panic!("expected Unchanged, got {other:?}"),
        }

        // the unchanged table still yields the bars of the requested symbol
        assert_eq!(table.to_bars("SPY").unwrap(), bars());
    }

    #[test]
    fn rows_with_missing_prices_are_dropped() {
        let table = BarTable::new(vec![ts(30), ts(31), ts(32)])
            .with_column(ColumnKey::Field("open".into()), vec![Some(1.0), None, Some(3.0)])
            .unwrap()
            .with_column(ColumnKey::Field("high".into()), vec![Some(1.0), None, Some(3.0)])
            .unwrap()
            .with_column(ColumnKey::Field("low".into()), vec![Some(1.0), None, Some(3.0)])
            .unwrap()
            .with_column(ColumnKey::Field("close".into()), vec![Some(1.0), None, Some(f64::NAN)])
            .unwrap()
            .with_column(ColumnKey::Field("volume".into()), vec![None, None, Some(3.0)])
            .unwrap();

        let bars = table.to_bars("QQQ").unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].timestamp, ts(30));
        assert_eq!(bars[0].volume, 0.0);
    }

    #[test]
    fn missing_close_column_is_an_error() {
        let table = BarTable::new(vec![ts(30)])
            .with_column(ColumnKey::Field(OPEN.into()), vec![Some(1.0)])
            .unwrap();
        assert_eq!(
            table.to_bars("QQQ"),
            Err(TableError::MissingColumn { field: HIGH })
        );
    }

    #[test]
    fn column_length_must_match_index() {
        let err = BarTable::new(vec![ts(30), ts(31)])
            .with_column(ColumnKey::Field(OPEN.into()), vec![Some(1.0)])
            .unwrap_err();
        assert!(matches!(err, TableError::LengthMismatch { expected: 2, found: 1, .. }));
    }
}
