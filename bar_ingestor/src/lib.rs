//! Fetching and archiving of intraday OHLCV bars.
//!
//! [`fetcher::Fetcher`] asks a [`providers::DataProvider`] for the recent
//! bars of one symbol, and [`io::archive::CsvArchive`] merges them into that
//! symbol's series file.

pub mod fetcher;
pub mod io;
pub mod models;
pub mod providers;
