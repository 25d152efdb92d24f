//! Provider abstraction for market data sources.
//!
//! This module defines the [`DataProvider`] trait, the single seam between the
//! archiver and whichever vendor serves the bars (currently the Yahoo chart
//! API, see [`yahoo_chart`]).
//!
//! Providers report "no data for this symbol/window" as an empty
//! [`BarTable`], never as an error, so callers can tell a delisted symbol apart
//! from a network or API failure.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use bar_ingestor::models::{request_params::BarsRequestParams, table::BarTable};
//! use bar_ingestor::providers::{DataProvider, ProviderError};
//!
//! struct NothingProvider;
//!
//! #[async_trait]
//! impl DataProvider for NothingProvider {
//!     async fn fetch_bars(&self, _params: BarsRequestParams) -> Result<BarTable, ProviderError> {
//!         Ok(BarTable::default())
//!     }
//! }
//! ```

pub mod yahoo_chart;

use async_trait::async_trait;
use snafu::{Backtrace, Snafu};

use crate::models::{request_params::BarsRequestParams, table::BarTable};

/// Trait for fetching time-series bar data from a market data provider.
///
/// The trait is object safe; the runtime holds providers as
/// `Box<dyn DataProvider + Send + Sync>`.
#[async_trait]
pub trait DataProvider {
    /// Fetches bars for one symbol.
    ///
    /// # Returns
    ///
    /// * `Ok(table)` - possibly empty when the provider has nothing for the symbol/window.
    /// * `Err(ProviderError)` - transport, API, validation or decoding failure.
    async fn fetch_bars(&self, params: BarsRequestParams) -> Result<BarTable, ProviderError>;
}

/// Errors that can occur during the creation of a provider instance
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderInitError {
    /// failed to init reqwest client
    #[snafu(display("Failed to build HTTP client: {source}"))]
    ClientBuild {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// A configured header value contains invalid characters.
    #[snafu(display("Invalid header value: {source}"))]
    InvalidHeader {
        source: reqwest::header::InvalidHeaderValue,
        backtrace: Backtrace,
    },

    /// The base URL does not parse or cannot carry a path.
    #[snafu(display("Invalid base URL {url:?}: {message}"))]
    InvalidBaseUrl {
        url: String,
        message: String,
        backtrace: Backtrace,
    },

    /// A rate or timeout setting is zero.
    #[snafu(display("Invalid provider setting: {message}"))]
    InvalidSetting {
        message: String,
        backtrace: Backtrace,
    },
}

/// Errors that can occur within a `DataProvider` implementation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderError {
    /// An error during an API request (e.g., network failure, timeout).
    #[snafu(display("API request failed: {source}"))]
    Reqwest {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// The provider's API returned an error payload or a non-success status.
    #[snafu(display("API error: {message}"))]
    Api {
        message: String,
        backtrace: Backtrace,
    },

    /// The request parameters were invalid for this specific provider.
    #[snafu(display("Invalid parameters for provider: {message}"))]
    Validation {
        message: String,
        backtrace: Backtrace,
    },

    /// The response body could not be decoded.
    #[snafu(display("Malformed provider response: {source}"))]
    Decode {
        source: serde_json::Error,
        backtrace: Backtrace,
    },

    /// An internal error occurred while processing data within the provider.
    #[snafu(display("Internal provider error: {message}"))]
    Internal {
        message: String,
        backtrace: Backtrace,
    },
}
