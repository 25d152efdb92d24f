//! Yahoo Finance chart API (`/v8/finance/chart/{symbol}`).
//!
//! No credentials are needed. Minute bars are only retained for a short
//! trailing window, which [`params::validate_window`] enforces before any
//! request is sent.

pub mod params;
pub mod provider;
pub mod response;

pub use provider::{YahooChartConfig, YahooChartProvider};
