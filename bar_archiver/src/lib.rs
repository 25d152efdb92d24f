//! Scheduled archiving of intraday bars into per-symbol CSV files.
//!
//! The binary loads [`config::Settings`], builds an [`job::IngestJob`] over
//! the configured symbols and hands it to a [`scheduler::Scheduler`] that runs
//! it at start-up and then once a day.

#![deny(missing_docs)]

pub mod config;
pub mod job;
pub mod logging;
pub mod scheduler;
pub mod tz;
