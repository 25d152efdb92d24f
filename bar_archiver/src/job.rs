//! The daily ingest job: fetch every configured symbol and archive it.
//!
//! Symbols are processed one after another. Whatever happens to one symbol
//! (no data, a provider error, an unreadable or unwritable file) is recorded
//! in its [`SymbolOutcome`] and the job moves on to the next.

use std::path::PathBuf;

use async_trait::async_trait;
use bar_ingestor::{
    fetcher::{FetchOutcome, Fetcher},
    io::{
        archive::{CsvArchive, MergeOutcome},
        series_file::SeriesLoadError,
        sink::{DataSink, SinkError},
    },
    providers::ProviderError,
};
use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::scheduler::ScheduledJob;

/// What happened to one symbol during a run.
#[derive(Debug)]
pub enum SymbolOutcome {
    /// The provider had no bars; nothing was written.
    EmptySkip,
    /// The fetch failed; nothing was written.
    FetchFailedSkip {
        /// Provider failure.
        error: ProviderError,
    },
    /// A new series file was written.
    Created {
        /// Rows in the new file.
        rows: usize,
    },
    /// The existing series file was merged and replaced.
    Merged {
        /// Rows in the file after the merge.
        rows: usize,
        /// Timestamps that were not in the file before.
        added: usize,
    },
    /// The existing file could not be loaded; the fresh bars went to a
    /// backup sibling and the original file was left alone.
    MergeFailedBackupWritten {
        /// Path of the backup file.
        backup: PathBuf,
        /// Why the existing file could not be loaded.
        cause: SeriesLoadError,
    },
    /// Writing failed; the archive is unchanged for this symbol.
    WriteFailed {
        /// Sink failure.
        error: SinkError,
    },
}

impl SymbolOutcome {
    /// Whether the archive now holds the fetched bars in the canonical file.
    pub fn is_success(&self) -> bool {
        matches!(self, SymbolOutcome::Created { .. } | SymbolOutcome::Merged { .. })
    }

    /// Whether the symbol was skipped because there was nothing to store.
    pub fn is_skip(&self) -> bool {
        matches!(self, SymbolOutcome::EmptySkip)
    }
}

impl From<MergeOutcome> for SymbolOutcome {
    fn from(outcome: MergeOutcome) -> Self {
        match outcome {
            MergeOutcome::Created { rows, .. } => SymbolOutcome::Created { rows },
            MergeOutcome::Merged { stats, .. } => SymbolOutcome::Merged {
                rows: stats.combined,
                added: stats.added,
            },
            MergeOutcome::FailedWithBackup { backup, cause, .. } => {
                SymbolOutcome::MergeFailedBackupWritten { backup, cause }
            }
        }
    }
}

/// Outcome of one symbol, tagged with the symbol.
#[derive(Debug)]
pub struct SymbolReport {
    /// Symbol as configured.
    pub symbol: String,
    /// What happened to it.
    pub outcome: SymbolOutcome,
}

/// Summary of one run over all symbols.
#[derive(Debug)]
pub struct JobReport {
    /// When the run began.
    pub started_at: DateTime<Utc>,
    /// When the last symbol finished.
    pub finished_at: DateTime<Utc>,
    /// One entry per symbol, in processing order.
    pub symbols: Vec<SymbolReport>,
}

impl JobReport {
    /// Symbols whose canonical file was created or merged.
    pub fn succeeded(&self) -> usize {
        self.symbols.iter().filter(|r| r.outcome.is_success()).count()
    }

    /// Symbols the provider had no data for.
    pub fn skipped(&self) -> usize {
        self.symbols.iter().filter(|r| r.outcome.is_skip()).count()
    }

    /// Symbols that hit a fetch, load or write failure.
    pub fn failed(&self) -> usize {
        self.symbols.len() - self.succeeded() - self.skipped()
    }

    /// Outcome recorded for `symbol`, if it was processed.
    pub fn outcome(&self, symbol: &str) -> Option<&SymbolOutcome> {
        self.symbols
            .iter()
            .find(|r| r.symbol == symbol)
            .map(|r| &r.outcome)
    }
}

/// Fetches and archives a fixed list of symbols.
pub struct IngestJob<S = CsvArchive> {
    fetcher: Fetcher,
    sink: S,
    symbols: Vec<String>,
}

impl<S> IngestJob<S>
where
    S: DataSink<Output = MergeOutcome>,
{
    /// Creates a job over `symbols`, processed in the given order.
    pub fn new(fetcher: Fetcher, sink: S, symbols: impl IntoIterator<Item = String>) -> Self {
        Self {
            fetcher,
            sink,
            symbols: symbols.into_iter().collect(),
        }
    }

    /// Processes every symbol once.
    pub async fn run(&self) -> JobReport {
        let started_at = Utc::now();
        info!(symbols = self.symbols.len(), "ingest job started");

        let mut reports = Vec::with_capacity(self.symbols.len());
        for symbol in &self.symbols {
            let outcome = self.process(symbol).await;
            reports.push(SymbolReport {
                symbol: symbol.clone(),
                outcome,
            });
        }

        let report = JobReport {
            started_at,
            finished_at: Utc::now(),
            symbols: reports,
        };
        info!(
            succeeded = report.succeeded(),
            skipped = report.skipped(),
            failed = report.failed(),
            elapsed_ms = (report.finished_at - report.started_at).num_milliseconds(),
            "ingest job finished"
        );
        report
    }

    async fn process(&self, symbol: &str) -> SymbolOutcome {
        let series = match self.fetcher.fetch(symbol).await {
            Ok(FetchOutcome::Data(series)) => series,
            Ok(FetchOutcome::Empty) => {
                info!(symbol, "no data found, skipping");
                return SymbolOutcome::EmptySkip;
            }
            Err(e) => {
                error!(symbol, error = %e, "error downloading data, skipping");
                return SymbolOutcome::FetchFailedSkip { error: e };
            }
        };

        match self.sink.write(&series) {
            Ok(outcome) => {
                match &outcome {
                    MergeOutcome::Created { path, rows } => {
                        info!(symbol, path = %path.display(), rows, "data saved to new file");
                    }
                    MergeOutcome::Merged { path, stats } => {
                        info!(
                            symbol,
                            path = %path.display(),
                            rows = stats.combined,
                            added = stats.added,
                            "data saved"
                        );
                    }
                    MergeOutcome::FailedWithBackup { backup, cause, .. } => {
                        warn!(
                            symbol,
                            backup = %backup.display(),
                            error = %cause,
                            "error merging data, fresh data saved to backup"
                        );
                    }
                }
                outcome.into()
            }
            Err(e) => {
                error!(symbol, error = %e, "failed to save data");
                SymbolOutcome::WriteFailed { error: e }
            }
        }
    }
}

#[async_trait]
impl<S> ScheduledJob for IngestJob<S>
where
    S: DataSink<Output = MergeOutcome> + Send + Sync,
{
    type Report = JobReport;

    async fn run(&self) -> JobReport {
        IngestJob::run(self).await
    }
}
