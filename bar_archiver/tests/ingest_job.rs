use std::{
    collections::HashMap,
    fs, io,
    path::Path,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use bar_archiver::job::{IngestJob, SymbolOutcome};
use bar_ingestor::{
    fetcher::{FetchSettings, Fetcher},
    io::{archive::CsvArchive, series_file::read_series},
    models::{bar::Bar, request_params::BarsRequestParams, table::BarTable},
    providers::{ApiSnafu, DataProvider, ProviderError},
};
use chrono::{DateTime, TimeZone, Utc};

fn ts(n: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 3, 13, 30 + n, 0).unwrap()
}

fn bars(range: std::ops::RangeInclusive<u32>, close: f64) -> Vec<Bar> {
    range
        .map(|n| Bar::new(ts(n), close, close + 1.0, close - 1.0, close, 1000.0))
        .collect()
}

enum Reply {
    Bars(Vec<Bar>),
    Fail(&'static str),
}

/// Answers from a per-symbol script; symbols without an entry get no data.
#[derive(Default)]
struct ScriptedProvider {
    replies: Mutex<HashMap<String, Reply>>,
}

impl ScriptedProvider {
    fn with(self, symbol: &str, reply: Reply) -> Self {
        self.replies.lock().unwrap().insert(symbol.to_string(), reply);
        self
    }
}

#[async_trait]
impl DataProvider for ScriptedProvider {
    async fn fetch_bars(&self, params: BarsRequestParams) -> Result<BarTable, ProviderError> {
        match self.replies.lock().unwrap().get(&params.symbol) {
            Some(Reply::Bars(bars)) => Ok(BarTable::from_bars(bars, Some(&params.symbol))),
            Some(Reply::Fail(message)) => ApiSnafu { message: *message }.fail(),
            None => Ok(BarTable::default()),
        }
    }
}

fn job(provider: ScriptedProvider, data_dir: &Path, symbols: &[&str]) -> IngestJob {
    IngestJob::new(
        Fetcher::new(Box::new(provider), FetchSettings::default()),
        CsvArchive::new(data_dir),
        symbols.iter().map(|s| s.to_string()),
    )
}

/// Log output captured from the current thread's subscriber.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn closes(path: &Path) -> Vec<f64> {
    read_series(path).unwrap().iter().map(|b| b.close).collect()
}

#[tokio::test]
async fn first_run_creates_file_with_fetched_rows() {
    let dir = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::default().with("QQQ", Reply::Bars(bars(1..=5, 100.0)));

    let report = job(provider, dir.path(), &["QQQ"]).run().await;

    assert!(matches!(report.outcome("QQQ"), Some(SymbolOutcome::Created { rows: 5 })));
    let stored = read_series(&dir.path().join("QQQ_1m_data.csv")).unwrap();
    assert_eq!(stored, bars(1..=5, 100.0));
}

#[tokio::test]
async fn overlapping_run_merges_and_fresh_close_wins() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("QQQ_1m_data.csv");
    bar_ingestor::io::series_file::write_series(&path, &bars(1..=3, 100.0)).unwrap();

    let provider = ScriptedProvider::default().with("QQQ", Reply::Bars(bars(3..=5, 200.0)));
    let report = job(provider, dir.path(), &["QQQ"]).run().await;

    assert!(matches!(
        report.outcome("QQQ"),
        Some(SymbolOutcome::Merged { rows: 5, added: 2 })
    ));
    assert_eq!(closes(&path), vec![100.0, 100.0, 200.0, 200.0, 200.0]);
}

#[tokio::test]
async fn empty_fetch_leaves_no_file() {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer({
            let logs = logs.clone();
            move || logs.clone()
        })
        .with_ansi(false)
        .without_time()
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let dir = tempfile::tempdir().unwrap();
    let report = job(ScriptedProvider::default(), dir.path(), &["ZZZZ"]).run().await;

    assert!(matches!(report.outcome("ZZZZ"), Some(SymbolOutcome::EmptySkip)));
    assert_eq!(report.skipped(), 1);
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);

    let logs = logs.contents();
    let no_data: Vec<_> = logs.lines().filter(|l| l.contains("no data found")).collect();
    assert_eq!(no_data.len(), 1, "{logs}");
    assert!(no_data[0].contains("ZZZZ"), "{logs}");
}

#[tokio::test]
async fn corrupt_file_is_kept_and_fresh_rows_go_to_backup() {
    let dir = tempfile::tempdir().unwrap();
    let canonical = dir.path().join("SPY_1m_data.csv");
    fs::write(&canonical, "<html>rate limited</html>\n").unwrap();

    let provider = ScriptedProvider::default().with("SPY", Reply::Bars(bars(1..=5, 50.0)));
    let report = job(provider, dir.path(), &["SPY"]).run().await;

    match report.outcome("SPY") {
        Some(SymbolOutcome::MergeFailedBackupWritten { backup, .. }) => {
            assert_eq!(backup, &dir.path().join("SPY_1m_data.csv.new"));
            assert_eq!(read_series(backup).unwrap(), bars(1..=5, 50.0));
        }
        other => panic!("expected a backup, got {other:?}"),
    }
    assert_eq!(fs::read_to_string(&canonical).unwrap(), "<html>rate limited</html>\n");
    assert_eq!(report.failed(), 1);
}

#[tokio::test]
async fn failures_do_not_stop_later_symbols() {
    let dir = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::default()
        .with("QQQ", Reply::Fail("HTTP 429 Too Many Requests"))
        .with("SPY", Reply::Bars(bars(1..=2, 10.0)));

    let report = job(provider, dir.path(), &["QQQ", "ZZZZ", "SPY"]).run().await;

    let symbols: Vec<_> = report.symbols.iter().map(|r| r.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["QQQ", "ZZZZ", "SPY"]);
    match report.outcome("QQQ") {
        Some(SymbolOutcome::FetchFailedSkip { error }) => {
            assert!(error.to_string().contains("429"));
        }
        other => panic!("expected a fetch failure, got {other:?}"),
    }
    assert!(matches!(report.outcome("SPY"), Some(SymbolOutcome::Created { rows: 2 })));
    assert!(!dir.path().join("QQQ_1m_data.csv").exists());
    assert_eq!((report.succeeded(), report.skipped(), report.failed()), (1, 1, 1));
}

#[tokio::test]
async fn unwritable_data_dir_is_reported_per_symbol() {
    let dir = tempfile::tempdir().unwrap();
    // a regular file where the data directory should be
    let blocked = dir.path().join("data");
    fs::write(&blocked, "").unwrap();

    let provider = ScriptedProvider::default()
        .with("QQQ", Reply::Bars(bars(1..=2, 1.0)))
        .with("SPY", Reply::Bars(bars(1..=2, 1.0)));
    let report = job(provider, &blocked, &["QQQ", "SPY"]).run().await;

    for symbol in ["QQQ", "SPY"] {
        assert!(
            matches!(report.outcome(symbol), Some(SymbolOutcome::WriteFailed { .. })),
            "{symbol}: {:?}",
            report.outcome(symbol)
        );
    }
    assert_eq!(report.failed(), 2);
}

#[tokio::test]
async fn repeated_runs_are_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("QQQ_1m_data.csv");

    for _ in 0..2 {
        let provider = ScriptedProvider::default().with("QQQ", Reply::Bars(bars(1..=5, 7.0)));
        job(provider, dir.path(), &["QQQ"]).run().await;
    }
    assert_eq!(read_series(&path).unwrap(), bars(1..=5, 7.0));
}
