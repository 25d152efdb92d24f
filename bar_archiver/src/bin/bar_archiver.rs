use std::path::PathBuf;

use anyhow::{Context, Result};
use bar_archiver::{config::load_settings, job::IngestJob, logging::init_logging, scheduler::Scheduler};
use bar_ingestor::{
    fetcher::Fetcher, io::archive::CsvArchive, providers::yahoo_chart::YahooChartProvider,
};
use chrono::Utc;
use clap::Parser;
use tracing::info;

#[derive(Parser)]
#[command(version, about = "Archive intraday bars into per-symbol CSV files")]
struct Cli {
    /// TOML config file (falls back to $BAR_ARCHIVER_CONFIG, then defaults).
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging()?;

    let settings = load_settings(cli.config.as_deref()).context("failed to load configuration")?;
    info!(
        data_dir = %settings.data_dir.display(),
        symbols = ?settings.symbols,
        interval = %settings.fetch.timeframe,
        window_days = settings.fetch.window_days,
        "configuration loaded"
    );

    let provider =
        YahooChartProvider::new(settings.provider.clone()).context("failed to create provider")?;
    let job = IngestJob::new(
        Fetcher::new(Box::new(provider), settings.fetch.clone()),
        CsvArchive::new(&settings.data_dir),
        settings.symbols.iter().cloned(),
    );

    let now = Utc::now();
    let mut scheduler = Scheduler::new(
        job,
        settings.schedule.trigger,
        settings.schedule.poll_interval,
        now,
    );

    if settings.schedule.run_on_start {
        scheduler.start(now).await;
    }
    scheduler.run_forever().await;
    Ok(())
}
