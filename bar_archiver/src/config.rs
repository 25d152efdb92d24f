//! Archiver configuration: parsing, normalization, and loading.
//!
//! The TOML file mirrors [`RawConfig`]; every field has a default, so an
//! empty file (or no file at all) yields the stock setup: `QQQ` and `SPY`,
//! five days of 1-minute bars, fired daily at 22:00 UTC.
//!
//! Entrypoints:
//! - Parse + normalize from a TOML string: [`load_config_str`]
//! - Parse + normalize from a file path: [`load_config_path`]
//! - Resolve the file from the CLI flag or environment: [`load_settings`]

use std::{
    num::NonZeroU32,
    path::{Path, PathBuf},
    time::Duration,
};

use bar_ingestor::{
    fetcher::FetchSettings,
    models::{symbol::validate_symbol, timeframe::TimeFrame},
    providers::yahoo_chart::{
        YahooChartConfig,
        params::{SUPPORTED_INTERVALS, max_lookback_days},
        provider::DEFAULT_BASE_URL,
    },
};
use chrono::NaiveTime;
use indexmap::IndexSet;
use serde::Deserialize;
use shared_utils::env::{EnvVarError, optional_env_var};
use thiserror::Error;
use tracing::debug;

use crate::{scheduler::DailyTrigger, tz::parse_tz};

/// Environment variable naming the config file when `--config` is absent.
pub const CONFIG_ENV: &str = "BAR_ARCHIVER_CONFIG";
/// Environment variable overriding `data_dir`.
pub const DATA_DIR_ENV: &str = "BAR_ARCHIVER_DATA_DIR";

/// Errors raised while loading or validating the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        /// File that was requested.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The TOML did not parse or did not match the expected shape.
    #[error("invalid config {origin}: {source}")]
    Parse {
        /// File name, or `<string>` for in-memory input.
        origin: String,
        /// Underlying TOML error.
        source: toml::de::Error,
    },

    /// A value parsed but is out of range or inconsistent.
    #[error("invalid config value for {field}: {message}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },

    /// An environment override could not be read.
    #[error(transparent)]
    Env(#[from] EnvVarError),
}

fn invalid(field: &'static str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        message: message.into(),
    }
}

/// The file as written, before validation.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RawConfig {
    /// Directory holding the per-symbol series files.
    pub data_dir: PathBuf,
    /// Symbols to archive, in processing order.
    pub symbols: Vec<String>,
    /// When the daily job fires.
    pub schedule: RawSchedule,
    /// What each job asks the provider for.
    pub fetch: RawFetch,
    /// HTTP settings for the chart provider.
    pub provider: RawProvider,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            symbols: vec!["QQQ".to_string(), "SPY".to_string()],
            schedule: RawSchedule::default(),
            fetch: RawFetch::default(),
            provider: RawProvider::default(),
        }
    }
}

/// `[schedule]` table.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RawSchedule {
    /// Wall-clock trigger time, `HH:MM`.
    pub trigger_time: String,
    /// IANA zone of `trigger_time`.
    pub timezone: String,
    /// Seconds between checks for a due trigger.
    pub poll_interval_secs: u64,
    /// Run one job immediately at start-up.
    pub run_on_start: bool,
}

impl Default for RawSchedule {
    fn default() -> Self {
        Self {
            trigger_time: "22:00".to_string(),
            timezone: "UTC".to_string(),
            poll_interval_secs: 60,
            run_on_start: true,
        }
    }
}

/// `[fetch]` table.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RawFetch {
    /// Trailing window requested on every run.
    pub window_days: u32,
    /// Bar interval label, e.g. `1m`.
    pub interval: String,
    /// Request pre- and post-market bars.
    pub include_extended_hours: bool,
}

impl Default for RawFetch {
    fn default() -> Self {
        Self {
            window_days: 5,
            interval: "1m".to_string(),
            include_extended_hours: false,
        }
    }
}

/// `[provider]` table.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RawProvider {
    /// Scheme and host of the chart API.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout_secs: u64,
    /// Client-side request budget.
    pub requests_per_minute: u32,
}

impl Default for RawProvider {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
            requests_per_minute: 30,
        }
    }
}

/// Validated schedule settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleSettings {
    /// Daily trigger.
    pub trigger: DailyTrigger,
    /// Poll period of the scheduler loop.
    pub poll_interval: Duration,
    /// Run one job immediately at start-up.
    pub run_on_start: bool,
}

/// Fully validated configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Directory holding the per-symbol series files.
    pub data_dir: PathBuf,
    /// Distinct symbols in first-seen order.
    pub symbols: IndexSet<String>,
    /// Scheduling.
    pub schedule: ScheduleSettings,
    /// Fetch window and interval.
    pub fetch: FetchSettings,
    /// Provider client settings.
    pub provider: YahooChartConfig,
}

/// Validates a raw config.
///
/// What normalization does:
/// - Trims symbols, rejects empty or path-like ones, drops duplicates
///   keeping the first occurrence
/// - Parses the trigger time (`HH:MM`) and time zone
/// - Checks the interval is supported and the window fits its retention
/// - Rejects zero poll interval, timeout and request budget
pub fn normalize_config(raw: RawConfig) -> Result<Settings, ConfigError> {
    let mut symbols = IndexSet::new();
    for raw_symbol in &raw.symbols {
        let symbol = raw_symbol.trim();
        validate_symbol(symbol).map_err(|e| invalid("symbols", e.to_string()))?;
        if !symbols.insert(symbol.to_string()) {
            debug!(symbol, "dropping duplicate symbol");
        }
    }
    if symbols.is_empty() {
        return Err(invalid("symbols", "at least one symbol is required"));
    }

    let time = NaiveTime::parse_from_str(raw.schedule.trigger_time.trim(), "%H:%M")
        .map_err(|e| invalid("schedule.trigger_time", format!("expected HH:MM: {e}")))?;
    let tz = parse_tz(&raw.schedule.timezone)
        .map_err(|e| invalid("schedule.timezone", format!("{e:#}")))?;
    if raw.schedule.poll_interval_secs == 0 {
        return Err(invalid("schedule.poll_interval_secs", "must be greater than zero"));
    }

    let timeframe: TimeFrame = raw
        .fetch
        .interval
        .parse()
        .map_err(|e| invalid("fetch.interval", format!("{e}")))?;
    if !SUPPORTED_INTERVALS.contains(&timeframe.to_string().as_str()) {
        return Err(invalid(
            "fetch.interval",
            format!("{timeframe} is not one of {}", SUPPORTED_INTERVALS.join(", ")),
        ));
    }
    if raw.fetch.window_days == 0 {
        return Err(invalid("fetch.window_days", "must be greater than zero"));
    }
    if let Some(max) = max_lookback_days(&timeframe) {
        if raw.fetch.window_days > max {
            return Err(invalid(
                "fetch.window_days",
                format!("{timeframe} bars are only kept for {max} days"),
            ));
        }
    }

    if raw.provider.timeout_secs == 0 {
        return Err(invalid("provider.timeout_secs", "must be greater than zero"));
    }
    let requests_per_minute = NonZeroU32::new(raw.provider.requests_per_minute)
        .ok_or_else(|| invalid("provider.requests_per_minute", "must be greater than zero"))?;

    Ok(Settings {
        data_dir: raw.data_dir,
        symbols,
        schedule: ScheduleSettings {
            trigger: DailyTrigger::new(time, tz),
            poll_interval: Duration::from_secs(raw.schedule.poll_interval_secs),
            run_on_start: raw.schedule.run_on_start,
        },
        fetch: FetchSettings {
            window_days: raw.fetch.window_days,
            timeframe,
            include_extended_hours: raw.fetch.include_extended_hours,
        },
        provider: YahooChartConfig {
            base_url: raw.provider.base_url.trim().to_string(),
            timeout: Duration::from_secs(raw.provider.timeout_secs),
            requests_per_minute,
        },
    })
}

fn parse_raw(s: &str, origin: &str) -> Result<RawConfig, ConfigError> {
    toml::from_str(s).map_err(|source| ConfigError::Parse {
        origin: origin.to_string(),
        source,
    })
}

/// Parses and normalizes a TOML string.
pub fn load_config_str(s: &str) -> Result<Settings, ConfigError> {
    normalize_config(parse_raw(s, "<string>")?)
}

/// Reads, parses and normalizes a TOML file.
pub fn load_config_path(path: &Path) -> Result<Settings, ConfigError> {
    normalize_config(read_raw(path)?)
}

fn read_raw(path: &Path) -> Result<RawConfig, ConfigError> {
    let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_raw(&s, &path.display().to_string())
}

/// Loads the settings the binary runs with.
///
/// The file is `cli_path` if given, else `$BAR_ARCHIVER_CONFIG` if set,
/// else none (built-in defaults). `$BAR_ARCHIVER_DATA_DIR` then overrides
/// `data_dir`.
pub fn load_settings(cli_path: Option<&Path>) -> Result<Settings, ConfigError> {
    let path = match cli_path {
        Some(path) => Some(path.to_path_buf()),
        None => optional_env_var(CONFIG_ENV)?.map(PathBuf::from),
    };

    let mut raw = match &path {
        Some(path) => read_raw(path)?,
        None => RawConfig::default(),
    };
    if let Some(dir) = optional_env_var(DATA_DIR_ENV)? {
        raw.data_dir = PathBuf::from(dir);
    }
    normalize_config(raw)
}

#[cfg(test)]
mod tests {
    use std::env;

    use bar_ingestor::models::timeframe::TimeFrameUnit;
    use chrono::{TimeZone, Utc};
    use serial_test::serial;

    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = load_config_str("").unwrap();
        assert_eq!(settings.data_dir, PathBuf::from("data"));
        assert_eq!(
            settings.symbols.iter().collect::<Vec<_>>(),
            vec!["QQQ", "SPY"]
        );
        assert_eq!(settings.schedule.poll_interval, Duration::from_secs(60));
        assert!(settings.schedule.run_on_start);
        assert_eq!(settings.fetch, FetchSettings::default());
        assert_eq!(settings.provider.requests_per_minute.get(), 30);

        let after = Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap();
        assert_eq!(
            settings.schedule.trigger.next_after(after),
            Utc.with_ymd_and_hms(2024, 6, 3, 22, 0, 0).unwrap()
        );
    }

    #[test]
    fn full_file_parses() {
        let settings = load_config_str(
            r#"
            data_dir = "/var/lib/bars"
            symbols = [" spy ", "QQQ", "spy", "IWM"]

            [schedule]
            trigger_time = "16:30"
            timezone = "America/New_York"
            poll_interval_secs = 15
            run_on_start = false

            [fetch]
            window_days = 30
            interval = "5m"
            include_extended_hours = true

            [provider]
            base_url = "http://127.0.0.1:9000"
            timeout_secs = 5
            requests_per_minute = 10
            "#,
        )
        .unwrap();

        assert_eq!(
            settings.symbols.iter().collect::<Vec<_>>(),
            vec!["spy", "QQQ", "IWM"]
        );
        assert_eq!(settings.schedule.trigger.time, NaiveTime::from_hms_opt(16, 30, 0).unwrap());
        assert_eq!(settings.schedule.trigger.tz, chrono_tz::America::New_York);
        assert!(!settings.schedule.run_on_start);
        assert_eq!(settings.fetch.timeframe.unit, TimeFrameUnit::Minute);
        assert_eq!(settings.fetch.timeframe.amount, 5);
        assert_eq!(settings.fetch.window_days, 30);
        assert_eq!(settings.provider.timeout, Duration::from_secs(5));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = load_config_str("symbol = [\"QQQ\"]").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));

        let err = load_config_str("[schedule]\nat = \"22:00\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn invalid_values_name_the_field() {
        let cases = [
            ("symbols = []", "symbols"),
            ("symbols = [\"  \"]", "symbols"),
            ("symbols = [\"../x\"]", "symbols"),
            ("[schedule]\ntrigger_time = \"25:00\"", "schedule.trigger_time"),
            ("[schedule]\ntimezone = \"Nowhere/Land\"", "schedule.timezone"),
            ("[schedule]\npoll_interval_secs = 0", "schedule.poll_interval_secs"),
            ("[fetch]\nwindow_days = 8", "fetch.window_days"),
            ("[fetch]\nwindow_days = 0", "fetch.window_days"),
            ("[fetch]\ninterval = \"3m\"", "fetch.interval"),
            ("[fetch]\ninterval = \"fast\"", "fetch.interval"),
            ("[provider]\ntimeout_secs = 0", "provider.timeout_secs"),
            ("[provider]\nrequests_per_minute = 0", "provider.requests_per_minute"),
        ];
        for (toml, expected) in cases {
            match load_config_str(toml) {
                Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, expected, "{toml}"),
                other => panic!("expected Invalid for {toml:?}, got {other:?}"),
            }
        }
    }

    #[test]
    #[serial]
    fn cli_path_wins_over_env() {
        let dir = tempfile::tempdir().unwrap();
        let from_flag = dir.path().join("flag.toml");
        let from_env = dir.path().join("env.toml");
        std::fs::write(&from_flag, "symbols = [\"IWM\"]").unwrap();
        std::fs::write(&from_env, "symbols = [\"DIA\"]").unwrap();

        unsafe {
            env::set_var(CONFIG_ENV, &from_env);
            env::remove_var(DATA_DIR_ENV);
        }
        let settings = load_settings(Some(&from_flag)).unwrap();
        assert!(settings.symbols.contains("IWM"));

        let settings = load_settings(None).unwrap();
        assert!(settings.symbols.contains("DIA"));

        unsafe {
            env::remove_var(CONFIG_ENV);
        }
        let settings = load_settings(None).unwrap();
        assert!(settings.symbols.contains("QQQ"));
    }

    #[test]
    #[serial]
    fn data_dir_env_overrides_file() {
        unsafe {
            env::remove_var(CONFIG_ENV);
            env::set_var(DATA_DIR_ENV, "/srv/bars");
        }
        let settings = load_settings(None).unwrap();
        assert_eq!(settings.data_dir, PathBuf::from("/srv/bars"));
        unsafe {
            env::remove_var(DATA_DIR_ENV);
        }
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = load_config_path(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
