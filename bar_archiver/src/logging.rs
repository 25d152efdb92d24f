//! Structured logging initialization.

use anyhow::Context;
use shared_utils::env::optional_env_var;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Selects JSON lines instead of human-readable output when set to `json`.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Output style of the log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One human-readable line per event.
    Text,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Reads the format from `LOG_FORMAT`; anything but `json` means text.
    pub fn from_env() -> anyhow::Result<Self> {
        let format = optional_env_var(LOG_FORMAT_ENV)?;
        Ok(match format.as_deref() {
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        })
    }
}

/// Installs the global subscriber writing to stdout.
///
/// The filter comes from `RUST_LOG` and defaults to `info`.
pub fn init_logging() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match LogFormat::from_env()? {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(std::io::stdout))
            .try_init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stdout))
            .try_init(),
    }
    .context("failed to install tracing subscriber")
}
