use crate::{
    models::{
        request_params::BarsRequestParams,
        timeframe::{TimeFrame, TimeFrameUnit},
    },
    providers::{ProviderError, ValidationSnafu},
};

/// Interval labels the chart endpoint understands.
pub const SUPPORTED_INTERVALS: &[&str] = &[
    "1m", "2m", "5m", "15m", "30m", "60m", "90m", "1h", "1d", "5d", "1wk", "1mo", "3mo",
];

/// How far back 1-minute bars are retained.
pub const MINUTE_RETENTION_DAYS: u32 = 7;

/// How far back the other intraday intervals (2m..90m, 1h) are retained.
pub const INTRADAY_RETENTION_DAYS: u32 = 60;

/// Returns the interval query value for `timeframe`, or a validation error.
pub fn validate_timeframe(timeframe: &TimeFrame) -> Result<String, ProviderError> {
    let label = timeframe.to_string();
    if SUPPORTED_INTERVALS.contains(&label.as_str()) {
        Ok(label)
    } else {
        ValidationSnafu {
            message: format!("unsupported interval {label}"),
        }
        .fail()
    }
}

/// Maximum look-back, in days, the endpoint serves for `timeframe`.
///
/// `None` means the history is not restricted.
pub fn max_lookback_days(timeframe: &TimeFrame) -> Option<u32> {
    match timeframe.unit {
        TimeFrameUnit::Minute if timeframe.amount == 1 => Some(MINUTE_RETENTION_DAYS),
        TimeFrameUnit::Minute | TimeFrameUnit::Hour => Some(INTRADAY_RETENTION_DAYS),
        _ => None,
    }
}

/// Checks a window of `days` against the retention of `timeframe`.
pub fn validate_window(timeframe: &TimeFrame, days: u32) -> Result<(), ProviderError> {
    if days == 0 {
        return ValidationSnafu {
            message: "window must cover at least one day",
        }
        .fail();
    }
    if let Some(max) = max_lookback_days(timeframe) {
        if days > max {
            return ValidationSnafu {
                message: format!(
                    "{timeframe} bars are only kept for {max} days, requested {days}"
                ),
            }
            .fail();
        }
    }
    Ok(())
}

/// Builds the query string for a chart request.
pub fn construct_params(
    params: &BarsRequestParams,
) -> Result<Vec<(String, String)>, ProviderError> {
    let interval = validate_timeframe(&params.timeframe)?;
    validate_window(&params.timeframe, params.window_days)?;

    Ok(vec![
        ("interval".to_string(), interval),
        ("range".to_string(), format!("{}d", params.window_days)),
        (
            "includePrePost".to_string(),
            params.include_extended_hours.to_string(),
        ),
    ])
}
