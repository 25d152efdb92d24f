use crate::models::timeframe::TimeFrame;

/// Universal parameters for requesting time-series bar data from a market data provider.
///
/// Validation of the allowed timeframe/window combinations is performed by each
/// provider implementation, according to its own retention rules.
#[derive(Clone, Debug)]
pub struct BarsRequestParams {
    /// Symbol to request (e.g., `"QQQ"`, `"^GSPC"`).
    pub symbol: String,

    /// The time interval for each bar (e.g., 1 minute, 1 day).
    pub timeframe: TimeFrame,

    /// The most recent `window_days` of history, as counted by the provider.
    ///
    /// Providers usually count trading days here, so a 5-day window spans a
    /// weekend without coming back short.
    pub window_days: u32,

    /// Include pre-market and after-hours bars when the provider has them.
    pub include_extended_hours: bool,
}
