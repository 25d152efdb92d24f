use std::{num::NonZeroU32, time::Duration};

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::{header, Client, StatusCode, Url};
use snafu::ResultExt;
use tracing::debug;

use crate::{
    models::{request_params::BarsRequestParams, table::BarTable},
    providers::{
        yahoo_chart::{params::construct_params, response::ChartResponse},
        ApiSnafu, ClientBuildSnafu, DataProvider, DecodeSnafu, InternalSnafu, InvalidBaseUrlSnafu,
        InvalidHeaderSnafu, InvalidSettingSnafu, ProviderError, ProviderInitError, ReqwestSnafu,
    },
};

pub const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";

// The endpoint rejects requests without a browser-like agent.
const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

#[derive(Debug, Clone)]
pub struct YahooChartConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub requests_per_minute: NonZeroU32,
}

impl Default for YahooChartConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            requests_per_minute: nonzero!(30u32),
        }
    }
}

pub struct YahooChartProvider {
    client: Client,
    base_url: Url,
    limiter: DefaultDirectRateLimiter,
}

impl YahooChartProvider {
    /// Creates a new chart provider.
    pub fn new(config: YahooChartConfig) -> Result<Self, ProviderInitError> {
        if config.timeout.is_zero() {
            return InvalidSettingSnafu {
                message: "timeout must be greater than zero",
            }
            .fail();
        }

        let base_url = Url::parse(&config.base_url).map_err(|e| {
            InvalidBaseUrlSnafu {
                url: config.base_url.clone(),
                message: e.to_string(),
            }
            .build()
        })?;
        if base_url.cannot_be_a_base() {
            return InvalidBaseUrlSnafu {
                url: config.base_url,
                message: "URL cannot carry a path",
            }
            .fail();
        }

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_str(USER_AGENT).context(InvalidHeaderSnafu)?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .context(ClientBuildSnafu)?;

        Ok(Self {
            client,
            base_url,
            limiter: RateLimiter::direct(Quota::per_minute(config.requests_per_minute)),
        })
    }

    fn endpoint(&self, symbol: &str) -> Result<Url, ProviderError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                InternalSnafu {
                    message: format!("base URL {} cannot carry a path", self.base_url),
                }
                .build()
            })?
            .pop_if_empty()
            .extend(["v8", "finance", "chart", symbol]);
        Ok(url)
    }
}

#[async_trait]
impl DataProvider for YahooChartProvider {
    async fn fetch_bars(&self, params: BarsRequestParams) -> Result<BarTable, ProviderError> {
        let query = construct_params(&params)?;
        let url = self.endpoint(&params.symbol)?;

        self.limiter.until_ready().await;
        debug!(symbol = %params.symbol, %url, "requesting chart");
        let response = self
            .client
            .get(url)
            .query(&query)
            .send()
            .await
            .context(ReqwestSnafu)?;

        let status = response.status();
        let body = response.text().await.context(ReqwestSnafu)?;
        decode_chart(status, &body, &params.symbol)
    }
}

/// Turns a chart response body into a table.
///
/// Error statuses usually still carry a chart payload with an error code,
/// which decides the outcome. An error status without one is an API error.
fn decode_chart(status: StatusCode, body: &str, symbol: &str) -> Result<BarTable, ProviderError> {
    let parsed = serde_json::from_str::<ChartResponse>(body);
    if !status.is_success() {
        return match parsed {
            Ok(chart) if chart.chart.error.is_some() => chart.into_table(symbol),
            _ => ApiSnafu {
                message: format!("HTTP {status}: {}", truncate(body, 200)),
            }
            .fail(),
        };
    }
    parsed.context(DecodeSnafu)?.into_table(symbol)
}

fn truncate(body: &str, max: usize) -> &str {
    match body.char_indices().nth(max) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
