use bar_ingestor::{
    models::{
        request_params::BarsRequestParams,
        table::{normalize_columns, Normalization},
        timeframe::TimeFrame,
    },
    providers::{
        yahoo_chart::{YahooChartConfig, YahooChartProvider},
        DataProvider,
    },
};

#[tokio::test]
#[ignore]
async fn fetches_recent_minute_bars() {
    // Hits the public endpoint; run with `--ignored` when network access is available.
    let provider = YahooChartProvider::new(YahooChartConfig::default())
        .expect("Failed to create YahooChartProvider");

    let params = BarsRequestParams {
        symbol: "SPY".to_string(),
        timeframe: TimeFrame::minutes(1).unwrap(),
        window_days: 5,
        include_extended_hours: false,
    };

    let result = provider.fetch_bars(params).await;
    assert!(result.is_ok(), "fetch_bars returned an error: {:?}", result.err());

    let table = result.unwrap();
    assert!(!table.is_empty(), "Expected at least one bar for SPY");

    let flat = match normalize_columns(table) {
        Normalization::Collapsed(flat) => flat,
        other => panic!("expected nested labels to collapse, got {other:?}"),
    };
    let bars = flat.to_bars("SPY").unwrap();
    assert!(bars.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
}

#[tokio::test]
#[ignore]
async fn unknown_symbol_is_empty() {
    let provider = YahooChartProvider::new(YahooChartConfig::default()).unwrap();
    let params = BarsRequestParams {
        symbol: "ZZZZNOTATICKER".to_string(),
        timeframe: TimeFrame::minutes(1).unwrap(),
        window_days: 5,
        include_extended_hours: false,
    };
    let table = provider.fetch_bars(params).await.unwrap();
    assert!(table.is_empty());
}
