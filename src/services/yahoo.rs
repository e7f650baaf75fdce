//! Yahoo Finance chart endpoint adapter

use crate::error::{AppError, AppResult};
use crate::models::{Candle, HistoricalSeries, Quote};
use crate::services::http::{build_client, send_with_retry};
use crate::services::market_data::MarketDataProvider;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error, warn};

pub const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";

const SUPPORTED_PERIODS: [&str; 4] = ["1mo", "3mo", "6mo", "1y"];

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Option<ChartIndicators>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    symbol: String,
    regular_market_price: Option<f64>,
    previous_close: Option<f64>,
    chart_previous_close: Option<f64>,
    regular_market_volume: Option<f64>,
    regular_market_day_high: Option<f64>,
    regular_market_day_low: Option<f64>,
    regular_market_day_open: Option<f64>,
    regular_market_time: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<QuoteColumns>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteColumns {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

pub struct YahooFinanceProvider {
    client: Client,
    base_url: String,
}

impl YahooFinanceProvider {
    pub fn new(base_url: Option<String>) -> AppResult<Self> {
        Ok(Self {
            client: build_client()?,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        })
    }

    async fn fetch_chart(&self, symbol: &str, range: &str) -> AppResult<ChartResult> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, symbol);
        let response = send_with_retry("yahoofinance", || {
            self.client
                .get(&url)
                .query(&[("range", range), ("interval", "1d")])
        })
        .await?;

        let envelope: ChartEnvelope = response.json().await?;
        if let Some(err) = envelope.chart.error.filter(|e| !e.is_null()) {
            return Err(AppError::External(format!("yahoofinance: {}", err)));
        }
        envelope
            .chart
            .result
            .and_then(|results| results.into_iter().next())
            .ok_or_else(|| AppError::External(format!("yahoofinance: empty chart for {}", symbol)))
    }
}

fn quote_from_meta(meta: ChartMeta) -> Option<Quote> {
    let price = meta.regular_market_price.filter(|p| p.is_finite() && *p > 0.0)?;
    let previous_close = meta
        .previous_close
        .or(meta.chart_previous_close)
        .filter(|p| *p > 0.0)
        .unwrap_or(price);
    let change = price - previous_close;
    let timestamp = meta
        .regular_market_time
        .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
        .unwrap_or_else(Utc::now);

    Some(Quote {
        symbol: meta.symbol,
        price,
        change,
        change_percent: change / previous_close * 100.0,
        volume: meta.regular_market_volume.unwrap_or(0.0),
        high: meta.regular_market_day_high.unwrap_or(price),
        low: meta.regular_market_day_low.unwrap_or(price),
        open: meta.regular_market_day_open.unwrap_or(previous_close),
        previous_close,
        timestamp,
    })
}

/// Zip the column arrays into bars, dropping rows with any missing field
fn candles_from_chart(timestamps: &[i64], columns: &QuoteColumns) -> Vec<Candle> {
    let column = |values: &[Option<f64>], i: usize| values.get(i).copied().flatten();

    timestamps
        .iter()
        .enumerate()
        .filter_map(|(i, ts)| {
            let timestamp: DateTime<Utc> = Utc.timestamp_opt(*ts, 0).single()?;
            Some(Candle {
                timestamp,
                open: column(&columns.open, i)?,
                high: column(&columns.high, i)?,
                low: column(&columns.low, i)?,
                close: column(&columns.close, i)?,
                volume: column(&columns.volume, i)?,
            })
        })
        .collect()
}

#[async_trait]
impl MarketDataProvider for YahooFinanceProvider {
    fn id(&self) -> &'static str {
        "yahoofinance"
    }

    async fn get_quote(&self, symbol: &str) -> Option<Quote> {
        match self.fetch_chart(symbol, "1d").await {
            Ok(chart) => {
                let quote = quote_from_meta(chart.meta);
                if quote.is_none() {
                    warn!(symbol = %symbol, "Yahoo: chart for {} has no market price", symbol);
                }
                quote
            }
            Err(e) => {
                error!(symbol = %symbol, error = %e, "Yahoo: failed to fetch quote for {}", symbol);
                None
            }
        }
    }

    async fn get_historical(&self, symbol: &str, period: &str) -> Option<HistoricalSeries> {
        let range = if SUPPORTED_PERIODS.contains(&period) {
            period
        } else {
            "1mo"
        };

        let chart = match self.fetch_chart(symbol, range).await {
            Ok(chart) => chart,
            Err(e) => {
                error!(symbol = %symbol, error = %e, "Yahoo: failed to fetch history for {}", symbol);
                return None;
            }
        };

        let columns = chart
            .indicators
            .and_then(|i| i.quote.into_iter().next())
            .unwrap_or_default();
        let candles = candles_from_chart(&chart.timestamp, &columns);
        debug!(
            symbol = %symbol,
            range = %range,
            bars = candles.len(),
            "Yahoo: fetched {} bars for {}",
            candles.len(),
            symbol
        );

        if candles.is_empty() {
            return None;
        }
        Some(HistoricalSeries {
            symbol: symbol.to_string(),
            candles,
        })
    }
}
