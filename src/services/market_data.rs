//! Market data provider interface and provider selection

use crate::config::ProviderSettings;
use crate::error::{AppError, AppResult};
use crate::models::{HistoricalSeries, Quote};
use crate::services::yahoo::YahooFinanceProvider;
use async_trait::async_trait;

/// Source of quotes and daily history. Failures are logged by the provider
/// and surface as `None`.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    fn id(&self) -> &'static str;

    /// Latest quote for a symbol
    async fn get_quote(&self, symbol: &str) -> Option<Quote>;

    /// Daily bars over `period` ("1mo", "3mo", "6mo", "1y")
    async fn get_historical(&self, symbol: &str, period: &str) -> Option<HistoricalSeries>;
}

/// Configured market data provider
pub enum MarketDataSource {
    Yahoo(YahooFinanceProvider),
}

impl MarketDataSource {
    /// Select the provider named by `market_data_provider`
    pub fn from_settings(settings: &ProviderSettings) -> AppResult<Self> {
        match settings.market_data_provider.as_str() {
            "yahoofinance" | "yahoo" => Ok(MarketDataSource::Yahoo(YahooFinanceProvider::new(
                settings.market_data_base_url.clone(),
            )?)),
            other => Err(AppError::Configuration(format!(
                "unknown market data provider '{}'",
                other
            ))),
        }
    }

    fn inner(&self) -> &dyn MarketDataProvider {
        match self {
            MarketDataSource::Yahoo(provider) => provider,
        }
    }
}

#[async_trait]
impl MarketDataProvider for MarketDataSource {
    fn id(&self) -> &'static str {
        self.inner().id()
    }

    async fn get_quote(&self, symbol: &str) -> Option<Quote> {
        self.inner().get_quote(symbol).await
    }

    async fn get_historical(&self, symbol: &str, period: &str) -> Option<HistoricalSeries> {
        self.inner().get_historical(symbol, period).await
    }
}
