//! Persistence store interface and its implementations

pub mod memory;
pub mod postgres;

use crate::error::AppResult;
use crate::models::{
    Candle, ChatSubscription, NewChatSubscription, NewPrediction, PredictionEvaluation,
    PredictionRecord, PricePoint, Timeframe, TrackedSymbol,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// Relational storage for symbols, prices, predictions and chat subscriptions.
///
/// Each call runs inside its own scoped session; nothing is held between calls.
#[async_trait]
pub trait Store: Send + Sync {
    async fn ping(&self) -> AppResult<()>;

    async fn list_active_symbols(&self) -> AppResult<Vec<TrackedSymbol>>;

    async fn get_symbol(&self, ticker: &str) -> AppResult<Option<TrackedSymbol>>;

    /// Create the symbol, or reactivate it if it exists
    async fn upsert_symbol(&self, ticker: &str, name: Option<&str>) -> AppResult<TrackedSymbol>;

    /// Flag a symbol inactive; its history is kept
    async fn deactivate_symbol(&self, ticker: &str) -> AppResult<TrackedSymbol>;

    /// Insert bars keyed by (symbol, timestamp). Existing keys are left untouched.
    /// Returns the number of new rows.
    async fn upsert_price_points(&self, symbol_id: i64, candles: &[Candle]) -> AppResult<usize>;

    /// Newest first
    async fn latest_prices(&self, symbol_id: i64, limit: usize) -> AppResult<Vec<PricePoint>>;

    /// Latest point with timestamp <= `at`
    async fn price_at_or_before(
        &self,
        symbol_id: i64,
        at: DateTime<Utc>,
    ) -> AppResult<Option<PricePoint>>;

    /// Oldest first
    async fn price_history(
        &self,
        symbol_id: i64,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<PricePoint>>;

    async fn count_prices(&self, symbol_id: i64) -> AppResult<usize>;

    async fn insert_prediction(&self, prediction: &NewPrediction) -> AppResult<PredictionRecord>;

    async fn get_prediction(&self, id: i64) -> AppResult<Option<PredictionRecord>>;

    async fn latest_prediction_at(&self, symbol_id: i64) -> AppResult<Option<DateTime<Utc>>>;

    /// Unevaluated predictions of `timeframe` created at or before `cutoff`
    async fn due_predictions(
        &self,
        timeframe: Timeframe,
        cutoff: DateTime<Utc>,
    ) -> AppResult<Vec<PredictionRecord>>;

    /// Apply evaluations as one unit. Records already evaluated are skipped.
    /// Returns the number of updated records.
    async fn apply_evaluations(&self, evaluations: &[PredictionEvaluation]) -> AppResult<usize>;

    /// Predictions created at or after `since`, newest first, optionally for one symbol
    async fn predictions_since(
        &self,
        symbol_id: Option<i64>,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<PredictionRecord>>;

    async fn delete_prices_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64>;

    async fn delete_predictions_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64>;

    /// Fails with NotFound when no prediction has this id
    async fn delete_prediction(&self, id: i64) -> AppResult<()>;

    async fn active_chats(&self) -> AppResult<Vec<ChatSubscription>>;

    async fn upsert_chat(&self, chat: &NewChatSubscription) -> AppResult<ChatSubscription>;

    async fn deactivate_chat(&self, chat_id: &str) -> AppResult<()>;
}

pub(crate) fn normalize_ticker(ticker: &str) -> String {
    ticker.trim().to_uppercase()
}
