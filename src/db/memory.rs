//! In-memory store used by tests and by the binaries when no database is configured

use super::{normalize_ticker, Store};
use crate::error::{AppError, AppResult};
use crate::models::{
    Candle, ChatSubscription, NewChatSubscription, NewPrediction, PredictionEvaluation,
    PredictionRecord, PricePoint, Timeframe, TrackedSymbol,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

#[derive(Default)]
struct State {
    next_id: i64,
    symbols: BTreeMap<i64, TrackedSymbol>,
    /// Keyed by (symbol id, timestamp) so iteration is ordered per symbol
    prices: BTreeMap<(i64, DateTime<Utc>), PricePoint>,
    predictions: BTreeMap<i64, PredictionRecord>,
    chats: HashMap<String, ChatSubscription>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn ticker_of(&self, symbol_id: i64) -> String {
        self.symbols
            .get(&symbol_id)
            .map(|s| s.ticker.clone())
            .unwrap_or_default()
    }

    fn prices_of(&self, symbol_id: i64) -> impl DoubleEndedIterator<Item = &PricePoint> {
        self.prices
            .range((symbol_id, DateTime::<Utc>::MIN_UTC)..=(symbol_id, DateTime::<Utc>::MAX_UTC))
            .map(|(_, p)| p)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }

    async fn list_active_symbols(&self) -> AppResult<Vec<TrackedSymbol>> {
        let state = self.state.read().await;
        Ok(state.symbols.values().filter(|s| s.is_active).cloned().collect())
    }

    async fn get_symbol(&self, ticker: &str) -> AppResult<Option<TrackedSymbol>> {
        let ticker = normalize_ticker(ticker);
        let state = self.state.read().await;
        Ok(state.symbols.values().find(|s| s.ticker == ticker).cloned())
    }

    async fn upsert_symbol(&self, ticker: &str, name: Option<&str>) -> AppResult<TrackedSymbol> {
        let ticker = normalize_ticker(ticker);
        if ticker.is_empty() {
            return Err(AppError::Validation("ticker must not be empty".to_string()));
        }
        let mut state = self.state.write().await;
        let now = Utc::now();

        if let Some(existing) = state.symbols.values_mut().find(|s| s.ticker == ticker) {
            existing.is_active = true;
            if let Some(name) = name {
                existing.name = Some(name.to_string());
            }
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        let id = state.next_id();
        let symbol = TrackedSymbol {
            id,
            ticker,
            name: name.map(str::to_string),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        state.symbols.insert(id, symbol.clone());
        Ok(symbol)
    }

    async fn deactivate_symbol(&self, ticker: &str) -> AppResult<TrackedSymbol> {
        let ticker = normalize_ticker(ticker);
        let mut state = self.state.write().await;
        let symbol = state
            .symbols
            .values_mut()
            .find(|s| s.ticker == ticker)
            .ok_or_else(|| AppError::NotFound(format!("symbol {}", ticker)))?;
        symbol.is_active = false;
        symbol.updated_at = Utc::now();
        Ok(symbol.clone())
    }

    async fn upsert_price_points(&self, symbol_id: i64, candles: &[Candle]) -> AppResult<usize> {
        let mut state = self.state.write().await;
        if !state.symbols.contains_key(&symbol_id) {
            return Err(AppError::NotFound(format!("symbol id {}", symbol_id)));
        }

        let mut inserted = 0;
        for candle in candles {
            let key = (symbol_id, candle.timestamp);
            if state.prices.contains_key(&key) {
                continue;
            }
            let id = state.next_id();
            state.prices.insert(
                key,
                PricePoint {
                    id,
                    symbol_id,
                    timestamp: candle.timestamp,
                    open: candle.open,
                    high: candle.high,
                    low: candle.low,
                    close: candle.close,
                    volume: candle.volume,
                },
            );
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn latest_prices(&self, symbol_id: i64, limit: usize) -> AppResult<Vec<PricePoint>> {
        let state = self.state.read().await;
        Ok(state.prices_of(symbol_id).rev().take(limit).cloned().collect())
    }

    async fn price_at_or_before(
        &self,
        symbol_id: i64,
        at: DateTime<Utc>,
    ) -> AppResult<Option<PricePoint>> {
        let state = self.state.read().await;
        let point = state
            .prices_of(symbol_id)
            .rev()
            .find(|p| p.timestamp <= at)
            .cloned();
        Ok(point)
    }

    async fn price_history(
        &self,
        symbol_id: i64,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<PricePoint>> {
        let state = self.state.read().await;
        Ok(state
            .prices_of(symbol_id)
            .filter(|p| p.timestamp >= since)
            .cloned()
            .collect())
    }

    async fn count_prices(&self, symbol_id: i64) -> AppResult<usize> {
        let state = self.state.read().await;
        Ok(state.prices_of(symbol_id).count())
    }

    async fn insert_prediction(&self, prediction: &NewPrediction) -> AppResult<PredictionRecord> {
        let mut state = self.state.write().await;
        if !state.symbols.contains_key(&prediction.symbol_id) {
            return Err(AppError::NotFound(format!(
                "symbol id {}",
                prediction.symbol_id
            )));
        }

        let id = state.next_id();
        let outcome = &prediction.outcome;
        let record = PredictionRecord {
            id,
            symbol_id: prediction.symbol_id,
            ticker: state.ticker_of(prediction.symbol_id),
            timeframe: prediction.timeframe,
            prediction_type: outcome.prediction_type.as_str().to_string(),
            confidence: outcome.confidence,
            target_price: outcome.target_price,
            actual_price: None,
            accuracy_score: None,
            is_evaluated: false,
            ai_provider: prediction.ai_provider.clone(),
            model_version: Some(outcome.model_version.clone()),
            reasoning: Some(outcome.reasoning.clone()),
            signals: outcome.signals.clone(),
            created_at: prediction.created_at,
            updated_at: prediction.created_at,
        };
        state.predictions.insert(id, record.clone());
        Ok(record)
    }

    async fn get_prediction(&self, id: i64) -> AppResult<Option<PredictionRecord>> {
        Ok(self.state.read().await.predictions.get(&id).cloned())
    }

    async fn latest_prediction_at(&self, symbol_id: i64) -> AppResult<Option<DateTime<Utc>>> {
        let state = self.state.read().await;
        Ok(state
            .predictions
            .values()
            .filter(|p| p.symbol_id == symbol_id)
            .map(|p| p.created_at)
            .max())
    }

    async fn due_predictions(
        &self,
        timeframe: Timeframe,
        cutoff: DateTime<Utc>,
    ) -> AppResult<Vec<PredictionRecord>> {
        let state = self.state.read().await;
        Ok(state
            .predictions
            .values()
            .filter(|p| !p.is_evaluated && p.timeframe == timeframe && p.created_at <= cutoff)
            .cloned()
            .collect())
    }

    async fn apply_evaluations(&self, evaluations: &[PredictionEvaluation]) -> AppResult<usize> {
        let mut state = self.state.write().await;

        // Ids deleted since selection update nothing
        let mut updated = 0;
        for evaluation in evaluations {
            if let Some(record) = state.predictions.get_mut(&evaluation.prediction_id) {
                if record.is_evaluated {
                    continue;
                }
                record.actual_price = Some(evaluation.actual_price);
                record.accuracy_score = Some(evaluation.accuracy_score);
                record.is_evaluated = true;
                record.updated_at = evaluation.evaluated_at;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn predictions_since(
        &self,
        symbol_id: Option<i64>,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<PredictionRecord>> {
        let state = self.state.read().await;
        let mut records: Vec<PredictionRecord> = state
            .predictions
            .values()
            .filter(|p| symbol_id.map_or(true, |id| p.symbol_id == id) && p.created_at >= since)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(records)
    }

    async fn delete_prices_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let mut state = self.state.write().await;
        let before = state.prices.len();
        state.prices.retain(|(_, ts), _| *ts >= cutoff);
        Ok((before - state.prices.len()) as u64)
    }

    async fn delete_predictions_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let mut state = self.state.write().await;
        let before = state.predictions.len();
        state.predictions.retain(|_, p| p.created_at >= cutoff);
        Ok((before - state.predictions.len()) as u64)
    }

    async fn delete_prediction(&self, id: i64) -> AppResult<()> {
        let mut state = self.state.write().await;
        state
            .predictions
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("prediction {}", id)))
    }

    async fn active_chats(&self) -> AppResult<Vec<ChatSubscription>> {
        let state = self.state.read().await;
        let mut chats: Vec<ChatSubscription> =
            state.chats.values().filter(|c| c.is_active).cloned().collect();
        chats.sort_by_key(|c| c.id);
        Ok(chats)
    }

    async fn upsert_chat(&self, chat: &NewChatSubscription) -> AppResult<ChatSubscription> {
        let mut state = self.state.write().await;
        let id = match state.chats.get(&chat.chat_id) {
            Some(existing) => existing.id,
            None => state.next_id(),
        };
        let created_at = state
            .chats
            .get(&chat.chat_id)
            .map(|c| c.created_at)
            .unwrap_or_else(Utc::now);
        let subscription = ChatSubscription {
            id,
            chat_id: chat.chat_id.clone(),
            is_active: true,
            daily_summary: chat.daily_summary,
            price_alerts: chat.price_alerts,
            prediction_alerts: chat.prediction_alerts,
            price_change_threshold: chat.price_change_threshold,
            created_at,
        };
        state
            .chats
            .insert(chat.chat_id.clone(), subscription.clone());
        Ok(subscription)
    }

    async fn deactivate_chat(&self, chat_id: &str) -> AppResult<()> {
        let mut state = self.state.write().await;
        let chat = state
            .chats
            .get_mut(chat_id)
            .ok_or_else(|| AppError::NotFound(format!("chat {}", chat_id)))?;
        chat.is_active = false;
        Ok(())
    }
}
