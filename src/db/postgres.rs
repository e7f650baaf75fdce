//! PostgreSQL store for symbols, price points, predictions and chat subscriptions

use super::{normalize_ticker, Store};
use crate::error::{AppError, AppResult};
use crate::models::{
    Candle, ChatSubscription, NewChatSubscription, NewPrediction, PredictionEvaluation,
    PredictionRecord, PricePoint, Timeframe, TrackedSymbol,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tokio_postgres::{Client, NoTls, Row};
use tracing::{error, info};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS tracked_symbols (
    id BIGSERIAL PRIMARY KEY,
    ticker TEXT NOT NULL UNIQUE,
    name TEXT,
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS price_points (
    id BIGSERIAL PRIMARY KEY,
    symbol_id BIGINT NOT NULL REFERENCES tracked_symbols(id) ON DELETE CASCADE,
    ts TIMESTAMPTZ NOT NULL,
    open DOUBLE PRECISION NOT NULL,
    high DOUBLE PRECISION NOT NULL,
    low DOUBLE PRECISION NOT NULL,
    close DOUBLE PRECISION NOT NULL,
    volume DOUBLE PRECISION NOT NULL,
    UNIQUE (symbol_id, ts)
);

CREATE TABLE IF NOT EXISTS predictions (
    id BIGSERIAL PRIMARY KEY,
    symbol_id BIGINT NOT NULL REFERENCES tracked_symbols(id) ON DELETE CASCADE,
    timeframe TEXT NOT NULL,
    prediction_type TEXT NOT NULL,
    confidence DOUBLE PRECISION NOT NULL,
    target_price DOUBLE PRECISION,
    actual_price DOUBLE PRECISION,
    accuracy_score DOUBLE PRECISION,
    is_evaluated BOOLEAN NOT NULL DEFAULT FALSE,
    ai_provider TEXT NOT NULL,
    model_version TEXT,
    reasoning TEXT,
    signals TEXT[] NOT NULL DEFAULT '{}',
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
);

CREATE INDEX IF NOT EXISTS predictions_pending_idx
    ON predictions (timeframe, created_at) WHERE NOT is_evaluated;

CREATE TABLE IF NOT EXISTS chat_subscriptions (
    id BIGSERIAL PRIMARY KEY,
    chat_id TEXT NOT NULL UNIQUE,
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    daily_summary BOOLEAN NOT NULL DEFAULT TRUE,
    price_alerts BOOLEAN NOT NULL DEFAULT TRUE,
    prediction_alerts BOOLEAN NOT NULL DEFAULT TRUE,
    price_change_threshold DOUBLE PRECISION NOT NULL DEFAULT 5.0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
";

const PREDICTION_COLUMNS: &str = "p.id, p.symbol_id, s.ticker, p.timeframe, p.prediction_type,
    p.confidence, p.target_price, p.actual_price, p.accuracy_score, p.is_evaluated,
    p.ai_provider, p.model_version, p.reasoning, p.signals, p.created_at, p.updated_at";

const PRICE_COLUMNS: &str = "id, symbol_id, ts, open, high, low, close, volume";

pub struct PostgresStore {
    client: Arc<Mutex<Client>>,
}

impl PostgresStore {
    /// Connect, spawn the connection driver and create the schema
    pub async fn connect(database_url: &str) -> AppResult<Self> {
        let (client, connection) = tokio_postgres::connect(database_url, NoTls)
            .await
            .map_err(|e| AppError::Persistence(format!("failed to connect to PostgreSQL: {}", e)))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(error = %e, "PostgreSQL connection error");
            }
        });

        let store = Self {
            client: Arc::new(Mutex::new(client)),
        };
        store.init_schema().await?;
        info!("PostgreSQL store ready");
        Ok(store)
    }

    async fn init_schema(&self) -> AppResult<()> {
        let session = self.session().await;
        session
            .batch_execute(SCHEMA)
            .await
            .map_err(|e| AppError::Persistence(format!("failed to create schema: {}", e)))
    }

    /// Scoped session; released when the guard drops
    async fn session(&self) -> MutexGuard<'_, Client> {
        self.client.lock().await
    }
}

fn symbol_from_row(row: &Row) -> AppResult<TrackedSymbol> {
    Ok(TrackedSymbol {
        id: row.try_get("id")?,
        ticker: row.try_get("ticker")?,
        name: row.try_get("name")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn price_from_row(row: &Row) -> AppResult<PricePoint> {
    Ok(PricePoint {
        id: row.try_get("id")?,
        symbol_id: row.try_get("symbol_id")?,
        timestamp: row.try_get("ts")?,
        open: row.try_get("open")?,
        high: row.try_get("high")?,
        low: row.try_get("low")?,
        close: row.try_get("close")?,
        volume: row.try_get("volume")?,
    })
}

fn prediction_from_row(row: &Row) -> AppResult<PredictionRecord> {
    let timeframe: String = row.try_get("timeframe")?;
    Ok(PredictionRecord {
        id: row.try_get("id")?,
        symbol_id: row.try_get("symbol_id")?,
        ticker: row.try_get("ticker")?,
        timeframe: timeframe.parse()?,
        prediction_type: row.try_get("prediction_type")?,
        confidence: row.try_get("confidence")?,
        target_price: row.try_get("target_price")?,
        actual_price: row.try_get("actual_price")?,
        accuracy_score: row.try_get("accuracy_score")?,
        is_evaluated: row.try_get("is_evaluated")?,
        ai_provider: row.try_get("ai_provider")?,
        model_version: row.try_get("model_version")?,
        reasoning: row.try_get("reasoning")?,
        signals: row.try_get("signals")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn chat_from_row(row: &Row) -> AppResult<ChatSubscription> {
    Ok(ChatSubscription {
        id: row.try_get("id")?,
        chat_id: row.try_get("chat_id")?,
        is_active: row.try_get("is_active")?,
        daily_summary: row.try_get("daily_summary")?,
        price_alerts: row.try_get("price_alerts")?,
        prediction_alerts: row.try_get("prediction_alerts")?,
        price_change_threshold: row.try_get("price_change_threshold")?,
        created_at: row.try_get("created_at")?,
    })
}

fn collect<T>(rows: &[Row], map: fn(&Row) -> AppResult<T>) -> AppResult<Vec<T>> {
    rows.iter().map(map).collect()
}

#[async_trait]
impl Store for PostgresStore {
    async fn ping(&self) -> AppResult<()> {
        let session = self.session().await;
        session.simple_query("SELECT 1").await?;
        Ok(())
    }

    async fn list_active_symbols(&self) -> AppResult<Vec<TrackedSymbol>> {
        let session = self.session().await;
        let rows = session
            .query(
                "SELECT * FROM tracked_symbols WHERE is_active ORDER BY ticker",
                &[],
            )
            .await?;
        collect(&rows, symbol_from_row)
    }

    async fn get_symbol(&self, ticker: &str) -> AppResult<Option<TrackedSymbol>> {
        let ticker = normalize_ticker(ticker);
        let session = self.session().await;
        let row = session
            .query_opt("SELECT * FROM tracked_symbols WHERE ticker = $1", &[&ticker])
            .await?;
        row.as_ref().map(symbol_from_row).transpose()
    }

    async fn upsert_symbol(&self, ticker: &str, name: Option<&str>) -> AppResult<TrackedSymbol> {
        let ticker = normalize_ticker(ticker);
        if ticker.is_empty() {
            return Err(AppError::Validation("ticker must not be empty".to_string()));
        }
        let session = self.session().await;
        let row = session
            .query_one(
                "INSERT INTO tracked_symbols (ticker, name) VALUES ($1, $2)
                 ON CONFLICT (ticker) DO UPDATE
                 SET is_active = TRUE,
                     name = COALESCE(EXCLUDED.name, tracked_symbols.name),
                     updated_at = now()
                 RETURNING *",
                &[&ticker, &name],
            )
            .await?;
        symbol_from_row(&row)
    }

    async fn deactivate_symbol(&self, ticker: &str) -> AppResult<TrackedSymbol> {
        let ticker = normalize_ticker(ticker);
        let session = self.session().await;
        let row = session
            .query_opt(
                "UPDATE tracked_symbols SET is_active = FALSE, updated_at = now()
                 WHERE ticker = $1 RETURNING *",
                &[&ticker],
            )
            .await?
            .ok_or_else(|| AppError::NotFound(format!("symbol {}", ticker)))?;
        symbol_from_row(&row)
    }

    async fn upsert_price_points(&self, symbol_id: i64, candles: &[Candle]) -> AppResult<usize> {
        if candles.is_empty() {
            return Ok(0);
        }
        let mut session = self.session().await;
        let tx = session.transaction().await?;
        let statement = tx
            .prepare(
                "INSERT INTO price_points (symbol_id, ts, open, high, low, close, volume)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)
                 ON CONFLICT (symbol_id, ts) DO NOTHING",
            )
            .await?;

        let mut inserted = 0;
        for candle in candles {
            inserted += tx
                .execute(
                    &statement,
                    &[
                        &symbol_id,
                        &candle.timestamp,
                        &candle.open,
                        &candle.high,
                        &candle.low,
                        &candle.close,
                        &candle.volume,
                    ],
                )
                .await? as usize;
        }
        tx.commit().await?;
        Ok(inserted)
    }

    async fn latest_prices(&self, symbol_id: i64, limit: usize) -> AppResult<Vec<PricePoint>> {
        let limit = limit as i64;
        let session = self.session().await;
        let rows = session
            .query(
                &format!(
                    "SELECT {} FROM price_points WHERE symbol_id = $1 ORDER BY ts DESC LIMIT $2",
                    PRICE_COLUMNS
                ),
                &[&symbol_id, &limit],
            )
            .await?;
        collect(&rows, price_from_row)
    }

    async fn price_at_or_before(
        &self,
        symbol_id: i64,
        at: DateTime<Utc>,
    ) -> AppResult<Option<PricePoint>> {
        let session = self.session().await;
        let row = session
            .query_opt(
                &format!(
                    "SELECT {} FROM price_points WHERE symbol_id = $1 AND ts <= $2
                     ORDER BY ts DESC LIMIT 1",
                    PRICE_COLUMNS
                ),
                &[&symbol_id, &at],
            )
            .await?;
        row.as_ref().map(price_from_row).transpose()
    }

    async fn price_history(
        &self,
        symbol_id: i64,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<PricePoint>> {
        let session = self.session().await;
        let rows = session
            .query(
                &format!(
                    "SELECT {} FROM price_points WHERE symbol_id = $1 AND ts >= $2 ORDER BY ts ASC",
                    PRICE_COLUMNS
                ),
                &[&symbol_id, &since],
            )
            .await?;
        collect(&rows, price_from_row)
    }

    async fn count_prices(&self, symbol_id: i64) -> AppResult<usize> {
        let session = self.session().await;
        let row = session
            .query_one(
                "SELECT COUNT(*) FROM price_points WHERE symbol_id = $1",
                &[&symbol_id],
            )
            .await?;
        let count: i64 = row.try_get(0)?;
        Ok(count as usize)
    }

    async fn insert_prediction(&self, prediction: &NewPrediction) -> AppResult<PredictionRecord> {
        let outcome = &prediction.outcome;
        let session = self.session().await;
        let row = session
            .query_one(
                &format!(
                    "WITH p AS (
                        INSERT INTO predictions (symbol_id, timeframe, prediction_type, confidence,
                            target_price, ai_provider, model_version, reasoning, signals,
                            created_at, updated_at)
                        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
                        RETURNING *
                    )
                    SELECT {} FROM p JOIN tracked_symbols s ON s.id = p.symbol_id",
                    PREDICTION_COLUMNS
                ),
                &[
                    &prediction.symbol_id,
                    &prediction.timeframe.as_str(),
                    &outcome.prediction_type.as_str(),
                    &outcome.confidence,
                    &outcome.target_price,
                    &prediction.ai_provider,
                    &outcome.model_version,
                    &outcome.reasoning,
                    &outcome.signals,
                    &prediction.created_at,
                ],
            )
            .await?;
        prediction_from_row(&row)
    }

    async fn get_prediction(&self, id: i64) -> AppResult<Option<PredictionRecord>> {
        let session = self.session().await;
        let row = session
            .query_opt(
                &format!(
                    "SELECT {} FROM predictions p JOIN tracked_symbols s ON s.id = p.symbol_id
                     WHERE p.id = $1",
                    PREDICTION_COLUMNS
                ),
                &[&id],
            )
            .await?;
        row.as_ref().map(prediction_from_row).transpose()
    }

    async fn latest_prediction_at(&self, symbol_id: i64) -> AppResult<Option<DateTime<Utc>>> {
        let session = self.session().await;
        let row = session
            .query_one(
                "SELECT MAX(created_at) FROM predictions WHERE symbol_id = $1",
                &[&symbol_id],
            )
            .await?;
        Ok(row.try_get(0)?)
    }

    async fn due_predictions(
        &self,
        timeframe: Timeframe,
        cutoff: DateTime<Utc>,
    ) -> AppResult<Vec<PredictionRecord>> {
        let session = self.session().await;
        let rows = session
            .query(
                &format!(
                    "SELECT {} FROM predictions p JOIN tracked_symbols s ON s.id = p.symbol_id
                     WHERE NOT p.is_evaluated AND p.timeframe = $1 AND p.created_at <= $2
                     ORDER BY p.created_at ASC",
                    PREDICTION_COLUMNS
                ),
                &[&timeframe.as_str(), &cutoff],
            )
            .await?;
        collect(&rows, prediction_from_row)
    }

    async fn apply_evaluations(&self, evaluations: &[PredictionEvaluation]) -> AppResult<usize> {
        if evaluations.is_empty() {
            return Ok(0);
        }
        let mut session = self.session().await;
        let tx = session.transaction().await?;
        let statement = tx
            .prepare(
                "UPDATE predictions
                 SET actual_price = $2, accuracy_score = $3, is_evaluated = TRUE, updated_at = $4
                 WHERE id = $1 AND NOT is_evaluated",
            )
            .await?;

        let mut updated = 0;
        for evaluation in evaluations {
            updated += tx
                .execute(
                    &statement,
                    &[
                        &evaluation.prediction_id,
                        &evaluation.actual_price,
                        &evaluation.accuracy_score,
                        &evaluation.evaluated_at,
                    ],
                )
                .await? as usize;
        }
        // Dropping the transaction without commit rolls back on any error above
        tx.commit().await?;
        Ok(updated)
    }

    async fn predictions_since(
        &self,
        symbol_id: Option<i64>,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<PredictionRecord>> {
        let session = self.session().await;
        let rows = session
            .query(
                &format!(
                    "SELECT {} FROM predictions p JOIN tracked_symbols s ON s.id = p.symbol_id
                     WHERE ($1::BIGINT IS NULL OR p.symbol_id = $1) AND p.created_at >= $2
                     ORDER BY p.created_at DESC, p.id DESC",
                    PREDICTION_COLUMNS
                ),
                &[&symbol_id, &since],
            )
            .await?;
        collect(&rows, prediction_from_row)
    }

    async fn delete_prices_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let session = self.session().await;
        Ok(session
            .execute("DELETE FROM price_points WHERE ts < $1", &[&cutoff])
            .await?)
    }

    async fn delete_predictions_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let session = self.session().await;
        Ok(session
            .execute("DELETE FROM predictions WHERE created_at < $1", &[&cutoff])
            .await?)
    }

    async fn delete_prediction(&self, id: i64) -> AppResult<()> {
        let session = self.session().await;
        let deleted = session
            .execute("DELETE FROM predictions WHERE id = $1", &[&id])
            .await?;
        if deleted == 0 {
            return Err(AppError::NotFound(format!("prediction {}", id)));
        }
        Ok(())
    }

    async fn active_chats(&self) -> AppResult<Vec<ChatSubscription>> {
        let session = self.session().await;
        let rows = session
            .query(
                "SELECT * FROM chat_subscriptions WHERE is_active ORDER BY id",
                &[],
            )
            .await?;
        collect(&rows, chat_from_row)
    }

    async fn upsert_chat(&self, chat: &NewChatSubscription) -> AppResult<ChatSubscription> {
        let session = self.session().await;
        let row = session
            .query_one(
                "INSERT INTO chat_subscriptions
                    (chat_id, daily_summary, price_alerts, prediction_alerts, price_change_threshold)
                 VALUES ($1, $2, $3, $4, $5)
                 ON CONFLICT (chat_id) DO UPDATE
                 SET is_active = TRUE,
                     daily_summary = EXCLUDED.daily_summary,
                     price_alerts = EXCLUDED.price_alerts,
                     prediction_alerts = EXCLUDED.prediction_alerts,
                     price_change_threshold = EXCLUDED.price_change_threshold
                 RETURNING *",
                &[
                    &chat.chat_id,
                    &chat.daily_summary,
                    &chat.price_alerts,
                    &chat.prediction_alerts,
                    &chat.price_change_threshold,
                ],
            )
            .await?;
        chat_from_row(&row)
    }

    async fn deactivate_chat(&self, chat_id: &str) -> AppResult<()> {
        let session = self.session().await;
        let updated = session
            .execute(
                "UPDATE chat_subscriptions SET is_active = FALSE WHERE chat_id = $1",
                &[&chat_id],
            )
            .await?;
        if updated == 0 {
            return Err(AppError::NotFound(format!("chat {}", chat_id)));
        }
        Ok(())
    }
}
