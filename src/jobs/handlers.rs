//! Job bodies for data refresh, prediction generation, evaluation,
//! notifications and retention cleanup
//!
//! Every function here loops over symbols or chats, keeps going past
//! per-item failures and returns a report of what happened. Only failures
//! that stop the whole run (e.g. the store is unreachable) surface as errors.

use crate::error::{AppError, AppResult};
use crate::evaluation::{run_evaluation, EvaluationReport};
use crate::indicators::technical_snapshot;
use crate::jobs::context::JobContext;
use crate::jobs::notifications::{
    format_daily_digest, format_prediction_alert, format_price_alert, DigestLine,
};
use crate::models::{
    Candle, ChatSubscription, NewPrediction, PredictionRecord, PredictionRequest, PriceMove,
    Timeframe, TrackedSymbol,
};
use crate::services::messaging::MessagingProvider;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Symbols with fewer stored points than this get a historical backfill
pub const BACKFILL_THRESHOLD: usize = 30;
/// Period requested for the backfill
pub const BACKFILL_PERIOD: &str = "3mo";
/// Days of stored history handed to the predictor
pub const PREDICTION_HISTORY_DAYS: i64 = 60;
/// Timeframe used by the scheduled generation job
pub const SCHEDULED_TIMEFRAME: Timeframe = Timeframe::Medium;

const DIGEST_MAX_SYMBOLS: usize = 10;
const DIGEST_MAX_PREDICTIONS: usize = 3;
const DIGEST_PREDICTION_WINDOW_HOURS: i64 = 24;

/// Per-item tally of a looping job
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl BatchReport {
    fn summary(&self) -> String {
        format!(
            "{} attempted, {} succeeded, {} failed, {} skipped",
            self.attempted, self.succeeded, self.failed, self.skipped
        )
    }
}

impl std::fmt::Display for BatchReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.summary())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub prices_deleted: u64,
    pub predictions_deleted: u64,
}

async fn pace(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

/// Active symbols, seeding the configured defaults into an empty store
async fn tracked_symbols(ctx: &JobContext) -> AppResult<Vec<TrackedSymbol>> {
    let symbols = ctx.store.list_active_symbols().await?;
    if !symbols.is_empty() {
        return Ok(symbols);
    }

    info!(
        count = ctx.settings.default_symbols.len(),
        "No active symbols, seeding {} default symbols",
        ctx.settings.default_symbols.len()
    );
    let mut seeded = Vec::with_capacity(ctx.settings.default_symbols.len());
    for ticker in &ctx.settings.default_symbols {
        seeded.push(ctx.store.upsert_symbol(ticker, None).await?);
    }
    Ok(seeded)
}

// ---------------------------------------------------------------------------
// Market data refresh
// ---------------------------------------------------------------------------

/// Fetch a quote for every active symbol and store it as a price point
pub async fn refresh_market_data(ctx: &JobContext) -> AppResult<BatchReport> {
    let symbols = tracked_symbols(ctx).await?;
    let mut report = BatchReport::default();

    for (i, symbol) in symbols.iter().enumerate() {
        if i > 0 {
            pace(ctx.settings.pacing.quote_delay).await;
        }
        report.attempted += 1;

        match refresh_tracked(ctx, symbol).await {
            Ok(inserted) => {
                debug!(
                    symbol = %symbol.ticker,
                    inserted = inserted,
                    "Refresh: stored {} new points for {}",
                    inserted,
                    symbol.ticker
                );
                report.succeeded += 1;
            }
            Err(e) => {
                warn!(
                    symbol = %symbol.ticker,
                    error = %e,
                    "Refresh: failed to refresh {}",
                    symbol.ticker
                );
                report.failed += 1;
            }
        }
    }

    info!(
        attempted = report.attempted,
        succeeded = report.succeeded,
        failed = report.failed,
        "Refresh: {}",
        report
    );
    Ok(report)
}

/// Track `ticker` (reactivating it if needed) and refresh its prices now.
/// Returns the number of new price points.
pub async fn refresh_symbol(ctx: &JobContext, ticker: &str) -> AppResult<usize> {
    let symbol = ctx.store.upsert_symbol(ticker, None).await?;
    refresh_tracked(ctx, &symbol).await
}

async fn refresh_tracked(ctx: &JobContext, symbol: &TrackedSymbol) -> AppResult<usize> {
    let mut inserted = 0;

    let stored = ctx.store.count_prices(symbol.id).await?;
    if stored < BACKFILL_THRESHOLD {
        match ctx
            .market_data
            .get_historical(&symbol.ticker, BACKFILL_PERIOD)
            .await
        {
            Some(series) if !series.is_empty() => {
                inserted += ctx
                    .store
                    .upsert_price_points(symbol.id, &series.candles)
                    .await?;
                info!(
                    symbol = %symbol.ticker,
                    stored = stored,
                    inserted = inserted,
                    "Refresh: backfilled {} bars for {}",
                    inserted,
                    symbol.ticker
                );
            }
            _ => debug!(
                symbol = %symbol.ticker,
                "Refresh: no history available to backfill {}",
                symbol.ticker
            ),
        }
    }

    let quote = ctx
        .market_data
        .get_quote(&symbol.ticker)
        .await
        .ok_or_else(|| AppError::External(format!("no quote for {}", symbol.ticker)))?;

    let candle: Candle = quote.to_candle();
    inserted += ctx.store.upsert_price_points(symbol.id, &[candle]).await?;
    Ok(inserted)
}

// ---------------------------------------------------------------------------
// Prediction generation
// ---------------------------------------------------------------------------

/// Generate a prediction for every active symbol without a recent one
pub async fn generate_predictions(ctx: &JobContext, now: DateTime<Utc>) -> AppResult<BatchReport> {
    let symbols = ctx.store.list_active_symbols().await?;
    let min_age = ChronoDuration::from_std(ctx.settings.schedule.prediction_interval)
        .map_err(|e| AppError::Configuration(format!("prediction interval: {}", e)))?;
    let mut report = BatchReport::default();

    for symbol in &symbols {
        if let Some(last) = ctx.store.latest_prediction_at(symbol.id).await? {
            if now - last < min_age {
                debug!(
                    symbol = %symbol.ticker,
                    last = %last,
                    "Predictions: {} already has a recent prediction",
                    symbol.ticker
                );
                report.skipped += 1;
                continue;
            }
        }

        if report.attempted > 0 {
            pace(ctx.settings.pacing.prediction_delay).await;
        }
        report.attempted += 1;

        match generate_for_symbol(ctx, symbol, SCHEDULED_TIMEFRAME, now).await {
            Ok(record) => {
                info!(
                    symbol = %symbol.ticker,
                    prediction_id = record.id,
                    direction = %record.prediction_type,
                    confidence = record.confidence,
                    "Predictions: {} predicted {} ({:.2})",
                    symbol.ticker,
                    record.prediction_type,
                    record.confidence
                );
                report.succeeded += 1;
            }
            Err(e) => {
                warn!(
                    symbol = %symbol.ticker,
                    error = %e,
                    "Predictions: failed to generate for {}",
                    symbol.ticker
                );
                report.failed += 1;
            }
        }
    }

    info!(
        attempted = report.attempted,
        succeeded = report.succeeded,
        failed = report.failed,
        skipped = report.skipped,
        "Predictions: {}",
        report
    );
    Ok(report)
}

/// Build the request from stored history, ask the predictor and persist
/// the outcome
pub async fn generate_for_symbol(
    ctx: &JobContext,
    symbol: &TrackedSymbol,
    timeframe: Timeframe,
    now: DateTime<Utc>,
) -> AppResult<PredictionRecord> {
    let since = now - ChronoDuration::days(PREDICTION_HISTORY_DAYS);
    let history: Vec<Candle> = ctx
        .store
        .price_history(symbol.id, since)
        .await?
        .iter()
        .map(|point| point.to_candle())
        .collect();

    let current_price = history
        .last()
        .map(|candle| candle.close)
        .ok_or_else(|| AppError::NotFound(format!("no price history for {}", symbol.ticker)))?;

    let request = PredictionRequest {
        symbol: symbol.ticker.clone(),
        current_price,
        timeframe,
        indicators: technical_snapshot(&history),
        history,
    };

    let outcome = ctx.predictor.generate(&request).await.ok_or_else(|| {
        AppError::External(format!(
            "{} returned no prediction for {}",
            ctx.predictor.id(),
            symbol.ticker
        ))
    })?;

    let record = ctx
        .store
        .insert_prediction(&NewPrediction {
            symbol_id: symbol.id,
            timeframe,
            ai_provider: ctx.predictor.id().to_string(),
            outcome,
            created_at: now,
        })
        .await?;

    if let Some(metrics) = &ctx.metrics {
        metrics.predictions_generated_total.inc();
    }

    send_prediction_alerts(ctx, &record, now).await;
    Ok(record)
}

async fn send_prediction_alerts(ctx: &JobContext, record: &PredictionRecord, now: DateTime<Utc>) {
    let Some(messenger) = &ctx.messenger else {
        return;
    };

    let chats = match ctx.store.active_chats().await {
        Ok(chats) => chats,
        Err(e) => {
            warn!(error = %e, "Predictions: failed to load chats for prediction alerts");
            return;
        }
    };
    let recipients: Vec<&ChatSubscription> =
        chats.iter().filter(|chat| chat.prediction_alerts).collect();
    if recipients.is_empty() {
        return;
    }

    let text = format_prediction_alert(record, now);
    deliver(
        ctx,
        messenger.as_ref(),
        &recipients,
        &text,
        "prediction_alert",
        ctx.settings.pacing.alert_chat_delay,
    )
    .await;
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

pub async fn evaluate_predictions(
    ctx: &JobContext,
    now: DateTime<Utc>,
) -> AppResult<EvaluationReport> {
    let report = run_evaluation(ctx.store.as_ref(), now).await?;
    if let Some(metrics) = &ctx.metrics {
        metrics.predictions_evaluated_total.inc_by(report.evaluated as f64);
    }
    Ok(report)
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

/// Send each chat at its own pace; returns (sent, failed)
async fn deliver(
    ctx: &JobContext,
    messenger: &dyn MessagingProvider,
    chats: &[&ChatSubscription],
    text: &str,
    kind: &str,
    delay: Duration,
) -> (usize, usize) {
    let mut sent = 0;
    let mut failed = 0;

    for (i, chat) in chats.iter().enumerate() {
        if i > 0 {
            pace(delay).await;
        }
        match messenger.send(&chat.chat_id, text).await {
            Ok(()) => {
                sent += 1;
                if let Some(metrics) = &ctx.metrics {
                    metrics.notifications_sent_total.with_label_values(&[kind]).inc();
                }
            }
            Err(e) => {
                error!(
                    chat_id = %chat.chat_id,
                    kind = %kind,
                    error = %e,
                    "Notifications: failed to send {} to chat {}",
                    kind,
                    chat.chat_id
                );
                failed += 1;
            }
        }
    }

    (sent, failed)
}

/// Latest close of up to ten symbols plus the freshest predictions, sent to
/// every chat with the daily summary enabled
pub async fn send_daily_digest(ctx: &JobContext, now: DateTime<Utc>) -> AppResult<BatchReport> {
    let mut report = BatchReport::default();
    let Some(messenger) = &ctx.messenger else {
        info!("Digest: no messaging provider configured, skipping");
        return Ok(report);
    };

    let chats = ctx.store.active_chats().await?;
    let recipients: Vec<&ChatSubscription> =
        chats.iter().filter(|chat| chat.daily_summary).collect();
    if recipients.is_empty() {
        info!("Digest: no chats subscribed to the daily summary");
        return Ok(report);
    }

    let mut lines = Vec::new();
    for symbol in ctx
        .store
        .list_active_symbols()
        .await?
        .iter()
        .take(DIGEST_MAX_SYMBOLS)
    {
        let points = ctx.store.latest_prices(symbol.id, 2).await?;
        let Some(latest) = points.first() else {
            continue;
        };
        let change_percent = points
            .get(1)
            .and_then(|previous| PriceMove::between(&symbol.ticker, previous.close, latest.close))
            .map(|price_move| price_move.change_percent);
        lines.push(DigestLine {
            ticker: symbol.ticker.clone(),
            price: latest.close,
            change_percent,
        });
    }

    let mut predictions = ctx
        .store
        .predictions_since(None, now - ChronoDuration::hours(DIGEST_PREDICTION_WINDOW_HOURS))
        .await?;
    predictions.truncate(DIGEST_MAX_PREDICTIONS);

    let text = format_daily_digest(&lines, &predictions, now);
    let (sent, failed) = deliver(
        ctx,
        messenger.as_ref(),
        &recipients,
        &text,
        "digest",
        ctx.settings.pacing.digest_delay,
    )
    .await;

    report.attempted = recipients.len();
    report.succeeded = sent;
    report.failed = failed;
    info!(
        chats = report.attempted,
        sent = sent,
        failed = failed,
        "Digest: sent to {} of {} chats",
        sent,
        report.attempted
    );
    Ok(report)
}

/// Compare the two latest points of every symbol and alert each chat whose
/// threshold the move reaches. A given newest point is alerted on once.
pub async fn check_price_alerts(ctx: &JobContext, now: DateTime<Utc>) -> AppResult<BatchReport> {
    let mut report = BatchReport::default();
    let Some(messenger) = &ctx.messenger else {
        debug!("Alerts: no messaging provider configured, skipping");
        return Ok(report);
    };

    let chats = ctx.store.active_chats().await?;
    let subscribers: Vec<&ChatSubscription> =
        chats.iter().filter(|chat| chat.price_alerts).collect();
    if subscribers.is_empty() {
        return Ok(report);
    }

    let mut alerts_sent = 0;
    for symbol in ctx.store.list_active_symbols().await? {
        let points = ctx.store.latest_prices(symbol.id, 2).await?;
        let (Some(latest), Some(previous)) = (points.first(), points.get(1)) else {
            continue;
        };
        let Some(price_move) = PriceMove::between(&symbol.ticker, previous.close, latest.close)
        else {
            continue;
        };

        if already_alerted(ctx, symbol.id, latest.timestamp) {
            continue;
        }

        let recipients: Vec<&ChatSubscription> = subscribers
            .iter()
            .copied()
            .filter(|chat| price_move.change_percent.abs() >= chat.price_change_threshold)
            .collect();
        if recipients.is_empty() {
            continue;
        }

        if alerts_sent > 0 {
            pace(ctx.settings.pacing.alert_delay).await;
        }
        alerts_sent += 1;

        info!(
            symbol = %symbol.ticker,
            change_pct = price_move.change_percent,
            chats = recipients.len(),
            "Alerts: {} moved {:.2}%",
            symbol.ticker,
            price_move.change_percent
        );

        let text = format_price_alert(&price_move, now);
        let (sent, failed) = deliver(
            ctx,
            messenger.as_ref(),
            &recipients,
            &text,
            "price_alert",
            ctx.settings.pacing.alert_chat_delay,
        )
        .await;
        report.attempted += recipients.len();
        report.succeeded += sent;
        report.failed += failed;

        mark_alerted(ctx, symbol.id, latest.timestamp);
    }

    if report.attempted > 0 {
        info!(
            alerts = alerts_sent,
            sent = report.succeeded,
            failed = report.failed,
            "Alerts: {} alerts, {}",
            alerts_sent,
            report
        );
    }
    Ok(report)
}

fn already_alerted(ctx: &JobContext, symbol_id: i64, latest: DateTime<Utc>) -> bool {
    match ctx.alerted.lock() {
        Ok(alerted) => alerted.get(&symbol_id) == Some(&latest),
        Err(_) => false,
    }
}

fn mark_alerted(ctx: &JobContext, symbol_id: i64, latest: DateTime<Utc>) {
    if let Ok(mut alerted) = ctx.alerted.lock() {
        alerted.insert(symbol_id, latest);
    }
}

// ---------------------------------------------------------------------------
// Retention
// ---------------------------------------------------------------------------

pub async fn cleanup_old_data(ctx: &JobContext, now: DateTime<Utc>) -> AppResult<CleanupReport> {
    let retention = &ctx.settings.retention;
    let price_cutoff = now - ChronoDuration::days(retention.price_retention_days);
    let prediction_cutoff = now - ChronoDuration::days(retention.prediction_retention_days);

    let report = CleanupReport {
        prices_deleted: ctx.store.delete_prices_before(price_cutoff).await?,
        predictions_deleted: ctx.store.delete_predictions_before(prediction_cutoff).await?,
    };

    info!(
        prices = report.prices_deleted,
        predictions = report.predictions_deleted,
        price_cutoff = %price_cutoff,
        prediction_cutoff = %prediction_cutoff,
        "Cleanup: removed {} price points and {} predictions",
        report.prices_deleted,
        report.predictions_deleted
    );
    Ok(report)
}
