//! Evaluation of matured predictions

use super::accuracy::evaluate;
use crate::db::Store;
use crate::error::{AppError, AppResult};
use crate::models::{PredictionEvaluation, PredictionRecord, Timeframe};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EvaluationReport {
    /// Matured records inspected
    pub candidates: usize,
    pub evaluated: usize,
    /// No price point at or before the maturity instant
    pub skipped_no_price: usize,
    pub failed: usize,
}

/// Grade every unevaluated prediction whose horizon has elapsed by `now`.
///
/// The realized price is the close of the latest point at or before
/// `created_at + horizon`. All grades are committed as one unit; a record
/// that fails to load its price is logged and left for the next run.
pub async fn run_evaluation(store: &dyn Store, now: DateTime<Utc>) -> AppResult<EvaluationReport> {
    let mut report = EvaluationReport::default();
    let mut evaluations = Vec::new();

    for timeframe in Timeframe::ALL {
        let cutoff = now - timeframe.horizon();
        let due = store.due_predictions(timeframe, cutoff).await?;
        debug!(
            timeframe = %timeframe,
            cutoff = %cutoff,
            count = due.len(),
            "Evaluation: {} matured {} predictions",
            due.len(),
            timeframe
        );
        report.candidates += due.len();

        for record in due {
            match grade(store, &record, now).await {
                Ok(Some(evaluation)) => evaluations.push(evaluation),
                Ok(None) => {
                    debug!(
                        prediction_id = record.id,
                        symbol = %record.ticker,
                        "Evaluation: no realized price yet for prediction {}",
                        record.id
                    );
                    report.skipped_no_price += 1;
                }
                Err(e) => {
                    warn!(
                        prediction_id = record.id,
                        symbol = %record.ticker,
                        error = %e,
                        "Evaluation: failed to grade prediction {}",
                        record.id
                    );
                    report.failed += 1;
                }
            }
        }
    }

    report.evaluated = store.apply_evaluations(&evaluations).await?;

    info!(
        candidates = report.candidates,
        evaluated = report.evaluated,
        skipped = report.skipped_no_price,
        failed = report.failed,
        "Evaluation: graded {} of {} matured predictions",
        report.evaluated,
        report.candidates
    );
    Ok(report)
}

async fn grade(
    store: &dyn Store,
    record: &PredictionRecord,
    now: DateTime<Utc>,
) -> AppResult<Option<PredictionEvaluation>> {
    let point = store
        .price_at_or_before(record.symbol_id, record.matures_at())
        .await?;

    Ok(point.map(|point| PredictionEvaluation {
        prediction_id: record.id,
        actual_price: point.close,
        accuracy_score: evaluate(
            &record.prediction_type,
            record.target_price,
            point.close,
            record.confidence,
        ),
        evaluated_at: now,
    }))
}

/// Grade one prediction on demand.
///
/// Uses `realized_price` when given, otherwise the latest stored close of the
/// symbol. An already evaluated record is returned unchanged.
pub async fn evaluate_prediction(
    store: &dyn Store,
    prediction_id: i64,
    realized_price: Option<f64>,
    now: DateTime<Utc>,
) -> AppResult<PredictionRecord> {
    let record = store
        .get_prediction(prediction_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("prediction {}", prediction_id)))?;

    if record.is_evaluated {
        return Ok(record);
    }

    let realized = match realized_price {
        Some(price) if price.is_finite() && price > 0.0 => price,
        Some(price) => {
            return Err(AppError::Validation(format!(
                "realized price must be a positive number, got {}",
                price
            )))
        }
        None => store
            .latest_prices(record.symbol_id, 1)
            .await?
            .first()
            .map(|p| p.close)
            .ok_or_else(|| {
                AppError::Evaluation(format!("no stored price for {}", record.ticker))
            })?,
    };

    let evaluation = PredictionEvaluation {
        prediction_id,
        actual_price: realized,
        accuracy_score: evaluate(
            &record.prediction_type,
            record.target_price,
            realized,
            record.confidence,
        ),
        evaluated_at: now,
    };
    store.apply_evaluations(&[evaluation]).await?;

    info!(
        prediction_id = prediction_id,
        symbol = %record.ticker,
        "Evaluation: graded prediction {} on demand",
        prediction_id
    );

    store
        .get_prediction(prediction_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("prediction {}", prediction_id)))
}
