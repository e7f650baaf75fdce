use crate::db::Store;
use crate::error::{AppError, AppResult};
use crate::models::PredictionSummary;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;

const RECENT_LIMIT: usize = 5;

/// Statistics over a symbol's predictions from the last `days` days
pub async fn prediction_summary(
    store: &dyn Store,
    ticker: &str,
    days: i64,
    now: DateTime<Utc>,
) -> AppResult<PredictionSummary> {
    if days <= 0 {
        return Err(AppError::Validation("days must be positive".to_string()));
    }
    let symbol = store
        .get_symbol(ticker)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("symbol {}", ticker)))?;

    let records = store
        .predictions_since(Some(symbol.id), now - Duration::days(days))
        .await?;

    let scores: Vec<f64> = records
        .iter()
        .filter(|r| r.is_evaluated)
        .filter_map(|r| r.accuracy_score)
        .collect();
    let average_accuracy = if scores.is_empty() {
        None
    } else {
        Some(scores.iter().sum::<f64>() / scores.len() as f64)
    };

    let average_confidence = if records.is_empty() {
        0.0
    } else {
        records.iter().map(|r| r.confidence).sum::<f64>() / records.len() as f64
    };

    let mut distribution = BTreeMap::new();
    for record in &records {
        *distribution.entry(record.prediction_type.clone()).or_insert(0) += 1;
    }

    Ok(PredictionSummary {
        symbol: symbol.ticker,
        days,
        total_predictions: records.len(),
        evaluated_predictions: scores.len(),
        average_accuracy,
        average_confidence,
        distribution,
        recent: records.into_iter().take(RECENT_LIMIT).collect(),
    })
}
