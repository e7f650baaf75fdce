//! Accuracy scoring of a single prediction against a realized price

use crate::error::{AppError, AppResult};
use tracing::warn;

/// Score reported when a prediction cannot be graded meaningfully
pub const UNGRADED_SCORE: f64 = 0.5;

/// Grade a prediction in [0, 1].
///
/// * `neutral` scores by how close the realized price landed to the target.
/// * `bullish` / `bearish` score by direction: the realized move is "up" when
///   the realized price is above the target. A matching direction earns
///   `(0.7 + max(0, 0.3 - pct_diff / 100)) * confidence` capped at 1, a miss
///   earns `max(0.1, 0.5 - confidence)`.
/// * A missing target or an unknown type scores 0.5. Types match exactly,
///   so "BULLISH" is unknown.
///
/// Invalid numeric input scores 0.0; this function never fails. A direction
/// miss is graded even when the target is zero or negative.
pub fn evaluate(
    prediction_type: &str,
    target_price: Option<f64>,
    realized_price: f64,
    confidence: f64,
) -> f64 {
    match try_evaluate(prediction_type, target_price, realized_price, confidence) {
        Ok(score) => score,
        Err(e) => {
            warn!(
                prediction_type = %prediction_type,
                target_price = ?target_price,
                realized_price = realized_price,
                confidence = confidence,
                error = %e,
                "Accuracy: cannot grade prediction, scoring 0"
            );
            0.0
        }
    }
}

fn try_evaluate(
    prediction_type: &str,
    target_price: Option<f64>,
    realized_price: f64,
    confidence: f64,
) -> AppResult<f64> {
    let predicted_up = match prediction_type {
        "neutral" => None,
        "bullish" => Some(true),
        "bearish" => Some(false),
        _ => return Ok(UNGRADED_SCORE),
    };

    let target = match target_price {
        Some(target) => target,
        None => return Ok(UNGRADED_SCORE),
    };

    if !target.is_finite() {
        return Err(AppError::Evaluation(format!("invalid target price {}", target)));
    }
    if !realized_price.is_finite() {
        return Err(AppError::Evaluation(format!(
            "invalid realized price {}",
            realized_price
        )));
    }

    let score = match predicted_up {
        None => {
            let pct_diff = pct_from_target(realized_price, target)?;
            if pct_diff <= 2.0 {
                1.0
            } else if pct_diff <= 5.0 {
                0.8
            } else if pct_diff <= 10.0 {
                0.6
            } else {
                0.3
            }
        }
        Some(predicted_up) => {
            if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
                return Err(AppError::Evaluation(format!(
                    "confidence {} outside [0, 1]",
                    confidence
                )));
            }
            let actual_up = realized_price > target;
            if predicted_up == actual_up {
                let pct_diff = pct_from_target(realized_price, target)?;
                ((0.7 + (0.3 - pct_diff / 100.0).max(0.0)) * confidence).min(1.0)
            } else {
                (0.5 - confidence).max(0.1)
            }
        }
    };

    Ok(score)
}

/// Percent distance of the realized price from a strictly positive target
fn pct_from_target(realized_price: f64, target: f64) -> AppResult<f64> {
    if target <= 0.0 {
        return Err(AppError::Evaluation(format!("invalid target price {}", target)));
    }
    Ok((realized_price - target).abs() / target * 100.0)
}
