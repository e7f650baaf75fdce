//! Indicator voting predictor used when no AI key is configured

use crate::models::{PredictionOutcome, PredictionRequest, PredictionType};
use tracing::{debug, warn};

pub const MODEL_VERSION: &str = "rule-based-v1.0";
pub const FALLBACK_MODEL_VERSION: &str = "fallback-v1.0";

const MAX_CONFIDENCE: f64 = 0.8;

#[derive(Debug, Clone, Default)]
pub struct RuleBasedPredictor;

impl RuleBasedPredictor {
    pub fn new() -> Self {
        Self
    }

    /// Score bullish and bearish votes from RSI, MACD and the SMA 20/50 cross.
    ///
    /// RSI < 30 votes bullish twice, RSI > 70 bearish twice; a positive MACD
    /// votes bullish, otherwise bearish; SMA 20 above SMA 50 votes bullish,
    /// otherwise bearish. Missing indicators do not vote.
    pub fn predict(&self, request: &PredictionRequest) -> PredictionOutcome {
        let price = request.current_price;
        if !price.is_finite() || price <= 0.0 {
            warn!(
                symbol = %request.symbol,
                price = price,
                "RuleBased: invalid current price, using fallback prediction"
            );
            return fallback(request.symbol.as_str());
        }

        let indicators = &request.indicators;
        let mut bullish = 0u32;
        let mut bearish = 0u32;
        let mut signals = Vec::new();

        if let Some(rsi) = indicators.rsi_value().filter(|v| v.is_finite()) {
            if rsi < 30.0 {
                bullish += 2;
            } else if rsi > 70.0 {
                bearish += 2;
            }
            signals.push(format!("RSI: {:.1}", rsi));
        }

        if let Some(macd) = indicators.macd_value().filter(|v| v.is_finite()) {
            if macd > 0.0 {
                bullish += 1;
                signals.push("MACD: Positive".to_string());
            } else {
                bearish += 1;
                signals.push("MACD: Negative".to_string());
            }
        }

        if let (Some(fast), Some(slow)) = (indicators.sma(20), indicators.sma(50)) {
            if fast > slow {
                bullish += 1;
                signals.push("MA Cross: Bullish".to_string());
            } else {
                bearish += 1;
                signals.push("MA Cross: Bearish".to_string());
            }
        }

        let (prediction_type, confidence) = if bullish > bearish {
            (
                PredictionType::Bullish,
                (bullish as f64 / 5.0).min(MAX_CONFIDENCE),
            )
        } else if bearish > bullish {
            (
                PredictionType::Bearish,
                (bearish as f64 / 5.0).min(MAX_CONFIDENCE),
            )
        } else {
            (PredictionType::Neutral, 0.5)
        };

        let target_price = match prediction_type {
            PredictionType::Bullish => price * (1.0 + confidence * 0.1),
            PredictionType::Bearish => price * (1.0 - confidence * 0.1),
            PredictionType::Neutral => price,
        };

        debug!(
            symbol = %request.symbol,
            bullish = bullish,
            bearish = bearish,
            prediction = %prediction_type,
            "RuleBased: scored {}",
            request.symbol
        );

        PredictionOutcome {
            prediction_type,
            confidence,
            target_price: Some(target_price),
            reasoning: format!(
                "Rule-based analysis for {}: bullish score {}, bearish score {}",
                request.symbol, bullish, bearish
            ),
            signals,
            model_version: MODEL_VERSION.to_string(),
        }
    }
}

fn fallback(symbol: &str) -> PredictionOutcome {
    PredictionOutcome {
        prediction_type: PredictionType::Neutral,
        confidence: 0.3,
        target_price: None,
        reasoning: format!("Insufficient data to analyze {}", symbol),
        signals: Vec::new(),
        model_version: FALLBACK_MODEL_VERSION.to_string(),
    }
}
