//! Unit tests for the rule-based predictor

use stockpulse::models::{
    MacdIndicator, PredictionRequest, PredictionType, RsiIndicator, SmaIndicator,
    TechnicalSnapshot, Timeframe,
};
use stockpulse::services::ai::rule_based::{FALLBACK_MODEL_VERSION, MODEL_VERSION};
use stockpulse::services::ai::RuleBasedPredictor;

fn request(price: f64, indicators: TechnicalSnapshot) -> PredictionRequest {
    PredictionRequest {
        symbol: "AAPL".to_string(),
        current_price: price,
        timeframe: Timeframe::Medium,
        history: Vec::new(),
        indicators,
    }
}

fn rsi(value: f64) -> RsiIndicator {
    RsiIndicator {
        value,
        period: Some(14),
    }
}

fn macd(value: f64) -> MacdIndicator {
    MacdIndicator {
        macd: value,
        signal: 0.0,
        histogram: value,
        period: Some((12, 26, 9)),
    }
}

fn sma(period: u32, value: f64) -> SmaIndicator {
    SmaIndicator { value, period }
}

#[test]
fn test_oversold_positive_momentum_is_bullish() {
    let indicators = TechnicalSnapshot::default()
        .with_rsi(rsi(25.0))
        .with_macd(macd(1.2))
        .with_sma(sma(20, 105.0))
        .with_sma(sma(50, 100.0));

    let outcome = RuleBasedPredictor::new().predict(&request(100.0, indicators));

    assert_eq!(outcome.prediction_type, PredictionType::Bullish);
    // 4 bullish votes / 5, capped at 0.8
    assert!((outcome.confidence - 0.8).abs() < 1e-9);
    assert!((outcome.target_price.unwrap() - 108.0).abs() < 1e-9);
    assert_eq!(outcome.model_version, MODEL_VERSION);
    assert_eq!(
        outcome.signals,
        vec!["RSI: 25.0", "MACD: Positive", "MA Cross: Bullish"]
    );
}

#[test]
fn test_overbought_negative_momentum_is_bearish() {
    let indicators = TechnicalSnapshot::default()
        .with_rsi(rsi(75.0))
        .with_macd(macd(-0.4));

    let outcome = RuleBasedPredictor::new().predict(&request(200.0, indicators));

    assert_eq!(outcome.prediction_type, PredictionType::Bearish);
    assert!((outcome.confidence - 0.6).abs() < 1e-9);
    assert!((outcome.target_price.unwrap() - 188.0).abs() < 1e-9);
}

#[test]
fn test_tied_votes_are_neutral() {
    let indicators = TechnicalSnapshot::default()
        .with_rsi(rsi(50.0))
        .with_macd(macd(0.5))
        .with_sma(sma(20, 90.0))
        .with_sma(sma(50, 100.0));

    let outcome = RuleBasedPredictor::new().predict(&request(100.0, indicators));

    assert_eq!(outcome.prediction_type, PredictionType::Neutral);
    assert_eq!(outcome.confidence, 0.5);
    assert_eq!(outcome.target_price, Some(100.0));
}

#[test]
fn test_missing_indicators_do_not_vote() {
    let outcome =
        RuleBasedPredictor::new().predict(&request(100.0, TechnicalSnapshot::default()));
    assert_eq!(outcome.prediction_type, PredictionType::Neutral);
    assert!(outcome.signals.is_empty());
}

#[test]
fn test_invalid_price_uses_fallback() {
    let outcome =
        RuleBasedPredictor::new().predict(&request(0.0, TechnicalSnapshot::default()));
    assert_eq!(outcome.prediction_type, PredictionType::Neutral);
    assert_eq!(outcome.confidence, 0.3);
    assert!(outcome.target_price.is_none());
    assert_eq!(outcome.model_version, FALLBACK_MODEL_VERSION);
}
