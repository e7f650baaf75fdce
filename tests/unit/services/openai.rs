//! Unit tests for parsing model answers

use stockpulse::models::PredictionType;
use stockpulse::services::ai::openai::parse_prediction;

#[test]
fn test_parse_complete_answer() {
    let content = r#"{
        "prediction_type": "bullish",
        "confidence": 0.72,
        "target_price": 187.5,
        "reasoning": "Momentum is improving",
        "key_signals": ["RSI rising", "MACD cross"]
    }"#;

    let outcome = parse_prediction(content, "gpt-3.5-turbo").unwrap();
    assert_eq!(outcome.prediction_type, PredictionType::Bullish);
    assert_eq!(outcome.confidence, 0.72);
    assert_eq!(outcome.target_price, Some(187.5));
    assert_eq!(outcome.reasoning, "Momentum is improving");
    assert_eq!(outcome.signals, vec!["RSI rising", "MACD cross"]);
    assert_eq!(outcome.model_version, "gpt-3.5-turbo");
}

#[test]
fn test_parse_clamps_and_defaults() {
    let content = r#"{"prediction_type": "moon", "confidence": 3.0, "target_price": -1}"#;

    let outcome = parse_prediction(content, "m").unwrap();
    assert_eq!(outcome.prediction_type, PredictionType::Neutral);
    assert_eq!(outcome.confidence, 1.0);
    assert!(outcome.target_price.is_none());
    assert!(outcome.reasoning.is_empty());
    assert!(outcome.signals.is_empty());
}

#[test]
fn test_parse_missing_confidence_defaults_to_half() {
    let outcome = parse_prediction(r#"{"prediction_type": "BEARISH"}"#, "m").unwrap();
    assert_eq!(outcome.prediction_type, PredictionType::Bearish);
    assert_eq!(outcome.confidence, 0.5);
}

#[test]
fn test_parse_rejects_non_json() {
    assert!(parse_prediction("the stock will go up", "m").is_err());
}
