//! Unit tests for notification message bodies

use chrono::{TimeZone, Utc};
use stockpulse::jobs::notifications::{
    escape_html, format_daily_digest, format_prediction_alert, format_price_alert, DigestLine,
};
use stockpulse::models::{PredictionRecord, PriceMove, Timeframe};

fn prediction(ticker: &str, kind: &str, confidence: f64, reasoning: Option<String>) -> PredictionRecord {
    let created = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
    PredictionRecord {
        id: 1,
        symbol_id: 1,
        ticker: ticker.to_string(),
        timeframe: Timeframe::Medium,
        prediction_type: kind.to_string(),
        confidence,
        target_price: Some(190.0),
        actual_price: None,
        accuracy_score: None,
        is_evaluated: false,
        ai_provider: "rule_based".to_string(),
        model_version: None,
        reasoning,
        signals: Vec::new(),
        created_at: created,
        updated_at: created,
    }
}

#[test]
fn test_escape_html() {
    assert_eq!(escape_html("a < b & c > d"), "a &lt; b &amp; c &gt; d");
}

#[test]
fn test_daily_digest_lists_prices_and_predictions() {
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
    let lines = vec![
        DigestLine {
            ticker: "AAPL".to_string(),
            price: 182.5,
            change_percent: Some(1.234),
        },
        DigestLine {
            ticker: "TSLA".to_string(),
            price: 170.0,
            change_percent: Some(-2.5),
        },
        DigestLine {
            ticker: "MSFT".to_string(),
            price: 410.0,
            change_percent: None,
        },
    ];
    let predictions = vec![prediction("AAPL", "bullish", 0.72, None)];

    let message = format_daily_digest(&lines, &predictions, now);

    assert!(message.contains("<b>Daily Stock Summary</b>"));
    assert!(message.contains("<b>AAPL</b>: $182.50 (+1.23%)"));
    assert!(message.contains("<b>TSLA</b>: $170.00 (-2.50%)"));
    assert!(message.contains("<b>MSFT</b>: $410.00"));
    assert!(message.contains("Recent AI Predictions"));
    assert!(message.contains("AAPL: BULLISH (72.0%)"));
    assert!(message.contains("Generated at 09:00:00 UTC"));
}

#[test]
fn test_daily_digest_without_data() {
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
    let message = format_daily_digest(&[], &[], now);
    assert!(message.contains("No price data available yet."));
    assert!(!message.contains("Recent AI Predictions"));
}

#[test]
fn test_price_alert_describes_direction() {
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 15, 30, 0).unwrap();
    let up = PriceMove::between("NVDA", 100.0, 106.0).unwrap();
    let message = format_price_alert(&up, now);
    assert!(message.contains("<b>Stock Alert: NVDA</b>"));
    assert!(message.contains("$106.00"));
    assert!(message.contains("+6.00%"));
    assert!(message.contains("Significant price movement detected: 6.00% increase"));

    let down = PriceMove::between("NVDA", 100.0, 93.0).unwrap();
    let message = format_price_alert(&down, now);
    assert!(message.contains("-7.00%"));
    assert!(message.contains("7.00% decrease"));
}

#[test]
fn test_prediction_alert_truncates_reasoning() {
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
    let long = "x".repeat(250);
    let message = format_prediction_alert(&prediction("AAPL", "bearish", 0.65, Some(long)), now);

    assert!(message.contains("<b>AI Prediction: AAPL</b>"));
    assert!(message.contains("BEARISH"));
    assert!(message.contains("65.0%"));
    assert!(message.contains("30 days"));
    assert!(message.contains("$190.00"));
    assert!(message.contains(&format!("{}...", "x".repeat(200))));
    assert!(!message.contains(&"x".repeat(201)));
}

#[test]
fn test_price_move_requires_positive_previous() {
    assert!(PriceMove::between("AAPL", 0.0, 10.0).is_none());
    let change = PriceMove::between("AAPL", 200.0, 190.0).unwrap();
    assert!((change.change_percent + 5.0).abs() < 1e-9);
}
