//! Unit tests for SMA and the combined technical snapshot

use chrono::Utc;
use stockpulse::indicators::technical_snapshot;
use stockpulse::indicators::trend::{calculate_sma, calculate_smas};
use stockpulse::models::Candle;

fn create_test_candles(count: usize, base_price: f64) -> Vec<Candle> {
    let mut candles = Vec::new();
    for i in 0..count {
        let price = base_price + (i as f64 * 0.1);
        candles.push(Candle::new(
            price,
            price + 0.05,
            price - 0.05,
            price,
            1000.0,
            Utc::now(),
        ));
    }
    candles
}

#[test]
fn test_sma_insufficient_data() {
    let candles = create_test_candles(10, 100.0);
    assert!(calculate_sma(&candles, 20).is_none());
}

#[test]
fn test_sma_uses_latest_window() {
    let candles = create_test_candles(30, 100.0);
    let sma = calculate_sma(&candles, 10).unwrap();
    // Mean of closes 102.0 ..= 102.9
    assert!((sma.value - 102.45).abs() < 1e-9);
    assert_eq!(sma.period, 10);
}

#[test]
fn test_calculate_multiple_smas_skips_long_periods() {
    let candles = create_test_candles(60, 100.0);
    let smas = calculate_smas(&candles, &[20, 50, 200]);
    let periods: Vec<u32> = smas.iter().map(|s| s.period).collect();
    assert_eq!(periods, vec![20, 50]);
}

#[test]
fn test_snapshot_with_full_history() {
    let candles = create_test_candles(250, 100.0);
    let snapshot = technical_snapshot(&candles);
    assert!(snapshot.rsi_value().is_some());
    assert!(snapshot.macd_value().is_some());
    assert!(snapshot.sma(20).is_some());
    assert!(snapshot.sma(50).is_some());
    assert!(snapshot.sma(200).is_some());
    // Rising series: the fast average sits above the slow one
    assert!(snapshot.sma(20).unwrap() > snapshot.sma(50).unwrap());
}

#[test]
fn test_snapshot_with_short_history_is_empty() {
    let snapshot = technical_snapshot(&create_test_candles(5, 100.0));
    assert!(snapshot.rsi.is_none());
    assert!(snapshot.macd.is_none());
    assert!(snapshot.smas.is_empty());
}
