//! Unit tests for RSI and MACD

use chrono::{Duration, Utc};
use stockpulse::indicators::momentum::{
    calculate_macd_default, calculate_rsi, calculate_rsi_default, macd_from_closes,
    rsi_from_closes,
};
use stockpulse::models::Candle;

fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
    let start = Utc::now() - Duration::days(closes.len() as i64);
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            Candle::new(
                close,
                close + 0.5,
                close - 0.5,
                close,
                1000.0,
                start + Duration::days(i as i64),
            )
        })
        .collect()
}

#[test]
fn test_rsi_insufficient_data() {
    let candles = candles_from_closes(&[100.0; 14]);
    assert!(calculate_rsi_default(&candles).is_none());
}

#[test]
fn test_rsi_all_gains_is_100() {
    let closes: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
    let rsi = rsi_from_closes(&closes, 14).unwrap();
    assert_eq!(rsi.value, 100.0);
    assert_eq!(rsi.period, Some(14));
}

#[test]
fn test_rsi_all_losses_is_0() {
    let closes: Vec<f64> = (0..20).map(|i| 200.0 - i as f64).collect();
    let rsi = rsi_from_closes(&closes, 14).unwrap();
    assert!(rsi.value.abs() < 1e-9);
}

#[test]
fn test_rsi_balanced_moves_is_50() {
    let closes: Vec<f64> = (0..15)
        .map(|i| if i % 2 == 0 { 100.0 } else { 101.0 })
        .collect();
    let rsi = calculate_rsi(&candles_from_closes(&closes), 14).unwrap();
    assert!((rsi.value - 50.0).abs() < 1e-9);
}

#[test]
fn test_macd_requires_slow_plus_signal_bars() {
    let closes: Vec<f64> = (0..34).map(|i| 100.0 + i as f64).collect();
    assert!(macd_from_closes(&closes, 12, 26, 9).is_none());

    let closes: Vec<f64> = (0..35).map(|i| 100.0 + i as f64).collect();
    assert!(macd_from_closes(&closes, 12, 26, 9).is_some());
}

#[test]
fn test_macd_positive_in_uptrend() {
    let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64 * 0.5).collect();
    let macd = calculate_macd_default(&candles_from_closes(&closes)).unwrap();
    assert!(macd.macd > 0.0);
    assert!((macd.histogram - (macd.macd - macd.signal)).abs() < 1e-9);
    assert_eq!(macd.period, Some((12, 26, 9)));
}

#[test]
fn test_macd_negative_in_downtrend() {
    let closes: Vec<f64> = (0..60).map(|i| 200.0 - i as f64 * 0.5).collect();
    let macd = calculate_macd_default(&candles_from_closes(&closes)).unwrap();
    assert!(macd.macd < 0.0);
}

#[test]
fn test_macd_flat_series_is_zero() {
    let macd = macd_from_closes(&[50.0; 40], 12, 26, 9).unwrap();
    assert!(macd.macd.abs() < 1e-9);
    assert!(macd.signal.abs() < 1e-9);
}
