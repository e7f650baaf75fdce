//! RSI (Relative Strength Index) indicator

use crate::models::indicators::RsiIndicator;
use crate::models::market::Candle;

pub const DEFAULT_RSI_PERIOD: u32 = 14;

/// RSI over a close series, using simple averages of the last `period` moves
///
/// RSI = 100 - (100 / (1 + RS)), RS = average gain / average loss
pub fn rsi_from_closes(closes: &[f64], period: u32) -> Option<RsiIndicator> {
    let period = period as usize;
    if period == 0 || closes.len() < period + 1 {
        return None;
    }

    let moves: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let recent = &moves[moves.len() - period..];

    let avg_gain = recent.iter().filter(|m| **m > 0.0).sum::<f64>() / period as f64;
    let avg_loss = recent.iter().filter(|m| **m < 0.0).map(|m| m.abs()).sum::<f64>() / period as f64;

    let value = if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
    };

    Some(RsiIndicator {
        value,
        period: Some(period as u32),
    })
}

pub fn calculate_rsi(candles: &[Candle], period: u32) -> Option<RsiIndicator> {
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    rsi_from_closes(&closes, period)
}

/// Calculate RSI with default period (14)
pub fn calculate_rsi_default(candles: &[Candle]) -> Option<RsiIndicator> {
    calculate_rsi(candles, DEFAULT_RSI_PERIOD)
}
