//! MACD (Moving Average Convergence Divergence) indicator

use crate::indicators::math;
use crate::models::indicators::MacdIndicator;
use crate::models::market::Candle;

/// MACD over a close series
///
/// MACD = EMA(fast) - EMA(slow), signal = EMA(signal) of the MACD line,
/// histogram = MACD - signal
pub fn macd_from_closes(
    closes: &[f64],
    fast_period: u32,
    slow_period: u32,
    signal_period: u32,
) -> Option<MacdIndicator> {
    let (fast, slow, signal) = (
        fast_period as usize,
        slow_period as usize,
        signal_period as usize,
    );
    if fast == 0 || fast >= slow || closes.len() < slow + signal {
        return None;
    }

    let mut fast_ema = math::sma(&closes[..fast], fast)?;
    let mut slow_ema = math::sma(&closes[..slow], slow)?;
    let mut line = Vec::with_capacity(closes.len() - slow + 1);

    for (i, close) in closes.iter().enumerate().skip(fast) {
        fast_ema = math::ema_from_previous(*close, fast_ema, fast);
        if i >= slow {
            slow_ema = math::ema_from_previous(*close, slow_ema, slow);
        }
        if i >= slow - 1 {
            line.push(fast_ema - slow_ema);
        }
    }

    let macd = *line.last()?;
    let signal_value = math::ema(&line, signal)?;

    Some(MacdIndicator {
        macd,
        signal: signal_value,
        histogram: macd - signal_value,
        period: Some((fast_period, slow_period, signal_period)),
    })
}

pub fn calculate_macd(
    candles: &[Candle],
    fast_period: u32,
    slow_period: u32,
    signal_period: u32,
) -> Option<MacdIndicator> {
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    macd_from_closes(&closes, fast_period, slow_period, signal_period)
}

/// Calculate MACD with default periods (12, 26, 9)
pub fn calculate_macd_default(candles: &[Candle]) -> Option<MacdIndicator> {
    calculate_macd(candles, 12, 26, 9)
}
