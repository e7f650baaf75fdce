//! Technical indicators fed to the prediction providers

pub mod math;
pub mod momentum;
pub mod trend;

use crate::models::indicators::TechnicalSnapshot;
use crate::models::market::Candle;

pub const SMA_PERIODS: [u32; 3] = [20, 50, 200];

/// RSI(14), MACD(12, 26, 9) and SMA 20/50/200 over the given bars.
/// Indicators without enough history are left out.
pub fn technical_snapshot(candles: &[Candle]) -> TechnicalSnapshot {
    let mut snapshot = TechnicalSnapshot::default();
    if let Some(rsi) = momentum::calculate_rsi_default(candles) {
        snapshot = snapshot.with_rsi(rsi);
    }
    if let Some(macd) = momentum::calculate_macd_default(candles) {
        snapshot = snapshot.with_macd(macd);
    }
    for sma in trend::calculate_smas(candles, &SMA_PERIODS) {
        snapshot = snapshot.with_sma(sma);
    }
    snapshot
}
