//! Moving average primitives over close series

/// Mean of the last `period` values
pub fn sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let window = &values[values.len() - period..];
    Some(window.iter().sum::<f64>() / period as f64)
}

/// Next EMA value given the previous one
pub fn ema_from_previous(value: f64, previous: f64, period: usize) -> f64 {
    let k = 2.0 / (period as f64 + 1.0);
    value * k + previous * (1.0 - k)
}

/// EMA over the whole series, seeded with the SMA of the first `period` values
pub fn ema(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let mut current = values[..period].iter().sum::<f64>() / period as f64;
    for value in &values[period..] {
        current = ema_from_previous(*value, current, period);
    }
    Some(current)
}
