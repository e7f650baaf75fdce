use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacdIndicator {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<(u32, u32, u32)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RsiIndicator {
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmaIndicator {
    pub value: f64,
    pub period: u32,
}

/// Indicator values computed from a symbol's recent closes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TechnicalSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rsi: Option<RsiIndicator>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub macd: Option<MacdIndicator>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub smas: Vec<SmaIndicator>,
}

impl TechnicalSnapshot {
    pub fn sma(&self, period: u32) -> Option<f64> {
        self.smas
            .iter()
            .find(|s| s.period == period)
            .map(|s| s.value)
    }

    pub fn rsi_value(&self) -> Option<f64> {
        self.rsi.as_ref().map(|r| r.value)
    }

    pub fn macd_value(&self) -> Option<f64> {
        self.macd.as_ref().map(|m| m.macd)
    }

    pub fn with_rsi(mut self, rsi: RsiIndicator) -> Self {
        self.rsi = Some(rsi);
        self
    }

    pub fn with_macd(mut self, macd: MacdIndicator) -> Self {
        self.macd = Some(macd);
        self
    }

    pub fn with_sma(mut self, sma: SmaIndicator) -> Self {
        self.smas.push(sma);
        self
    }
}
