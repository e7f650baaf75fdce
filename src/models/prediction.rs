use crate::error::AppError;
use crate::models::indicators::TechnicalSnapshot;
use crate::models::market::Candle;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Prediction horizon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    Short,
    Medium,
    Long,
}

impl Timeframe {
    pub const ALL: [Timeframe; 3] = [Timeframe::Short, Timeframe::Medium, Timeframe::Long];

    pub fn horizon_days(&self) -> i64 {
        match self {
            Timeframe::Short => 7,
            Timeframe::Medium => 30,
            Timeframe::Long => 90,
        }
    }

    pub fn horizon(&self) -> Duration {
        Duration::days(self.horizon_days())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::Short => "short",
            Timeframe::Medium => "medium",
            Timeframe::Long => "long",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "short" => Ok(Timeframe::Short),
            "medium" => Ok(Timeframe::Medium),
            "long" => Ok(Timeframe::Long),
            other => Err(AppError::Validation(format!("unknown timeframe '{}'", other))),
        }
    }
}

/// Predicted direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionType {
    Bullish,
    Bearish,
    Neutral,
}

impl PredictionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionType::Bullish => "bullish",
            PredictionType::Bearish => "bearish",
            PredictionType::Neutral => "neutral",
        }
    }
}

impl fmt::Display for PredictionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PredictionType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bullish" => Ok(PredictionType::Bullish),
            "bearish" => Ok(PredictionType::Bearish),
            "neutral" => Ok(PredictionType::Neutral),
            other => Err(AppError::Validation(format!(
                "unknown prediction type '{}'",
                other
            ))),
        }
    }
}

/// A stored prediction.
///
/// `prediction_type` is kept as the raw stored string so rows written by
/// other tools still grade (unknown types score 0.5).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub id: i64,
    pub symbol_id: i64,
    pub ticker: String,
    pub timeframe: Timeframe,
    pub prediction_type: String,
    pub confidence: f64,
    pub target_price: Option<f64>,
    pub actual_price: Option<f64>,
    pub accuracy_score: Option<f64>,
    pub is_evaluated: bool,
    pub ai_provider: String,
    pub model_version: Option<String>,
    pub reasoning: Option<String>,
    pub signals: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PredictionRecord {
    /// Instant after which the realized price can be looked up
    pub fn matures_at(&self) -> DateTime<Utc> {
        self.created_at + self.timeframe.horizon()
    }
}

/// What a prediction provider returns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionOutcome {
    pub prediction_type: PredictionType,
    pub confidence: f64,
    pub target_price: Option<f64>,
    pub reasoning: String,
    pub signals: Vec<String>,
    pub model_version: String,
}

/// Input handed to a prediction provider
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionRequest {
    pub symbol: String,
    pub current_price: f64,
    pub timeframe: Timeframe,
    pub history: Vec<Candle>,
    pub indicators: TechnicalSnapshot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPrediction {
    pub symbol_id: i64,
    pub timeframe: Timeframe,
    pub ai_provider: String,
    pub outcome: PredictionOutcome,
    pub created_at: DateTime<Utc>,
}

/// Result of grading one prediction; applied in bulk by the store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionEvaluation {
    pub prediction_id: i64,
    pub actual_price: f64,
    pub accuracy_score: f64,
    pub evaluated_at: DateTime<Utc>,
}

/// Per-symbol statistics over a trailing window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionSummary {
    pub symbol: String,
    pub days: i64,
    pub total_predictions: usize,
    pub evaluated_predictions: usize,
    pub average_accuracy: Option<f64>,
    pub average_confidence: f64,
    pub distribution: BTreeMap<String, usize>,
    pub recent: Vec<PredictionRecord>,
}
