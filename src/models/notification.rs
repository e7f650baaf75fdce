use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A chat that receives bot messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSubscription {
    pub id: i64,
    pub chat_id: String,
    pub is_active: bool,
    pub daily_summary: bool,
    pub price_alerts: bool,
    pub prediction_alerts: bool,
    /// Absolute percent move that triggers an alert
    pub price_change_threshold: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewChatSubscription {
    pub chat_id: String,
    pub daily_summary: bool,
    pub price_alerts: bool,
    pub prediction_alerts: bool,
    pub price_change_threshold: f64,
}

impl NewChatSubscription {
    pub fn with_defaults(chat_id: impl Into<String>, threshold: f64) -> Self {
        Self {
            chat_id: chat_id.into(),
            daily_summary: true,
            price_alerts: true,
            prediction_alerts: true,
            price_change_threshold: threshold,
        }
    }
}

/// A move between the two latest stored closes of a symbol
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceMove {
    pub ticker: String,
    pub current_price: f64,
    pub previous_price: f64,
    pub change_percent: f64,
}

impl PriceMove {
    pub fn between(ticker: &str, previous_price: f64, current_price: f64) -> Option<Self> {
        if !(previous_price > 0.0) || !current_price.is_finite() {
            return None;
        }
        Some(Self {
            ticker: ticker.to_string(),
            current_price,
            previous_price,
            change_percent: (current_price - previous_price) / previous_price * 100.0,
        })
    }
}
