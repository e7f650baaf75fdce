//! HTML message bodies sent through the messaging provider

use crate::models::{PredictionRecord, PriceMove};
use chrono::{DateTime, Utc};
use std::fmt::Write;

/// Longest reasoning excerpt quoted in a prediction alert
const REASONING_EXCERPT: usize = 200;

/// One symbol row of the daily digest
#[derive(Debug, Clone, PartialEq)]
pub struct DigestLine {
    pub ticker: String,
    pub price: f64,
    /// Change against the previous stored point, when there is one
    pub change_percent: Option<f64>,
}

pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn trend_emoji(change: f64) -> &'static str {
    if change > 0.0 {
        "📈"
    } else if change < 0.0 {
        "📉"
    } else {
        "➡️"
    }
}

fn direction_emoji(prediction_type: &str) -> &'static str {
    match prediction_type {
        "bullish" => "🚀",
        "bearish" => "🔻",
        _ => "⚖️",
    }
}

fn signed(value: f64) -> String {
    if value > 0.0 {
        format!("+{:.2}", value)
    } else {
        format!("{:.2}", value)
    }
}

pub fn format_daily_digest(
    lines: &[DigestLine],
    predictions: &[PredictionRecord],
    now: DateTime<Utc>,
) -> String {
    let mut message = format!(
        "📊 <b>Daily Stock Summary</b>\n📅 {}\n\n",
        now.format("%Y-%m-%d")
    );

    if lines.is_empty() {
        message.push_str("No price data available yet.\n");
    }
    for line in lines {
        match line.change_percent {
            Some(change) => {
                let _ = writeln!(
                    message,
                    "{} <b>{}</b>: ${:.2} ({}%)",
                    trend_emoji(change),
                    escape_html(&line.ticker),
                    line.price,
                    signed(change)
                );
            }
            None => {
                let _ = writeln!(
                    message,
                    "➡️ <b>{}</b>: ${:.2}",
                    escape_html(&line.ticker),
                    line.price
                );
            }
        }
    }

    if !predictions.is_empty() {
        message.push_str("\n🤖 <b>Recent AI Predictions:</b>\n");
        for prediction in predictions {
            let _ = writeln!(
                message,
                "{} {}: {} ({:.1}%)",
                direction_emoji(&prediction.prediction_type),
                escape_html(&prediction.ticker),
                escape_html(&prediction.prediction_type.to_uppercase()),
                prediction.confidence * 100.0
            );
        }
    }

    let _ = write!(
        message,
        "\n🕐 <i>Generated at {}</i>",
        now.format("%H:%M:%S UTC")
    );
    message
}

pub fn format_price_alert(price_move: &PriceMove, now: DateTime<Utc>) -> String {
    let direction = if price_move.change_percent > 0.0 {
        "increase"
    } else {
        "decrease"
    };
    format!(
        "🚨 <b>Stock Alert: {ticker}</b>\n\n\
         {emoji} <b>Current Price:</b> ${price:.2}\n\
         📊 <b>Change:</b> {change}%\n\n\
         💬 <b>Alert:</b> Significant price movement detected: {abs:.2}% {direction}\n\n\
         🕐 <i>{time}</i>",
        ticker = escape_html(&price_move.ticker),
        emoji = trend_emoji(price_move.change_percent),
        price = price_move.current_price,
        change = signed(price_move.change_percent),
        abs = price_move.change_percent.abs(),
        direction = direction,
        time = now.format("%Y-%m-%d %H:%M:%S UTC"),
    )
}

pub fn format_prediction_alert(prediction: &PredictionRecord, now: DateTime<Utc>) -> String {
    let mut message = format!(
        "🤖 <b>AI Prediction: {}</b>\n\n\
         {} <b>Prediction:</b> {}\n\
         📊 <b>Confidence:</b> {:.1}%\n\
         ⏰ <b>Timeframe:</b> {} days\n",
        escape_html(&prediction.ticker),
        direction_emoji(&prediction.prediction_type),
        escape_html(&prediction.prediction_type.to_uppercase()),
        prediction.confidence * 100.0,
        prediction.timeframe.horizon_days()
    );

    if let Some(target) = prediction.target_price {
        let _ = writeln!(message, "🎯 <b>Target Price:</b> ${:.2}", target);
    }

    let reasoning = prediction.reasoning.as_deref().unwrap_or("No reasoning provided");
    let mut excerpt: String = reasoning.chars().take(REASONING_EXCERPT).collect();
    if reasoning.chars().count() > REASONING_EXCERPT {
        excerpt.push_str("...");
    }
    let _ = write!(
        message,
        "\n💭 <b>Analysis:</b>\n{}\n\n🕐 <i>{}</i>",
        escape_html(&excerpt),
        now.format("%Y-%m-%d %H:%M:%S UTC")
    );
    message
}
