//! OpenAI-compatible chat completions predictor

use crate::error::{AppError, AppResult};
use crate::models::{PredictionOutcome, PredictionRequest, PredictionType};
use crate::services::http::{build_client, send_with_retry};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Bars included in the prompt
const PROMPT_HISTORY: usize = 30;

const SYSTEM_PROMPT: &str = "You are an expert stock market analyst with deep knowledge of \
technical analysis and market trends. Provide data-driven stock predictions as JSON.";

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Prediction body the model is asked to return
#[derive(Debug, Deserialize)]
struct ModelPrediction {
    prediction_type: Option<String>,
    confidence: Option<f64>,
    target_price: Option<f64>,
    reasoning: Option<String>,
    #[serde(default)]
    key_signals: Vec<String>,
}

pub struct OpenAiPredictor {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiPredictor {
    pub fn new(api_key: String, model: Option<String>, base_url: Option<String>) -> AppResult<Self> {
        Ok(Self {
            client: build_client()?,
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn prompt(&self, request: &PredictionRequest) -> String {
        let start = request.history.len().saturating_sub(PROMPT_HISTORY);
        let history: Vec<Value> = request.history[start..]
            .iter()
            .map(|c| {
                json!({
                    "date": c.timestamp.format("%Y-%m-%d").to_string(),
                    "open": c.open,
                    "high": c.high,
                    "low": c.low,
                    "close": c.close,
                    "volume": c.volume,
                })
            })
            .collect();

        format!(
            "Analyze the stock {symbol} and provide a {days} day prediction.\n\
             Current price: {price:.2}\n\n\
             Historical price data (most recent {count} sessions):\n{history}\n\n\
             Technical indicators:\n{indicators}\n\n\
             Respond with a JSON object of the form:\n\
             {{\"prediction_type\": \"bullish|bearish|neutral\", \"confidence\": 0.0-1.0, \
             \"target_price\": number or null, \"reasoning\": \"...\", \
             \"key_signals\": [\"...\"]}}",
            symbol = request.symbol,
            days = request.timeframe.horizon_days(),
            price = request.current_price,
            count = history.len(),
            history = Value::Array(history),
            indicators = json!(request.indicators),
        )
    }

    pub async fn request_prediction(
        &self,
        request: &PredictionRequest,
    ) -> AppResult<PredictionOutcome> {
        let url = format!("{}/chat/completions", self.base_url);
        let payload = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": self.prompt(request)},
            ],
            "max_tokens": 1000,
            "temperature": 0.3,
            "response_format": {"type": "json_object"},
        });

        let response = send_with_retry("openai", || {
            self.client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&payload)
        })
        .await?;

        let completion: CompletionResponse = response.json().await?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AppError::External("openai: empty completion".to_string()))?;

        parse_prediction(&content, &self.model)
    }
}

/// Turn the model's JSON answer into an outcome. Unknown directions become
/// neutral, confidence is clamped into [0, 1] and non-positive targets dropped.
pub fn parse_prediction(content: &str, model: &str) -> AppResult<PredictionOutcome> {
    let parsed: ModelPrediction = serde_json::from_str(content.trim())?;

    let prediction_type = parsed
        .prediction_type
        .as_deref()
        .and_then(|raw| raw.parse::<PredictionType>().ok())
        .unwrap_or_else(|| {
            warn!(raw = ?parsed.prediction_type, "OpenAI: unrecognized prediction type, using neutral");
            PredictionType::Neutral
        });

    let confidence = parsed
        .confidence
        .filter(|c| c.is_finite())
        .unwrap_or(0.5)
        .clamp(0.0, 1.0);

    Ok(PredictionOutcome {
        prediction_type,
        confidence,
        target_price: parsed.target_price.filter(|p| p.is_finite() && *p > 0.0),
        reasoning: parsed.reasoning.unwrap_or_default(),
        signals: parsed.key_signals,
        model_version: model.to_string(),
    })
}

pub(crate) fn log_failure(symbol: &str, e: &AppError) {
    error!(symbol = %symbol, error = %e, "OpenAI: prediction request failed for {}", symbol);
}
