//! Telegram and OpenAI adapters against mocked HTTP endpoints

use chrono::Utc;
use serde_json::{json, Value};
use stockpulse::config::ProviderSettings;
use stockpulse::error::AppError;
use stockpulse::models::{PredictionRequest, PredictionType, TechnicalSnapshot, Timeframe};
use stockpulse::services::ai::{PredictionProvider, Predictor};
use stockpulse::services::messaging::MessagingProvider;
use stockpulse::services::telegram::TelegramMessenger;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::support::daily_candles;

#[tokio::test]
async fn telegram_sends_html_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/botTOKEN/sendMessage"))
        .and(body_string_contains("\"parse_mode\":\"HTML\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": {}})))
        .expect(1)
        .mount(&server)
        .await;

    let messenger =
        TelegramMessenger::new("TOKEN".to_string(), Some(server.uri())).expect("client builds");
    messenger
        .send("12345", "<b>hello</b>")
        .await
        .expect("message delivered");

    let requests = server.received_requests().await.expect("wiremock requests");
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["chat_id"], "12345");
    assert_eq!(body["text"], "<b>hello</b>");
}

#[tokio::test]
async fn telegram_rejection_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/botTOKEN/sendMessage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": false,
            "description": "Forbidden: bot was blocked by the user"
        })))
        .mount(&server)
        .await;

    let messenger =
        TelegramMessenger::new("TOKEN".to_string(), Some(server.uri())).expect("client builds");
    let err = messenger.send("1", "hi").await.unwrap_err();
    assert!(matches!(err, AppError::External(_)));
    assert!(err.to_string().contains("blocked"));
}

#[tokio::test]
async fn telegram_bad_request_fails_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/botTOKEN/sendMessage"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "ok": false,
            "description": "Bad Request: chat not found"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let messenger =
        TelegramMessenger::new("TOKEN".to_string(), Some(server.uri())).expect("client builds");
    let err = messenger.send("1", "hi").await.unwrap_err();
    assert!(err.to_string().contains("chat not found"));
}

fn prediction_request() -> PredictionRequest {
    let history = daily_candles(&[100.0, 101.0, 102.0, 103.0], Utc::now());
    PredictionRequest {
        symbol: "AAPL".to_string(),
        current_price: 103.0,
        timeframe: Timeframe::Short,
        indicators: TechnicalSnapshot::default(),
        history,
    }
}

fn openai_settings(server: &MockServer) -> ProviderSettings {
    ProviderSettings {
        ai_provider: "openai".to_string(),
        ai_api_key: Some("sk-test".to_string()),
        ai_model: Some("gpt-test".to_string()),
        ai_base_url: Some(server.uri()),
        ..ProviderSettings::default()
    }
}

#[tokio::test]
async fn openai_completion_becomes_outcome() {
    let server = MockServer::start().await;
    let answer = json!({
        "prediction_type": "bearish",
        "confidence": 0.64,
        "target_price": 98.0,
        "reasoning": "Resistance holding",
        "key_signals": ["RSI overbought"]
    });
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_string_contains("gpt-test"))
        .and(body_string_contains("Analyze the stock AAPL"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": answer.to_string()}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let predictor = Predictor::from_settings(&openai_settings(&server)).expect("predictor");
    assert_eq!(predictor.id(), "openai");

    let outcome = predictor
        .generate(&prediction_request())
        .await
        .expect("outcome");
    assert_eq!(outcome.prediction_type, PredictionType::Bearish);
    assert_eq!(outcome.confidence, 0.64);
    assert_eq!(outcome.target_price, Some(98.0));
    assert_eq!(outcome.model_version, "gpt-test");
}

#[tokio::test]
async fn openai_garbage_answer_yields_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "I think it goes up"}}]
        })))
        .mount(&server)
        .await;

    let predictor = Predictor::from_settings(&openai_settings(&server)).expect("predictor");
    assert!(predictor.generate(&prediction_request()).await.is_none());
}
