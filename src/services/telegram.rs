//! Telegram Bot API adapter

use crate::error::{AppError, AppResult};
use crate::services::http::{build_client, send_with_retry};
use crate::services::messaging::MessagingProvider;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.telegram.org";

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    description: Option<String>,
}

pub struct TelegramMessenger {
    client: Client,
    token: String,
    base_url: String,
}

impl TelegramMessenger {
    pub fn new(token: String, base_url: Option<String>) -> AppResult<Self> {
        Ok(Self {
            client: build_client()?,
            token,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        })
    }
}

#[async_trait]
impl MessagingProvider for TelegramMessenger {
    fn id(&self) -> &'static str {
        "telegram"
    }

    async fn send(&self, chat_id: &str, text: &str) -> AppResult<()> {
        let url = format!("{}/bot{}/sendMessage", self.base_url, self.token);
        let payload = json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });

        let response = send_with_retry("telegram", || self.client.post(&url).json(&payload)).await?;
        let body: ApiResponse = response.json().await?;
        if !body.ok {
            return Err(AppError::External(format!(
                "telegram: {}",
                body.description.unwrap_or_else(|| "request rejected".to_string())
            )));
        }

        debug!(chat_id = %chat_id, "Telegram: message sent to chat {}", chat_id);
        Ok(())
    }
}
