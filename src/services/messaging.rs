//! Messaging provider interface and provider selection

use crate::config::ProviderSettings;
use crate::error::AppResult;
use crate::services::telegram::TelegramMessenger;
use async_trait::async_trait;

#[async_trait]
pub trait MessagingProvider: Send + Sync {
    fn id(&self) -> &'static str;

    /// Deliver an HTML formatted message to one chat
    async fn send(&self, chat_id: &str, text: &str) -> AppResult<()>;
}

/// Configured messaging provider
pub enum Messenger {
    Telegram(TelegramMessenger),
}

impl Messenger {
    /// `None` when no bot token is configured
    pub fn from_settings(settings: &ProviderSettings) -> AppResult<Option<Self>> {
        match &settings.telegram_bot_token {
            Some(token) => Ok(Some(Messenger::Telegram(TelegramMessenger::new(
                token.clone(),
                settings.telegram_base_url.clone(),
            )?))),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl MessagingProvider for Messenger {
    fn id(&self) -> &'static str {
        match self {
            Messenger::Telegram(messenger) => messenger.id(),
        }
    }

    async fn send(&self, chat_id: &str, text: &str) -> AppResult<()> {
        match self {
            Messenger::Telegram(messenger) => messenger.send(chat_id, text).await,
        }
    }
}
