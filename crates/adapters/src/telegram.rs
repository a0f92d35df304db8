//! Telegram broadcast publisher (Bot API sendMessage)

use async_trait::async_trait;
use jobcast_domain::{Artifact, Channel, ChannelPost, ChannelPublisher, PublishError};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::time::Duration;

/// Sends broadcast text to a Telegram channel through a bot
pub struct TelegramPublisher {
    client: Client,
    bot_token: SecretString,
    chat_id: String,
    base_url: String,
    enabled: bool,
}

impl TelegramPublisher {
    pub fn new(bot_token: SecretString, chat_id: String) -> Self {
        Self::with_base_url(
            bot_token,
            chat_id,
            "https://api.telegram.org".to_string(),
            true,
        )
    }

    pub fn with_base_url(
        bot_token: SecretString,
        chat_id: String,
        base_url: String,
        enabled: bool,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            bot_token,
            chat_id,
            base_url,
            enabled,
        }
    }

    /// Create a disabled publisher (for runs without the Telegram channel)
    pub fn disabled() -> Self {
        Self {
            client: Client::new(),
            bot_token: SecretString::new("".into()),
            chat_id: String::new(),
            base_url: String::new(),
            enabled: false,
        }
    }
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
    disable_web_page_preview: bool,
}

#[async_trait]
impl ChannelPublisher for TelegramPublisher {
    async fn publish(&self, artifact: &Artifact) -> Result<ChannelPost, PublishError> {
        if !self.enabled {
            return Err(PublishError::Api("publisher is disabled".to_string()));
        }

        let url = format!(
            "{}/bot{}/sendMessage",
            self.base_url,
            self.bot_token.expose_secret()
        );
        let request = SendMessageRequest {
            chat_id: &self.chat_id,
            text: &artifact.broadcast_text,
            parse_mode: "Markdown",
            disable_web_page_preview: false,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| PublishError::Api(e.to_string()))?;

        if response.status() == 401 || response.status() == 403 {
            return Err(PublishError::Auth("bot token rejected".to_string()));
        }
        if response.status() == 429 {
            return Err(PublishError::RateLimited);
        }
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::Api(format!("sendMessage failed: {}", body)));
        }

        Ok(ChannelPost { link: None })
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn channel(&self) -> Channel {
        Channel::Telegram
    }
}
