//! WhatsApp broadcast publisher (Cloud API messages endpoint)

use async_trait::async_trait;
use jobcast_domain::{Artifact, Channel, ChannelPost, ChannelPublisher, PublishError};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::time::Duration;

/// Sends broadcast text to a WhatsApp channel through the Cloud API
pub struct WhatsAppPublisher {
    client: Client,
    api_token: SecretString,
    phone_number_id: String,
    recipient: String,
    base_url: String,
    enabled: bool,
}

impl WhatsAppPublisher {
    pub fn new(api_token: SecretString, phone_number_id: String, recipient: String) -> Self {
        Self::with_base_url(
            api_token,
            phone_number_id,
            recipient,
            "https://graph.facebook.com".to_string(),
            true,
        )
    }

    pub fn with_base_url(
        api_token: SecretString,
        phone_number_id: String,
        recipient: String,
        base_url: String,
        enabled: bool,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_token,
            phone_number_id,
            recipient,
            base_url,
            enabled,
        }
    }

    /// Create a disabled publisher (for runs without the WhatsApp channel)
    pub fn disabled() -> Self {
        Self {
            client: Client::new(),
            api_token: SecretString::new("".into()),
            phone_number_id: String::new(),
            recipient: String::new(),
            base_url: String::new(),
            enabled: false,
        }
    }
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    messaging_product: &'a str,
    to: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    text: TextBody<'a>,
}

#[derive(Serialize)]
struct TextBody<'a> {
    body: &'a str,
}

#[async_trait]
impl ChannelPublisher for WhatsAppPublisher {
    async fn publish(&self, artifact: &Artifact) -> Result<ChannelPost, PublishError> {
        if !self.enabled {
            return Err(PublishError::Api("publisher is disabled".to_string()));
        }

        let url = format!("{}/v18.0/{}/messages", self.base_url, self.phone_number_id);
        let request = SendMessageRequest {
            messaging_product: "whatsapp",
            to: &self.recipient,
            kind: "text",
            text: TextBody {
                body: &artifact.broadcast_text,
            },
        };

        let response = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_token.expose_secret()),
            )
            .json(&request)
            .send()
            .await
            .map_err(|e| PublishError::Api(e.to_string()))?;

        if response.status() == 401 || response.status() == 403 {
            return Err(PublishError::Auth("API token rejected".to_string()));
        }
        if response.status() == 429 {
            return Err(PublishError::RateLimited);
        }
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::Api(format!("message send failed: {}", body)));
        }

        Ok(ChannelPost { link: None })
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn channel(&self) -> Channel {
        Channel::WhatsApp
    }
}
