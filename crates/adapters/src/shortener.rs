//! TinyURL-style link shortener
//!
//! Shortening is best-effort: the caller falls back to the original URL on
//! any error. Domains known to be rejected by the service are passed
//! through unchanged without a network round-trip.

use async_trait::async_trait;
use jobcast_domain::{ShortenError, Shortener};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Shortener client for the TinyURL create API
pub struct TinyUrlShortener {
    client: Client,
    api_token: SecretString,
    base_url: String,
    passthrough_domains: Vec<String>,
}

impl TinyUrlShortener {
    pub fn new(api_token: SecretString, passthrough_domains: Vec<String>) -> Self {
        Self::with_base_url(
            api_token,
            "https://api.tinyurl.com".to_string(),
            passthrough_domains,
        )
    }

    pub fn with_base_url(
        api_token: SecretString,
        base_url: String,
        passthrough_domains: Vec<String>,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_token,
            base_url,
            passthrough_domains,
        }
    }

    fn is_passthrough(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        let Some(host) = parsed.host_str() else {
            return false;
        };
        self.passthrough_domains
            .iter()
            .any(|domain| host == domain || host.ends_with(&format!(".{}", domain)))
    }
}

#[derive(Deserialize)]
struct CreateResponse {
    data: CreateData,
}

#[derive(Deserialize)]
struct CreateData {
    tiny_url: String,
}

#[async_trait]
impl Shortener for TinyUrlShortener {
    async fn shorten(&self, url: &str) -> Result<String, ShortenError> {
        if self.is_passthrough(url) {
            tracing::debug!(url, "Domain passed through without shortening");
            return Ok(url.to_string());
        }

        let endpoint = format!("{}/create", self.base_url);
        let response = self
            .client
            .post(&endpoint)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_token.expose_secret()),
            )
            .json(&serde_json::json!({
                "url": url,
                "domain": "tinyurl.com"
            }))
            .send()
            .await
            .map_err(|e| ShortenError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ShortenError::Api(format!("HTTP {}: {}", status, body)));
        }

        let created: CreateResponse = response
            .json()
            .await
            .map_err(|e| ShortenError::Api(e.to_string()))?;

        if !created.data.tiny_url.starts_with("http") {
            return Err(ShortenError::Api(format!(
                "unexpected short URL: {}",
                created.data.tiny_url
            )));
        }

        Ok(created.data.tiny_url)
    }
}
