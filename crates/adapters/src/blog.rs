//! Content-host publisher with post-publish verification
//!
//! Publishing is two steps: create the post, then poll the returned URL
//! until it answers 200. Only a verified URL is reported back; a post that
//! never becomes reachable is treated as not published so the pipeline can
//! fall back to the source link.

use async_trait::async_trait;
use jobcast_domain::{Artifact, Channel, ChannelPost, ChannelPublisher, PublishError};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Blogger-style content-host publisher
pub struct BlogPublisher {
    client: Client,
    token: SecretString,
    base_url: String,
    blog_id: String,
    verify_attempts: u32,
    verify_delay: Duration,
    enabled: bool,
}

impl BlogPublisher {
    pub fn new(token: SecretString, blog_id: String) -> Self {
        Self::with_base_url(
            token,
            "https://blogger.googleapis.com".to_string(),
            blog_id,
            3,
            Duration::from_secs(2),
            true,
        )
    }

    pub fn with_base_url(
        token: SecretString,
        base_url: String,
        blog_id: String,
        verify_attempts: u32,
        verify_delay: Duration,
        enabled: bool,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            token,
            base_url,
            blog_id,
            verify_attempts,
            verify_delay,
            enabled,
        }
    }

    /// Create a disabled publisher (for runs without the blog channel)
    pub fn disabled() -> Self {
        Self {
            client: Client::new(),
            token: SecretString::new("".into()),
            base_url: String::new(),
            blog_id: String::new(),
            verify_attempts: 0,
            verify_delay: Duration::ZERO,
            enabled: false,
        }
    }

    async fn create_post(&self, title: &str, html: &str) -> Result<String, PublishError> {
        let url = format!("{}/v3/blogs/{}/posts/", self.base_url, self.blog_id);
        let request = CreatePostRequest {
            title,
            content: html,
        };

        let response = self
            .client
            .post(&url)
            .query(&[("isDraft", "false")])
            .header(
                "Authorization",
                format!("Bearer {}", self.token.expose_secret()),
            )
            .json(&request)
            .send()
            .await
            .map_err(|e| PublishError::Api(e.to_string()))?;

        if response.status() == 401 || response.status() == 403 {
            return Err(PublishError::Auth(
                "content host rejected the token".to_string(),
            ));
        }
        if response.status() == 429 {
            return Err(PublishError::RateLimited);
        }
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::Api(format!("create post failed: {}", body)));
        }

        let created: CreatePostResponse = response
            .json()
            .await
            .map_err(|e| PublishError::Api(e.to_string()))?;

        Ok(created.url)
    }

    /// Poll the published URL until it answers 200, with a fixed delay
    /// between attempts
    async fn verify(&self, url: &str) -> bool {
        for attempt in 1..=self.verify_attempts {
            match self.client.get(url).send().await {
                Ok(response) if response.status() == 200 => {
                    tracing::debug!(url, attempt, "Published URL verified");
                    return true;
                }
                Ok(response) => {
                    tracing::debug!(
                        url,
                        attempt,
                        status = %response.status(),
                        "Verification attempt failed"
                    );
                }
                Err(error) => {
                    tracing::debug!(url, attempt, %error, "Verification attempt failed");
                }
            }
            if attempt < self.verify_attempts {
                tokio::time::sleep(self.verify_delay).await;
            }
        }
        false
    }
}

#[derive(Serialize)]
struct CreatePostRequest<'a> {
    title: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct CreatePostResponse {
    url: String,
}

#[async_trait]
impl ChannelPublisher for BlogPublisher {
    async fn publish(&self, artifact: &Artifact) -> Result<ChannelPost, PublishError> {
        if !self.enabled {
            return Err(PublishError::Api("publisher is disabled".to_string()));
        }

        let url = self
            .create_post(&artifact.title, &artifact.document_html)
            .await?;

        if self.verify(&url).await {
            Ok(ChannelPost { link: Some(url) })
        } else {
            Err(PublishError::VerificationFailed { url })
        }
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn channel(&self) -> Channel {
        Channel::Blog
    }
}
