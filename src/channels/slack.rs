//! Slack Web API Client
//!
//! Posts replies with `chat.postMessage` and resolves the bot's own member
//! id with `auth.test`.
//!
//! # Configuration
//!
//! Environment variables:
//! - `SLACK_BOT_TOKEN`: bot OAuth token (`xoxb-...`)
//! - `SLACK_SIGNING_SECRET`: request signing secret for the events receiver
//! - `SLACK_API_BASE`: Web API base URL (default: `https://slack.com/api`)

use super::traits::{ChannelError, ChannelSender};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

/// Slack channel configuration
#[derive(Clone)]
pub struct SlackConfig {
    pub api_base: String,
    pub bot_token: String,
    pub signing_secret: String,
}

impl SlackConfig {
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self {
            api_base: config.slack_api_base.clone(),
            bot_token: config.slack_bot_token.clone(),
            signing_secret: config.slack_signing_secret.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AuthTestResponse {
    ok: bool,
    user_id: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    ts: Option<String>,
    error: Option<String>,
}

/// Slack Web API client
#[derive(Clone)]
pub struct SlackClient {
    client: reqwest::Client,
    api_base: String,
    bot_token: String,
}

impl SlackClient {
    pub fn new(api_base: &str, bot_token: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token: bot_token.trim().to_string(),
        }
    }

    pub fn from_config(config: &SlackConfig) -> Self {
        Self::new(&config.api_base, &config.bot_token)
    }

    /// Verify the token and return the bot's member id
    pub async fn auth_test(&self) -> Result<String, ChannelError> {
        let response = self
            .client
            .post(format!("{}/auth.test", self.api_base))
            .bearer_auth(&self.bot_token)
            .send()
            .await
            .map_err(|e| ChannelError::AuthenticationFailed(e.to_string()))?;

        let result: AuthTestResponse = response
            .json()
            .await
            .map_err(|e| ChannelError::AuthenticationFailed(e.to_string()))?;

        if !result.ok {
            return Err(ChannelError::AuthenticationFailed(
                result.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }

        let user_id = result
            .user_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| {
                ChannelError::AuthenticationFailed("auth.test did not return user_id".to_string())
            })?;

        info!("Slack bot authenticated: {}", user_id);
        Ok(user_id)
    }

    /// Post a message, returning its `ts`
    pub async fn post_message(&self, channel: &str, text: &str) -> Result<String, ChannelError> {
        let response = self
            .client
            .post(format!("{}/chat.postMessage", self.api_base))
            .bearer_auth(&self.bot_token)
            .json(&json!({
                "channel": channel,
                "text": text,
            }))
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ChannelError::SendFailed(format!(
                "Slack error {}: {}",
                status, body
            )));
        }

        let result: PostMessageResponse = response
            .json()
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))?;

        if !result.ok {
            return Err(ChannelError::Api {
                method: "chat.postMessage".to_string(),
                error: result.error.unwrap_or_else(|| "unknown error".to_string()),
            });
        }

        let ts = result.ts.unwrap_or_default();
        debug!("Message sent to {}: ts={}", channel, ts);
        Ok(ts)
    }
}

#[async_trait]
impl ChannelSender for SlackClient {
    async fn send_text(&self, channel_id: &str, text: &str) -> Result<String, ChannelError> {
        self.post_message(channel_id, text).await
    }
}
