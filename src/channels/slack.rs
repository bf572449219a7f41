//! Slack channel: `chat.postMessage` with a bot token.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Deserialize;

use super::channel::{Notification, NotificationChannel};
use crate::config::{HTTP_TIMEOUT, SlackConfig, http_client};
use crate::error::ChannelError;

pub const SLACK_API_BASE: &str = "https://slack.com/api";

#[derive(Debug, Deserialize)]
struct SlackResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Slack Web API channel.
pub struct SlackChannel {
    config: SlackConfig,
    api_base: String,
    client: reqwest::Client,
}

impl SlackChannel {
    pub fn new(config: SlackConfig) -> Self {
        Self::with_api_base(config, SLACK_API_BASE)
    }

    pub fn with_api_base(config: SlackConfig, api_base: impl Into<String>) -> Self {
        Self {
            config,
            api_base: api_base.into(),
            client: http_client(HTTP_TIMEOUT),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/{method}", self.api_base.trim_end_matches('/'))
    }
}

#[async_trait]
impl NotificationChannel for SlackChannel {
    fn name(&self) -> &str {
        "slack"
    }

    async fn send(&self, notification: &Notification) -> Result<(), ChannelError> {
        let body = serde_json::json!({
            "channel": self.config.channel_id,
            "text": notification.as_chat_text(),
        });

        let resp = self
            .client
            .post(self.api_url("chat.postMessage"))
            .bearer_auth(self.config.bot_token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::send_failed("slack", e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let err = resp.text().await.unwrap_or_default();
            return Err(ChannelError::Rejected {
                name: "slack".into(),
                reason: format!("HTTP {status}: {err}"),
            });
        }

        // Slack reports most failures as 200 with ok=false.
        let parsed: SlackResponse = resp
            .json()
            .await
            .map_err(|e| ChannelError::send_failed("slack", format!("malformed response: {e}")))?;

        match (parsed.ok, parsed.error.as_deref()) {
            (true, _) => Ok(()),
            (false, Some(code @ ("invalid_auth" | "not_authed" | "account_inactive"))) => {
                Err(ChannelError::AuthFailed {
                    name: "slack".into(),
                    reason: code.to_string(),
                })
            }
            (false, code) => Err(ChannelError::Rejected {
                name: "slack".into(),
                reason: code.unwrap_or("unknown error").to_string(),
            }),
        }
    }
}
