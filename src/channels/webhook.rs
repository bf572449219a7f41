//! Chat webhook channel: one JSON POST per notification.

use std::time::Duration;

use async_trait::async_trait;

use super::channel::{Notification, NotificationChannel};
use crate::config::{HTTP_TIMEOUT, http_client};
use crate::error::ChannelError;

/// Posts `{"text": ...}` to an incoming-webhook URL (Slack, Google Chat, Teams-style).
pub struct WebhookChannel {
    url: String,
    client: reqwest::Client,
}

impl WebhookChannel {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_timeout(url, HTTP_TIMEOUT)
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            client: http_client(timeout),
        }
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, notification: &Notification) -> Result<(), ChannelError> {
        let body = serde_json::json!({ "text": notification.as_chat_text() });

        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::send_failed("webhook", e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let err = resp.text().await.unwrap_or_default();
            return Err(ChannelError::Rejected {
                name: "webhook".into(),
                reason: format!("HTTP {status}: {err}"),
            });
        }

        tracing::debug!(status = %status, "Webhook accepted notification");
        Ok(())
    }
}
