//! Channel trait and delivery types.

use async_trait::async_trait;

use crate::error::ChannelError;

/// A message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    pub body: String,
}

impl Notification {
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
        }
    }

    /// Subject and body as one chat-style message.
    pub fn as_chat_text(&self) -> String {
        if self.subject.is_empty() {
            self.body.clone()
        } else {
            format!("*{}*\n{}", self.subject, self.body)
        }
    }
}

/// Outcome of one delivery attempt on one channel.
#[derive(Debug)]
pub enum DeliveryResult {
    Delivered,
    /// Channel not configured.
    Skipped(String),
    Failed(ChannelError),
}

impl DeliveryResult {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::Skipped(_) => "skipped",
            Self::Failed(_) => "failed",
        }
    }
}

/// An outbound delivery channel.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Channel name (e.g., "email", "webhook").
    fn name(&self) -> &str;

    /// Deliver one notification.
    async fn send(&self, notification: &Notification) -> Result<(), ChannelError>;
}
