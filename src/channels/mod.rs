//! Delivery channels for inquiry notifications.

pub mod channel;
pub mod email;
pub mod manager;
pub mod slack;
pub mod webhook;

pub use channel::*;
pub use email::EmailChannel;
pub use manager::{DeliveryReport, Notifier};
pub use slack::SlackChannel;
pub use webhook::WebhookChannel;

use crate::config::RelayConfig;

/// Build the notifier for a run: every known channel gets a slot, configured or not.
pub fn notifier_from_config(config: &RelayConfig) -> Notifier {
    let mut notifier = Notifier::new();

    match &config.email {
        Some(email) => notifier.add(Box::new(EmailChannel::new(email.clone()))),
        None => notifier.add_unconfigured("email", "EMAIL_USER/EMAIL_PASS not set"),
    }

    match &config.webhook_url {
        Some(url) => notifier.add(Box::new(WebhookChannel::new(url.clone()))),
        None => notifier.add_unconfigured("webhook", "CHAT_WEBHOOK_URL not set"),
    }

    match &config.slack {
        Some(slack) => notifier.add(Box::new(SlackChannel::new(slack.clone()))),
        None => notifier.add_unconfigured("slack", "SLACK_BOT_TOKEN/SLACK_CHANNEL_ID not set"),
    }

    notifier
}
