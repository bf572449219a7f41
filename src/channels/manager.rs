//! Notifier: fans one notification out to every channel slot.

use tracing::{debug, info, warn};

use super::channel::{DeliveryResult, Notification, NotificationChannel};

enum Slot {
    Configured(Box<dyn NotificationChannel>),
    Unconfigured { name: String, reason: String },
}

impl Slot {
    fn name(&self) -> &str {
        match self {
            Self::Configured(channel) => channel.name(),
            Self::Unconfigured { name, .. } => name,
        }
    }
}

/// Per-channel results for one notification, in slot order.
#[derive(Debug, Default)]
pub struct DeliveryReport {
    pub results: Vec<(String, DeliveryResult)>,
}

impl DeliveryReport {
    pub fn delivered(&self) -> usize {
        self.results.iter().filter(|(_, r)| r.is_delivered()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|(_, r)| r.is_failed()).count()
    }

    pub fn any_delivered(&self) -> bool {
        self.delivered() > 0
    }

    pub fn result(&self, channel: &str) -> Option<&DeliveryResult> {
        self.results
            .iter()
            .find(|(name, _)| name == channel)
            .map(|(_, r)| r)
    }
}

/// Ordered set of delivery channels, configured or not.
#[derive(Default)]
pub struct Notifier {
    slots: Vec<Slot>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a configured channel.
    pub fn add(&mut self, channel: Box<dyn NotificationChannel>) {
        self.slots.push(Slot::Configured(channel));
    }

    /// Register a channel that is known but not configured; it reports `Skipped`.
    pub fn add_unconfigured(&mut self, name: impl Into<String>, reason: impl Into<String>) {
        self.slots.push(Slot::Unconfigured {
            name: name.into(),
            reason: reason.into(),
        });
    }

    /// Number of configured channels.
    pub fn configured(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| matches!(s, Slot::Configured(_)))
            .count()
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.slots.iter().map(Slot::name).collect()
    }

    /// Attempt every slot in order. A failure never stops later slots.
    pub async fn notify(&self, notification: &Notification) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        for slot in &self.slots {
            let result = match slot {
                Slot::Unconfigured { reason, .. } => DeliveryResult::Skipped(reason.clone()),
                Slot::Configured(channel) => match channel.send(notification).await {
                    Ok(()) => DeliveryResult::Delivered,
                    Err(e) => DeliveryResult::Failed(e),
                },
            };

            match &result {
                DeliveryResult::Delivered => info!(channel = slot.name(), "Notification delivered"),
                DeliveryResult::Skipped(reason) => {
                    debug!(channel = slot.name(), reason = %reason, "Channel skipped")
                }
                DeliveryResult::Failed(e) => {
                    warn!(channel = slot.name(), error = %e, "Notification delivery failed")
                }
            }

            report.results.push((slot.name().to_string(), result));
        }

        report
    }
}
