//! Email channel: SMTP via lettre.
//!
//! Submits over implicit TLS on 465 first; if that connection can't be
//! established it retries once with STARTTLS on 587.

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::{ExposeSecret, SecretString};
use tracing::{info, warn};

use super::channel::{Notification, NotificationChannel};
use crate::error::ChannelError;

pub const SMTPS_PORT: u16 = 465;
pub const SUBMISSION_PORT: u16 = 587;

/// Email channel configuration.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub username: String,
    /// App-specific password.
    pub password: SecretString,
    pub from_address: String,
    pub to_address: String,
    pub timeout: Duration,
}

/// Which transport mode a send went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SmtpMode {
    ImplicitTls,
    StartTls,
}

impl SmtpMode {
    fn port(self) -> u16 {
        match self {
            Self::ImplicitTls => SMTPS_PORT,
            Self::StartTls => SUBMISSION_PORT,
        }
    }
}

/// Email channel: SMTP (outbound only).
pub struct EmailChannel {
    config: EmailConfig,
}

impl EmailChannel {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    fn transport(config: &EmailConfig, mode: SmtpMode) -> Result<SmtpTransport, ChannelError> {
        let creds = Credentials::new(
            config.username.clone(),
            config.password.expose_secret().to_string(),
        );

        let builder = match mode {
            SmtpMode::ImplicitTls => SmtpTransport::relay(&config.smtp_host),
            SmtpMode::StartTls => SmtpTransport::starttls_relay(&config.smtp_host),
        }
        .map_err(|e| ChannelError::send_failed("email", format!("SMTP relay error: {e}")))?;

        Ok(builder
            .port(mode.port())
            .credentials(creds)
            .timeout(Some(config.timeout))
            .build())
    }

    /// Blocking send with the 465 → 587 fallback.
    fn send_blocking(config: &EmailConfig, email: &Message) -> Result<SmtpMode, ChannelError> {
        let first = Self::transport(config, SmtpMode::ImplicitTls)?.send(email);
        let first_err = match first {
            Ok(_) => return Ok(SmtpMode::ImplicitTls),
            Err(e) => e,
        };

        // A reply code means the server was reached; retrying on another port won't help.
        if first_err.is_permanent() || first_err.is_transient() {
            return Err(classify_smtp_error(first_err));
        }

        warn!(
            host = %config.smtp_host,
            error = %first_err,
            "SMTP over port {SMTPS_PORT} failed; trying STARTTLS on {SUBMISSION_PORT}"
        );

        Self::transport(config, SmtpMode::StartTls)?
            .send(email)
            .map(|_| SmtpMode::StartTls)
            .map_err(classify_smtp_error)
    }
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    fn name(&self) -> &str {
        "email"
    }

    async fn send(&self, notification: &Notification) -> Result<(), ChannelError> {
        let email = build_message(&self.config, notification)?;
        let config = self.config.clone();

        let mode = tokio::task::spawn_blocking(move || Self::send_blocking(&config, &email))
            .await
            .map_err(|e| ChannelError::send_failed("email", format!("SMTP task panicked: {e}")))??;

        info!(
            to = %self.config.to_address,
            port = mode.port(),
            "Email sent"
        );
        Ok(())
    }
}

// ── Helpers (public for testing) ────────────────────────────────────

/// Build the outgoing message for a notification.
pub fn build_message(
    config: &EmailConfig,
    notification: &Notification,
) -> Result<Message, ChannelError> {
    let invalid = |reason: String| ChannelError::InvalidMessage {
        name: "email".into(),
        reason,
    };

    Message::builder()
        .from(
            config
                .from_address
                .parse()
                .map_err(|e| invalid(format!("Invalid from address: {e}")))?,
        )
        .to(config
            .to_address
            .parse()
            .map_err(|e| invalid(format!("Invalid to address: {e}")))?)
        .subject(notification.subject.as_str())
        .header(ContentType::TEXT_PLAIN)
        .body(notification.body.clone())
        .map_err(|e| invalid(format!("Failed to build email: {e}")))
}

fn classify_smtp_error(e: lettre::transport::smtp::Error) -> ChannelError {
    // 535 and friends: bad username / app password.
    let auth_rejected = e
        .status()
        .map(|code| code.to_string().starts_with("53"))
        .unwrap_or(false);

    if auth_rejected {
        ChannelError::AuthFailed {
            name: "email".into(),
            reason: e.to_string(),
        }
    } else {
        ChannelError::send_failed("email", format!("SMTP send failed: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EmailConfig {
        EmailConfig {
            smtp_host: "127.0.0.1".into(),
            username: "clinic@example.com".into(),
            password: SecretString::from("app-password"),
            from_address: "clinic@example.com".into(),
            to_address: "frontdesk@example.com".into(),
            timeout: Duration::from_millis(200),
        }
    }

    #[test]
    fn build_message_sets_headers_and_body() {
        let notification = Notification::new("New Inquiry", "How do I refill my prescription?");
        let message = build_message(&config(), &notification).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains("To: frontdesk@example.com"));
        assert!(raw.contains("From: clinic@example.com"));
        assert!(raw.contains("Subject: New Inquiry"));
        assert!(raw.contains("How do I refill my prescription?"));
    }

    #[test]
    fn build_message_rejects_bad_recipient() {
        let mut cfg = config();
        cfg.to_address = "not an address".into();
        let err = build_message(&cfg, &Notification::new("s", "b")).unwrap_err();
        assert!(matches!(err, ChannelError::InvalidMessage { .. }));
    }

    #[test]
    fn ports_follow_mode() {
        assert_eq!(SmtpMode::ImplicitTls.port(), 465);
        assert_eq!(SmtpMode::StartTls.port(), 587);
    }

    #[tokio::test]
    async fn unreachable_relay_reports_failure() {
        // Nothing listens on 127.0.0.1:465/587 in the test environment.
        let _ = rustls::crypto::ring::default_provider().install_default();
        let channel = EmailChannel::new(config());
        let result = channel.send(&Notification::new("s", "b")).await;
        assert!(result.is_err());
    }
}
