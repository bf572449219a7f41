//! Configuration types.
//!
//! Everything is read once from the environment at startup. Optional values
//! that are absent disable the feature they belong to; missing required
//! values are a [`ConfigError`] and abort the run before any row is touched.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::channels::email::EmailConfig;
use crate::error::ConfigError;
use crate::llm::{LlmBackend, LlmConfig};

/// Default service-account key file, relative to the working directory.
pub const DEFAULT_CREDENTIALS_PATH: &str = "creds.json";

/// Default name of the processed-log worksheet.
pub const DEFAULT_LOG_SHEET: &str = "Processed";

/// Default SMTP relay.
pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";

/// Per-request timeout for every outbound HTTP call.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client with a request timeout.
pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Falling back to a default HTTP client");
            reqwest::Client::new()
        })
}

/// When a handled row gets its processed flag written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MarkPolicy {
    /// Mark every row that went through the loop, whatever the delivery outcome.
    #[default]
    MarkOnAttempt,
    /// Mark only rows delivered on at least one channel.
    MarkOnSuccess,
}

impl MarkPolicy {
    pub fn label(&self) -> &'static str {
        match self {
            Self::MarkOnAttempt => "mark-on-attempt",
            Self::MarkOnSuccess => "mark-on-success",
        }
    }
}

impl FromStr for MarkPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mark-on-attempt" | "attempt" => Ok(Self::MarkOnAttempt),
            "mark-on-success" | "success" => Ok(Self::MarkOnSuccess),
            other => Err(ConfigError::InvalidValue {
                key: "MARK_POLICY".into(),
                message: format!("expected mark-on-attempt or mark-on-success, got '{other}'"),
            }),
        }
    }
}

/// How the spreadsheet is located.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpreadsheetRef {
    Id(String),
    /// Resolved through a Drive lookup; needs the drive.readonly scope.
    Name(String),
}

/// Row store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub spreadsheet: SpreadsheetRef,
    pub credentials_path: PathBuf,
    /// Worksheet receiving one audit line per handled row. `None` disables it.
    pub log_sheet: Option<String>,
}

/// Slack bot configuration.
#[derive(Debug, Clone)]
pub struct SlackConfig {
    pub bot_token: SecretString,
    pub channel_id: String,
}

/// Full configuration for one relay run.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub store: StoreConfig,
    pub email: Option<EmailConfig>,
    pub webhook_url: Option<String>,
    pub slack: Option<SlackConfig>,
    pub llm: Option<LlmConfig>,
    pub mark_policy: MarkPolicy,
}

impl RelayConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let store = store_config(&get)?;
        let email = email_config(&get)?;
        let slack = slack_config(&get)?;
        let llm = llm_config(&get)?;

        let mark_policy = match get("MARK_POLICY") {
            Some(raw) => raw.parse()?,
            None => MarkPolicy::default(),
        };

        Ok(Self {
            store,
            email,
            webhook_url: get("CHAT_WEBHOOK_URL"),
            slack,
            llm,
            mark_policy,
        })
    }

    /// Names of the delivery channels that are configured.
    pub fn enabled_channels(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.email.is_some() {
            names.push("email");
        }
        if self.webhook_url.is_some() {
            names.push("webhook");
        }
        if self.slack.is_some() {
            names.push("slack");
        }
        names
    }
}

fn store_config(get: &impl Fn(&str) -> Option<String>) -> Result<StoreConfig, ConfigError> {
    let spreadsheet = match (get("SPREADSHEET_ID"), get("SPREADSHEET_NAME")) {
        (Some(id), _) => SpreadsheetRef::Id(id),
        (None, Some(name)) => SpreadsheetRef::Name(name),
        (None, None) => {
            return Err(ConfigError::MissingRequired {
                key: "SPREADSHEET_ID".into(),
                hint: "Provide SPREADSHEET_ID (preferred) or SPREADSHEET_NAME.".into(),
            });
        }
    };

    let credentials_path = PathBuf::from(
        get("GOOGLE_CREDENTIALS_PATH").unwrap_or_else(|| DEFAULT_CREDENTIALS_PATH.to_string()),
    );
    if !credentials_path.is_file() {
        return Err(ConfigError::MissingRequired {
            key: "GOOGLE_CREDENTIALS_PATH".into(),
            hint: format!(
                "Service account key not found at {}.",
                credentials_path.display()
            ),
        });
    }

    let log_sheet = if is_truthy(get("PROCESSED_SHEET_DISABLED")) {
        None
    } else {
        Some(get("PROCESSED_SHEET").unwrap_or_else(|| DEFAULT_LOG_SHEET.to_string()))
    };

    Ok(StoreConfig {
        spreadsheet,
        credentials_path,
        log_sheet,
    })
}

fn is_truthy(value: Option<String>) -> bool {
    matches!(
        value.map(|v| v.to_ascii_lowercase()).as_deref(),
        Some("1" | "true" | "yes")
    )
}

fn email_config(get: &impl Fn(&str) -> Option<String>) -> Result<Option<EmailConfig>, ConfigError> {
    let (username, password) = match (get("EMAIL_USER"), get("EMAIL_PASS")) {
        (Some(user), Some(pass)) => (user, pass),
        (None, None) => return Ok(None),
        (Some(_), None) => {
            return Err(ConfigError::MissingRequired {
                key: "EMAIL_PASS".into(),
                hint: "EMAIL_USER is set; provide the matching app password.".into(),
            });
        }
        (None, Some(_)) => {
            return Err(ConfigError::MissingRequired {
                key: "EMAIL_USER".into(),
                hint: "EMAIL_PASS is set; provide the account it belongs to.".into(),
            });
        }
    };

    let smtp_host = get("EMAIL_SMTP_HOST").unwrap_or_else(|| DEFAULT_SMTP_HOST.to_string());
    let to_address = get("EMAIL_TO").unwrap_or_else(|| username.clone());

    Ok(Some(EmailConfig {
        smtp_host,
        from_address: username.clone(),
        to_address,
        username,
        password: SecretString::from(password),
        timeout: std::time::Duration::from_secs(30),
    }))
}

fn slack_config(get: &impl Fn(&str) -> Option<String>) -> Result<Option<SlackConfig>, ConfigError> {
    match (get("SLACK_BOT_TOKEN"), get("SLACK_CHANNEL_ID")) {
        (Some(token), Some(channel_id)) => Ok(Some(SlackConfig {
            bot_token: SecretString::from(token),
            channel_id,
        })),
        (None, None) => Ok(None),
        (Some(_), None) => Err(ConfigError::MissingRequired {
            key: "SLACK_CHANNEL_ID".into(),
            hint: "SLACK_BOT_TOKEN is set; provide the channel to post into.".into(),
        }),
        (None, Some(_)) => Err(ConfigError::MissingRequired {
            key: "SLACK_BOT_TOKEN".into(),
            hint: "SLACK_CHANNEL_ID is set; provide the bot token.".into(),
        }),
    }
}

fn llm_config(get: &impl Fn(&str) -> Option<String>) -> Result<Option<LlmConfig>, ConfigError> {
    let backend = match get("LLM_BACKEND") {
        Some(raw) => raw.parse::<LlmBackend>()?,
        None => LlmBackend::OpenAi,
    };

    let api_key = match backend {
        LlmBackend::OpenAi => get("OPENAI_API_KEY"),
        LlmBackend::Anthropic => get("ANTHROPIC_API_KEY"),
    };

    Ok(api_key.map(|key| LlmConfig {
        backend,
        api_key: SecretString::from(key),
        model: get("SUMMARY_MODEL").unwrap_or_else(|| backend.default_model().to_string()),
    }))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn creds_file() -> tempfile::NamedTempFile {
        tempfile::NamedTempFile::new().unwrap()
    }

    #[test]
    fn minimal_config_disables_optional_features() {
        let creds = creds_file();
        let path = creds.path().to_str().unwrap();
        let config = RelayConfig::from_lookup(lookup(&[
            ("SPREADSHEET_ID", "sheet-123"),
            ("GOOGLE_CREDENTIALS_PATH", path),
        ]))
        .unwrap();

        assert_eq!(config.store.spreadsheet, SpreadsheetRef::Id("sheet-123".into()));
        assert_eq!(config.store.log_sheet.as_deref(), Some(DEFAULT_LOG_SHEET));
        assert!(config.email.is_none());
        assert!(config.webhook_url.is_none());
        assert!(config.slack.is_none());
        assert!(config.llm.is_none());
        assert_eq!(config.mark_policy, MarkPolicy::MarkOnAttempt);
        assert!(config.enabled_channels().is_empty());
    }

    #[test]
    fn missing_spreadsheet_is_fatal() {
        let creds = creds_file();
        let err = RelayConfig::from_lookup(lookup(&[(
            "GOOGLE_CREDENTIALS_PATH",
            creds.path().to_str().unwrap(),
        )]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired { ref key, .. } if key == "SPREADSHEET_ID"));
    }

    #[test]
    fn spreadsheet_name_used_when_no_id() {
        let creds = creds_file();
        let config = RelayConfig::from_lookup(lookup(&[
            ("SPREADSHEET_NAME", "Patient_Inquiries"),
            ("GOOGLE_CREDENTIALS_PATH", creds.path().to_str().unwrap()),
        ]))
        .unwrap();
        assert_eq!(
            config.store.spreadsheet,
            SpreadsheetRef::Name("Patient_Inquiries".into())
        );
    }

    #[test]
    fn missing_credentials_file_is_fatal() {
        let err = RelayConfig::from_lookup(lookup(&[
            ("SPREADSHEET_ID", "sheet-123"),
            ("GOOGLE_CREDENTIALS_PATH", "/definitely/not/here/creds.json"),
        ]))
        .unwrap_err();
        assert!(
            matches!(err, ConfigError::MissingRequired { ref key, .. } if key == "GOOGLE_CREDENTIALS_PATH")
        );
    }

    #[test]
    fn email_pair_enables_channel_and_defaults_recipient() {
        let creds = creds_file();
        let config = RelayConfig::from_lookup(lookup(&[
            ("SPREADSHEET_ID", "sheet-123"),
            ("GOOGLE_CREDENTIALS_PATH", creds.path().to_str().unwrap()),
            ("EMAIL_USER", " clinic@example.com "),
            ("EMAIL_PASS", "abcd efgh ijkl mnop"),
        ]))
        .unwrap();

        let email = config.email.as_ref().expect("email configured");
        assert_eq!(email.username, "clinic@example.com");
        assert_eq!(email.to_address, "clinic@example.com");
        assert_eq!(email.smtp_host, DEFAULT_SMTP_HOST);
        assert_eq!(email.password.expose_secret(), "abcd efgh ijkl mnop");
        assert_eq!(config.enabled_channels(), vec!["email"]);
    }

    #[test]
    fn half_configured_email_is_an_error() {
        let creds = creds_file();
        let err = RelayConfig::from_lookup(lookup(&[
            ("SPREADSHEET_ID", "sheet-123"),
            ("GOOGLE_CREDENTIALS_PATH", creds.path().to_str().unwrap()),
            ("EMAIL_USER", "clinic@example.com"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired { ref key, .. } if key == "EMAIL_PASS"));
    }

    #[test]
    fn empty_values_count_as_absent() {
        let creds = creds_file();
        let config = RelayConfig::from_lookup(lookup(&[
            ("SPREADSHEET_ID", "sheet-123"),
            ("GOOGLE_CREDENTIALS_PATH", creds.path().to_str().unwrap()),
            ("OPENAI_API_KEY", "   "),
            ("CHAT_WEBHOOK_URL", ""),
        ]))
        .unwrap();
        assert!(config.llm.is_none());
        assert!(config.webhook_url.is_none());
    }

    #[test]
    fn llm_backend_selects_key_and_default_model() {
        let creds = creds_file();
        let config = RelayConfig::from_lookup(lookup(&[
            ("SPREADSHEET_ID", "sheet-123"),
            ("GOOGLE_CREDENTIALS_PATH", creds.path().to_str().unwrap()),
            ("LLM_BACKEND", "anthropic"),
            ("OPENAI_API_KEY", "sk-ignored"),
            ("ANTHROPIC_API_KEY", "sk-ant-test"),
        ]))
        .unwrap();

        let llm = config.llm.expect("llm configured");
        assert_eq!(llm.backend, LlmBackend::Anthropic);
        assert_eq!(llm.api_key.expose_secret(), "sk-ant-test");
        assert_eq!(llm.model, LlmBackend::Anthropic.default_model());
    }

    #[test]
    fn mark_policy_parses_and_rejects_unknown() {
        assert_eq!(
            "mark-on-success".parse::<MarkPolicy>().unwrap(),
            MarkPolicy::MarkOnSuccess
        );
        assert_eq!(
            " Mark-On-Attempt ".parse::<MarkPolicy>().unwrap(),
            MarkPolicy::MarkOnAttempt
        );
        assert!("sometimes".parse::<MarkPolicy>().is_err());
    }

    #[test]
    fn log_sheet_can_be_disabled() {
        let creds = creds_file();
        let config = RelayConfig::from_lookup(lookup(&[
            ("SPREADSHEET_ID", "sheet-123"),
            ("GOOGLE_CREDENTIALS_PATH", creds.path().to_str().unwrap()),
            ("PROCESSED_SHEET_DISABLED", "true"),
        ]))
        .unwrap();
        assert!(config.store.log_sheet.is_none());
    }
}
