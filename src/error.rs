//! Error types for inquiry-relay.

/// Exit status when the run completed, whatever happened to individual rows.
pub const EXIT_OK: u8 = 0;

/// Exit status when the store can't be opened or read.
pub const EXIT_STORE: u8 = 1;

/// Exit status for configuration problems (nothing was touched).
pub const EXIT_CONFIG: u8 = 2;

/// Anything that stops the relay before the per-row loop starts.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl StartupError {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => EXIT_CONFIG,
            Self::Store(_) => EXIT_STORE,
        }
    }
}

/// Configuration-related errors. Always fatal, raised before any row is touched.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Row store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Read side failed; nothing can be processed this run.
    #[error("Store unavailable: {reason}")]
    Unavailable { reason: String },

    /// A single row's write-back could not be committed.
    #[error("Failed to write row {row_index}: {reason}")]
    Write { row_index: u32, reason: String },

    /// Appending to the processed log sheet failed.
    #[error("Failed to append processed log: {0}")]
    Log(String),
}

impl StoreError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },
}

/// Delivery channel errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Failed to send on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("Authentication failed for channel {name}: {reason}")]
    AuthFailed { name: String, reason: String },

    #[error("Channel {name} rejected the message: {reason}")]
    Rejected { name: String, reason: String },

    #[error("Invalid message for channel {name}: {reason}")]
    InvalidMessage { name: String, reason: String },
}

impl ChannelError {
    pub fn send_failed(name: &str, reason: impl Into<String>) -> Self {
        Self::SendFailed {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}
