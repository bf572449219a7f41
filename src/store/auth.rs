//! Google service-account authentication.
//!
//! The key file's `client_email` must have been granted editor access to the
//! spreadsheet out of band. Tokens come from the OAuth2 JWT-bearer flow and
//! are cached until shortly before they expire.

use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::{HTTP_TIMEOUT, http_client};
use crate::error::{ConfigError, StoreError};

pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
pub const DRIVE_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/drive.readonly";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Assertion lifetime; Google caps this at one hour.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Refresh this long before the cached token expires.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Anything that can hand out a bearer token for the store APIs.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self) -> Result<SecretString, StoreError>;
}

/// A pre-issued token, used as-is.
pub struct StaticToken(SecretString);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }
}

#[async_trait]
impl AccessTokenSource for StaticToken {
    async fn access_token(&self) -> Result<SecretString, StoreError> {
        Ok(self.0.clone())
    }
}

/// The fields of a service-account JSON key we rely on.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: SecretString,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(raw)
            .map_err(|e| ConfigError::ParseError(format!("service account key: {e}")))
    }
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: String,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    ASSERTION_LIFETIME_SECS as u64
}

struct CachedToken {
    token: SecretString,
    expires_at: Instant,
}

/// Service-account token source with an in-memory cache.
pub struct ServiceAccountAuth {
    key: ServiceAccountKey,
    scopes: Vec<String>,
    http: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountAuth {
    pub fn new(key: ServiceAccountKey, scopes: &[&str]) -> Self {
        Self {
            key,
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
            http: http_client(HTTP_TIMEOUT),
            cached: Mutex::new(None),
        }
    }

    /// Load the key file and request the sheets + drive.readonly scopes.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let key = ServiceAccountKey::from_file(path)?;
        Ok(Self::new(key, &[SHEETS_SCOPE, DRIVE_READONLY_SCOPE]))
    }

    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    fn signed_assertion(&self) -> Result<String, StoreError> {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            iss: &self.key.client_email,
            scope: self.scopes.join(" "),
            aud: &self.key.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        let signing_key = EncodingKey::from_rsa_pem(self.key.private_key.expose_secret().as_bytes())
            .map_err(|e| StoreError::unavailable(format!("invalid service account key: {e}")))?;
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &signing_key)
            .map_err(|e| StoreError::unavailable(format!("failed to sign assertion: {e}")))
    }

    async fn exchange(&self) -> Result<CachedToken, StoreError> {
        let assertion = self.signed_assertion()?;
        let response = self
            .http
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| StoreError::unavailable(format!("token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::unavailable(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| StoreError::unavailable(format!("malformed token response: {e}")))?;

        debug!(
            client_email = %self.key.client_email,
            expires_in = token.expires_in,
            "Obtained service account access token"
        );

        Ok(CachedToken {
            token: SecretString::from(token.access_token),
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        })
    }
}

#[async_trait]
impl AccessTokenSource for ServiceAccountAuth {
    async fn access_token(&self) -> Result<SecretString, StoreError> {
        let mut cached = self.cached.lock().await;
        if let Some(ref current) = *cached
            && Instant::now() + EXPIRY_MARGIN < current.expires_at
        {
            return Ok(current.token.clone());
        }
        let fresh = self.exchange().await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }
}
