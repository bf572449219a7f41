//! Startup wiring: configuration, credentials, store.
//!
//! Every failure here happens before any row is read and maps to a process
//! exit status through [`StartupError::exit_code`].

use std::sync::Arc;

use tracing::info;

use crate::config::{RelayConfig, StoreConfig};
use crate::error::StartupError;
use crate::store::{ServiceAccountAuth, SheetsEndpoints, SheetsStore};

/// Read the relay configuration from the process environment.
pub fn load_config_from_env() -> Result<RelayConfig, StartupError> {
    Ok(RelayConfig::from_env()?)
}

/// Read the relay configuration from an arbitrary key lookup.
pub fn load_config<F>(lookup: F) -> Result<RelayConfig, StartupError>
where
    F: Fn(&str) -> Option<String>,
{
    Ok(RelayConfig::from_lookup(lookup)?)
}

/// Load the service-account key and open the spreadsheet.
///
/// An unreadable key file is a configuration error; anything that fails
/// while talking to Google is a store error.
pub async fn open_store(
    config: &StoreConfig,
    endpoints: SheetsEndpoints,
) -> Result<SheetsStore, StartupError> {
    let auth = ServiceAccountAuth::from_file(&config.credentials_path)?;
    info!(client_email = %auth.client_email(), "Loaded service account key");

    Ok(SheetsStore::open(config, Arc::new(auth), endpoints).await?)
}
