use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use dashboard_api::SessionSource;
use dashboard_store::ErrorScope;
use dotenvy::dotenv;

const DEFAULT_API_URL: &str = "http://localhost:5000/";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// CLI configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub session: SessionSource,
    pub timeout: Duration,
    pub error_scope: ErrorScope,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let session = match (lookup("DASHBOARD_SESSION"), lookup("DASHBOARD_SESSION_FILE")) {
            (Some(value), _) => SessionSource::Value(value),
            (None, Some(path)) => SessionSource::File(PathBuf::from(path)),
            (None, None) => SessionSource::None,
        };

        let timeout_secs: u64 = match lookup("DASHBOARD_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse()
                .context("DASHBOARD_TIMEOUT_SECS must be a whole number of seconds")?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        let error_scope = match lookup("DASHBOARD_ERROR_SCOPE") {
            Some(raw) => raw
                .parse::<ErrorScope>()
                .map_err(|e| anyhow!(e))
                .context("DASHBOARD_ERROR_SCOPE is invalid")?,
            None => ErrorScope::default(),
        };

        Ok(Self {
            api_url: lookup("DASHBOARD_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            session,
            timeout: Duration::from_secs(timeout_secs),
            error_scope,
        })
    }
}
