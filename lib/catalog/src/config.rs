use crate::error::{CatalogError, Result};
use std::fmt;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://api.discogs.com";
pub const DEFAULT_USER_AGENT: &str = "NextSpinVinylApp/1.0";
pub const DEFAULT_DELAY: Duration = Duration::from_millis(1000);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_CONCURRENCY: usize = 1;

/// Settings for talking to the catalog service.
#[derive(Clone)]
pub struct CatalogConfig {
    pub token: Option<String>,
    pub api_base: String,
    pub user_agent: String,
    /// Minimum spacing between any two requests
    pub delay: Duration,
    /// Per-request timeout; an expired request counts as no data
    pub timeout: Duration,
    /// Items enriched in parallel
    pub concurrency: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_base: DEFAULT_API_BASE.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            delay: DEFAULT_DELAY,
            timeout: DEFAULT_TIMEOUT,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl fmt::Debug for CatalogConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogConfig")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("api_base", &self.api_base)
            .field("user_agent", &self.user_agent)
            .field("delay", &self.delay)
            .field("timeout", &self.timeout)
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

impl CatalogConfig {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..Default::default()
        }
    }

    /// Check everything a client needs before the first request.
    pub fn validate(&self) -> Result<()> {
        self.token()?;
        if !(self.api_base.starts_with("http://") || self.api_base.starts_with("https://")) {
            return Err(CatalogError::InvalidConfig(format!(
                "api base must be an http(s) URL, got '{}'",
                self.api_base
            )));
        }
        if self.user_agent.trim().is_empty() {
            return Err(CatalogError::InvalidConfig("user agent must not be empty".into()));
        }
        if self.timeout.is_zero() {
            return Err(CatalogError::InvalidConfig("timeout must be greater than zero".into()));
        }
        if self.concurrency == 0 {
            return Err(CatalogError::InvalidConfig("concurrency must be at least 1".into()));
        }
        Ok(())
    }

    pub fn token(&self) -> Result<&str> {
        self.token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(CatalogError::MissingCredential)
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base.trim_end_matches('/'), path)
    }
}
