//! Client configuration.
//!
//! The base API URL is fixed for the lifetime of the process and comes from
//! the environment unless the caller supplies it directly:
//!
//! - `TOUR_API_URL`: base URL of the backend (required).
//! - `TOUR_HTTP_TIMEOUT_SECS`: per-request timeout, default 30.

use std::env;
use std::time::Duration;

use crate::error::ApiError;

pub const API_URL_VAR: &str = "TOUR_API_URL";
pub const TIMEOUT_VAR: &str = "TOUR_HTTP_TIMEOUT_SECS";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_url: String,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(api_url: &str) -> Self {
        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn from_env() -> Result<Self, ApiError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Like [`ClientConfig::from_env`] but reads variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ApiError> {
        let api_url = lookup(API_URL_VAR)
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| ApiError::Config(format!("{API_URL_VAR} is not set")))?;

        let timeout = lookup(TIMEOUT_VAR)
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT);

        Ok(Self::new(api_url.trim()).with_timeout(timeout))
    }
}
