//! Configuration for export runs
//!
//! `ExportConfig` carries the run tuning (filter, page and batch sizes,
//! retry schedule, rate limit) and can be loaded from YAML. `Credentials`
//! come from the environment, with `.env` support.

use crate::auth::AuthConfig;
use crate::error::{Error, Result, ResultExt};
use crate::http::{HttpClientConfig, RateLimiterConfig};
use crate::types::{BackoffType, MAX_BATCH_SIZE, MAX_PAGE_SIZE};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Once;
use std::time::Duration;
use tracing::warn;

/// Environment variable holding the API client id
pub const CLIENT_ID_VAR: &str = "CROWDSTRIKE_CLIENT_ID";
/// Environment variable holding the API client secret
pub const CLIENT_SECRET_VAR: &str = "CROWDSTRIKE_CLIENT_SECRET";
/// Environment variable overriding the API base URL
pub const BASE_URL_VAR: &str = "CROWDSTRIKE_BASE_URL";
/// Base URL used when none is configured
pub const DEFAULT_BASE_URL: &str = "https://api.crowdstrike.com";

// ============================================================================
// Export Config
// ============================================================================

/// What happens to records from completed batches when a later batch fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartialResults {
    /// Drop everything fetched so far
    #[default]
    Discard,
    /// Keep records from batches that completed
    Keep,
}

/// Tuning for one export run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Filter expression passed verbatim to the search endpoint
    pub filter: Option<String>,

    /// Identifiers per search call
    pub page_size: u32,

    /// Identifiers per detail call
    pub batch_size: usize,

    /// Retries after the first attempt of each call
    pub max_retries: u32,

    /// Delay before the first retry, doubling afterwards
    pub base_backoff_seconds: f64,

    /// Cap on any single retry delay
    pub max_backoff_seconds: f64,

    /// Timeout for each individual attempt
    pub request_timeout_seconds: u64,

    /// Safety cap on search pages
    pub max_pages: u64,

    /// Shared request budget; 0 disables rate limiting
    pub requests_per_second: u32,

    /// Fate of already fetched records when the detail phase fails
    pub partial_results: PartialResults,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            filter: None,
            page_size: MAX_PAGE_SIZE,
            batch_size: MAX_BATCH_SIZE,
            max_retries: 4,
            base_backoff_seconds: 1.0,
            max_backoff_seconds: 60.0,
            request_timeout_seconds: 30,
            max_pages: crate::engine::DEFAULT_MAX_PAGES,
            requests_per_second: 10,
            partial_results: PartialResults::Discard,
        }
    }
}

impl ExportConfig {
    /// Load a config from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound {
                path: path.display().to_string(),
            });
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml_str(&content)
            .with_context(|| format!("Invalid config in {}", path.display()))
    }

    /// Parse a config from YAML text
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Check and normalise the config.
    ///
    /// Sizes above the endpoint maxima are lowered with a warning; zero
    /// sizes and invalid durations are rejected. An empty filter means none.
    pub fn validate(mut self) -> Result<Self> {
        if self.page_size == 0 {
            return Err(Error::invalid_value("page_size", "must be at least 1"));
        }
        if self.page_size > MAX_PAGE_SIZE {
            warn!("page_size cannot exceed {MAX_PAGE_SIZE}. Setting to {MAX_PAGE_SIZE}.");
            self.page_size = MAX_PAGE_SIZE;
        }

        if self.batch_size == 0 {
            return Err(Error::invalid_value("batch_size", "must be at least 1"));
        }
        if self.batch_size > MAX_BATCH_SIZE {
            warn!("batch_size cannot exceed {MAX_BATCH_SIZE}. Setting to {MAX_BATCH_SIZE}.");
            self.batch_size = MAX_BATCH_SIZE;
        }

        if self.max_pages == 0 {
            return Err(Error::invalid_value("max_pages", "must be at least 1"));
        }
        if self.request_timeout_seconds == 0 {
            return Err(Error::invalid_value(
                "request_timeout_seconds",
                "must be at least 1",
            ));
        }

        seconds("base_backoff_seconds", self.base_backoff_seconds)?;
        seconds("max_backoff_seconds", self.max_backoff_seconds)?;
        if self.max_backoff_seconds < self.base_backoff_seconds {
            return Err(Error::invalid_value(
                "max_backoff_seconds",
                "must not be smaller than base_backoff_seconds",
            ));
        }

        if self.filter.as_deref().is_some_and(|f| f.trim().is_empty()) {
            self.filter = None;
        }

        Ok(self)
    }

    /// HTTP client settings for `base_url` under this config
    pub fn http_config(&self, base_url: &str) -> Result<HttpClientConfig> {
        url::Url::parse(base_url)?;

        let mut builder = HttpClientConfig::builder()
            .base_url(base_url)
            .timeout(Duration::from_secs(self.request_timeout_seconds))
            .max_retries(self.max_retries)
            .backoff(
                BackoffType::Exponential,
                seconds("base_backoff_seconds", self.base_backoff_seconds)?,
                seconds("max_backoff_seconds", self.max_backoff_seconds)?,
            );

        builder = if self.requests_per_second == 0 {
            builder.no_rate_limit()
        } else {
            builder.rate_limit(RateLimiterConfig::per_second(self.requests_per_second))
        };

        Ok(builder.build())
    }
}

fn seconds(field: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .map_err(|e| Error::invalid_value(field, format!("{value} is not a valid duration: {e}")))
}

// ============================================================================
// Credentials
// ============================================================================

/// API credentials and endpoint
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// OAuth2 client id
    pub client_id: String,
    /// OAuth2 client secret
    pub client_secret: String,
    /// API base URL
    pub base_url: String,
}

static DOTENV: Once = Once::new();

impl Credentials {
    /// Read credentials from the process environment, loading `.env` first.
    ///
    /// Entries in `.env` override variables already set in the environment.
    pub fn from_env() -> Result<Self> {
        DOTENV.call_once(|| {
            let _ = dotenvy::dotenv_override();
        });
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load `path` into the environment, overriding existing variables,
    /// then read credentials from it
    pub fn from_env_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        dotenvy::from_path_override(path)
            .map_err(|e| Error::config(format!("Failed to load {}: {e}", path.display())))?;
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read credentials through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| Error::missing_field(key))
        };

        Ok(Self {
            client_id: required(CLIENT_ID_VAR)?,
            client_secret: required(CLIENT_SECRET_VAR)?,
            base_url: lookup(BASE_URL_VAR)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        })
    }

    /// Client-credentials auth against this endpoint
    pub fn auth_config(&self) -> AuthConfig {
        AuthConfig::client_credentials(&self.base_url, &self.client_id, &self.client_secret)
    }

    /// First characters of the client id, safe to print
    pub fn client_id_hint(&self) -> String {
        let prefix: String = self.client_id.chars().take(8).collect();
        format!("{prefix}...")
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id_hint())
            .field("client_secret", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}
