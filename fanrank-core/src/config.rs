//! Engine configuration.
//!
//! Defaults are overridden by environment variables, which the binary in
//! turn overrides with command-line flags:
//!
//! - `GITHUB_TOKEN` (or `GITHUB_PAT`): API credential
//! - `FANRANK_API_URL`: directory base URL
//! - `FANRANK_PAGE_SIZE`: followers requested per user
//! - `FANRANK_TIMEOUT_SECS`: per-request timeout
//! - `FANRANK_WORKERS`: concurrent expansions per depth level

use crate::crawl::clamp_depth;
use fanrank_crawler::crawler::{DEFAULT_PAGE_SIZE, DEFAULT_REQUEST_TIMEOUT, DEFAULT_WORKERS};
use fanrank_crawler::source::DEFAULT_API_URL;
use fanrank_crawler::SourceConfig;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const TOKEN_VARS: &[&str] = &["GITHUB_TOKEN", "GITHUB_PAT"];
pub const API_URL_VAR: &str = "FANRANK_API_URL";
pub const PAGE_SIZE_VAR: &str = "FANRANK_PAGE_SIZE";
pub const TIMEOUT_VAR: &str = "FANRANK_TIMEOUT_SECS";
pub const WORKERS_VAR: &str = "FANRANK_WORKERS";

/// GitHub rejects `per_page` above this.
pub const MAX_PAGE_SIZE: usize = 100;
pub const DEFAULT_MAX_DEPTH: u32 = 2;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("invalid API URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
}

#[derive(Clone)]
pub struct EngineConfig {
    pub api_url: Url,
    pub token: Option<String>,
    pub page_size: usize,
    pub request_timeout: Duration,
    pub workers: usize,
    pub max_depth: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let source = SourceConfig::default();
        Self {
            api_url: source.api_url,
            token: None,
            page_size: DEFAULT_PAGE_SIZE,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            workers: DEFAULT_WORKERS,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("api_url", &self.api_url.as_str())
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("page_size", &self.page_size)
            .field("request_timeout", &self.request_timeout)
            .field("workers", &self.workers)
            .field("max_depth", &self.max_depth)
            .finish()
    }
}

impl EngineConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        config.token = TOKEN_VARS.iter().find_map(|&key| var(key));

        if let Some(url) = var(API_URL_VAR) {
            config.api_url = parse_api_url(&url)?;
        }
        if let Some(value) = var(PAGE_SIZE_VAR) {
            config.page_size = parse_number(PAGE_SIZE_VAR, &value)?;
        }
        if let Some(value) = var(TIMEOUT_VAR) {
            config.request_timeout = Duration::from_secs(parse_number(TIMEOUT_VAR, &value)?);
        }
        if let Some(value) = var(WORKERS_VAR) {
            config.workers = parse_number(WORKERS_VAR, &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_max_depth(mut self, depth: u32) -> Self {
        self.max_depth = clamp_depth(depth);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(invalid(
                "page size",
                self.page_size,
                format!("must be between 1 and {}", MAX_PAGE_SIZE),
            ));
        }
        if self.workers == 0 {
            return Err(invalid("workers", self.workers, "must be at least 1"));
        }
        if self.request_timeout.is_zero() {
            return Err(invalid(
                "request timeout",
                self.request_timeout.as_secs(),
                "must be at least one second",
            ));
        }
        Ok(())
    }

    /// Connection settings for a [`GitHubSource`](fanrank_crawler::GitHubSource).
    pub fn source_config(&self) -> SourceConfig {
        SourceConfig::new(self.token.clone())
            .with_api_url(self.api_url.clone())
            .with_timeout(self.request_timeout)
    }
}

pub fn parse_api_url(url: &str) -> Result<Url, ConfigError> {
    let parsed = Url::parse(url.trim()).map_err(|source| ConfigError::InvalidUrl {
        url: url.to_string(),
        source,
    })?;
    if parsed.cannot_be_a_base() {
        return Err(invalid(API_URL_VAR, url, "not a base URL"));
    }
    Ok(parsed)
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| invalid(key, value, e.to_string()))
}

fn invalid(key: &str, value: impl fmt::Display, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}
