//! Fetcher configuration and its environment overrides.
//!
//! | Variable | Default | Effect |
//! |----------|---------|--------|
//! | `FINBOARD_PROXY_URL` | unset | Same-origin proxy used after CORS-shaped failures |
//! | `FINBOARD_TIMEOUT_SECS` | `30` | Per-request timeout |
//! | `FINBOARD_MAX_RETRIES` | `3` | Retry budget for 5xx and 429 responses |
//! | `FINBOARD_RATE_LIMIT_WAIT_SECS` | `60` | Block length when a 429 has no retry-after |
//! | `FINBOARD_RATE_LIMIT_SCOPE` | `origin` | `origin` or `endpoint` |
//! | `FINBOARD_INFER_CURRENCY` | `true` | Run currency inference on fetched payloads |
//! | `FINBOARD_USER_AGENT` | `finboard/<version>` | User agent of the production transport |

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::http_client::DEFAULT_REQUEST_TIMEOUT;
use crate::proxy::ProxyError;
use crate::rate_limit::{RateLimitScope, DEFAULT_RATE_LIMIT_WAIT};
use crate::retry::RetryConfig;

/// Invalid configuration values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {name}: '{value}'")]
    InvalidValue { name: &'static str, value: String },
    #[error(transparent)]
    Proxy(#[from] ProxyError),
}

/// Settings shared by every fetch issued through one [`Fetcher`](crate::Fetcher).
#[derive(Debug, Clone, PartialEq)]
pub struct FetchConfig {
    pub retry: RetryConfig,
    pub proxy_url: Option<String>,
    pub request_timeout: Duration,
    pub default_rate_limit_wait: Duration,
    pub rate_limit_scope: RateLimitScope,
    pub infer_currency: bool,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            proxy_url: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            default_rate_limit_wait: DEFAULT_RATE_LIMIT_WAIT,
            rate_limit_scope: RateLimitScope::Origin,
            infer_currency: true,
            user_agent: String::from(concat!("finboard/", env!("CARGO_PKG_VERSION"))),
        }
    }
}

impl FetchConfig {
    /// Defaults overridden by `FINBOARD_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each `FINBOARD_*` name.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let value = |name: &str| {
            lookup(name)
                .map(|raw| raw.trim().to_owned())
                .filter(|raw| !raw.is_empty())
        };

        if let Some(proxy) = value("FINBOARD_PROXY_URL") {
            config.proxy_url = Some(proxy);
        }
        if let Some(raw) = value("FINBOARD_TIMEOUT_SECS") {
            config.request_timeout = Duration::from_secs(parse_number(&raw, "timeout seconds")?);
        }
        if let Some(raw) = value("FINBOARD_MAX_RETRIES") {
            config.retry.max_retries = parse_number(&raw, "max retries")?;
        }
        if let Some(raw) = value("FINBOARD_RATE_LIMIT_WAIT_SECS") {
            config.default_rate_limit_wait =
                Duration::from_secs(parse_number(&raw, "rate limit wait seconds")?);
        }
        if let Some(raw) = value("FINBOARD_RATE_LIMIT_SCOPE") {
            config.rate_limit_scope = raw.parse()?;
        }
        if let Some(raw) = value("FINBOARD_INFER_CURRENCY") {
            config.infer_currency = parse_flag(&raw)?;
        }
        if let Some(agent) = value("FINBOARD_USER_AGENT") {
            config.user_agent = agent;
        }

        Ok(config)
    }

    pub fn with_proxy_url(mut self, proxy_url: impl Into<String>) -> Self {
        self.proxy_url = Some(proxy_url.into());
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

fn parse_number<T: FromStr>(raw: &str, name: &'static str) -> Result<T, ConfigError> {
    raw.parse().map_err(|_| ConfigError::InvalidValue {
        name,
        value: raw.to_owned(),
    })
}

fn parse_flag(raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name: "currency inference flag",
            value: raw.to_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let config = FetchConfig::from_lookup(lookup(&[])).expect("defaults are valid");
        assert_eq!(config, FetchConfig::default());
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.default_rate_limit_wait, Duration::from_secs(60));
    }

    #[test]
    fn overrides_are_applied() {
        let config = FetchConfig::from_lookup(lookup(&[
            ("FINBOARD_PROXY_URL", "http://localhost:3000/api/proxy"),
            ("FINBOARD_TIMEOUT_SECS", "10"),
            ("FINBOARD_MAX_RETRIES", "1"),
            ("FINBOARD_RATE_LIMIT_WAIT_SECS", "15"),
            ("FINBOARD_RATE_LIMIT_SCOPE", "endpoint"),
            ("FINBOARD_INFER_CURRENCY", "off"),
        ]))
        .expect("valid overrides");

        assert_eq!(config.proxy_url.as_deref(), Some("http://localhost:3000/api/proxy"));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.retry.max_retries, 1);
        assert_eq!(config.default_rate_limit_wait, Duration::from_secs(15));
        assert_eq!(config.rate_limit_scope, RateLimitScope::Endpoint);
        assert!(!config.infer_currency);
    }

    #[test]
    fn malformed_values_are_rejected() {
        let error = FetchConfig::from_lookup(lookup(&[("FINBOARD_MAX_RETRIES", "three")]))
            .expect_err("non-numeric retries");
        assert_eq!(
            error,
            ConfigError::InvalidValue {
                name: "max retries",
                value: String::from("three"),
            }
        );
    }

    #[test]
    fn blank_values_are_ignored() {
        let config = FetchConfig::from_lookup(lookup(&[("FINBOARD_PROXY_URL", "   ")]))
            .expect("blank is ignored");
        assert!(config.proxy_url.is_none());
    }
}
