//! Per-origin rate-limit blocking.
//!
//! An origin moves Clear -> Blocked when an upstream answers 429 and back to
//! Clear on the first check after the block lifts. Records are small and
//! self-expiring on access, so no background sweep is needed.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use reqwest::Url;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::ConfigError;

/// Wait applied when a 429 carries no usable retry-after hint.
pub const DEFAULT_RATE_LIMIT_WAIT: Duration = Duration::from_secs(60);

/// Longest block recorded for one 429. Larger hints are clamped to this.
pub const MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

/// Granularity at which a rate limit is recorded.
///
/// `Origin` is conservative: a limit hit on one endpoint blocks every
/// endpoint of that host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RateLimitScope {
    #[default]
    Origin,
    Endpoint,
}

impl RateLimitScope {
    /// Tracker key for `url` under this scope.
    pub fn key_for(self, url: &Url) -> String {
        let origin = url.origin().ascii_serialization();
        match self {
            Self::Origin => origin,
            Self::Endpoint => format!("{origin}{}", url.path()),
        }
    }
}

impl FromStr for RateLimitScope {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "origin" => Ok(Self::Origin),
            "endpoint" => Ok(Self::Endpoint),
            other => Err(ConfigError::InvalidValue {
                name: "rate limit scope",
                value: other.to_owned(),
            }),
        }
    }
}

/// Thread-safe tracker of blocked origins.
///
/// Cloning yields another handle to the same records.
#[derive(Debug, Clone, Default)]
pub struct RateLimitTracker {
    scope: RateLimitScope,
    blocked: Arc<Mutex<HashMap<String, Instant>>>,
}

impl RateLimitTracker {
    pub fn new(scope: RateLimitScope) -> Self {
        Self {
            scope,
            blocked: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Recovers from a poisoned lock: the map only holds deadlines, so the
    /// worst outcome is one stale block.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Instant>> {
        self.blocked.lock().unwrap_or_else(|poisoned| {
            warn!("rate limit tracker mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Remaining block for `url`, or `None` when requests may proceed.
    ///
    /// An expired record is discarded by this call.
    pub fn check(&self, url: &Url) -> Option<Duration> {
        let key = self.scope.key_for(url);
        let now = Instant::now();
        let mut blocked = self.lock();

        let blocked_until = *blocked.get(&key)?;
        if now < blocked_until {
            return Some(blocked_until - now);
        }

        blocked.remove(&key);
        debug!(origin = %key, "rate limit block lifted");
        None
    }

    /// Blocks `url`'s scope for `wait` from now, replacing any earlier record.
    ///
    /// Returns the wait actually recorded, at most [`MAX_RATE_LIMIT_WAIT`].
    pub fn block(&self, url: &Url, wait: Duration) -> Duration {
        let key = self.scope.key_for(url);
        let wait = wait.min(MAX_RATE_LIMIT_WAIT);
        let blocked_until = Instant::now() + wait;
        info!(origin = %key, wait_secs = wait.as_secs(), "origin rate limited");
        self.lock().insert(key, blocked_until);
        wait
    }

    /// Lifts the block for `url`'s scope. Returns whether one was recorded.
    pub fn clear(&self, url: &Url) -> bool {
        let key = self.scope.key_for(url);
        self.lock().remove(&key).is_some()
    }

    pub fn clear_all(&self) {
        self.lock().clear();
    }

    /// Number of records whose block is still active.
    pub fn blocked_count(&self) -> usize {
        let now = Instant::now();
        self.lock()
            .values()
            .filter(|blocked_until| now < **blocked_until)
            .count()
    }
}
