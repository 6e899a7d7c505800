//! Fetch orchestration.
//!
//! A fetch consults the cache, then the rate-limit tracker, then the
//! network. Responses are classified into a [`FetchOutcome`]; transient
//! classes (429 and 5xx) are retried inside a bounded loop, and a
//! CORS-shaped transport failure is replayed once through the proxy.
//!
//! ```text
//! fetch ──► cache hit? ──► CacheHit
//!   │
//!   ▼
//! in-flight gate ──► cache hit? ──► CacheHit
//!   │
//!   ▼
//! ┌─► tracker blocked? ──► RateLimited
//! │   │
//! │   ▼
//! │ direct | proxy ──► classify ──► Success / Failure
//! │                       │
//! └── 429, 5xx, CORS ◄────┘
//! ```

use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use reqwest::Url;
use serde_json::Value;
use time::format_description::well_known::Rfc2822;
use time::OffsetDateTime;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cache::{CacheKey, TtlCache};
use crate::config::{ConfigError, FetchConfig};
use crate::credential::Credential;
use crate::currency::{self, CurrencyMatch};
use crate::error::FailureKind;
use crate::http_client::{HttpClient, HttpError, HttpRequest, HttpResponse, TransportErrorKind};
use crate::outcome::FetchOutcome;
use crate::proxy::{self, ProxyEndpoint, ProxyReply};
use crate::rate_limit::RateLimitTracker;
use crate::soft_error;
use crate::timestamp::UtcDateTime;

/// Upstream error bodies are quoted up to this many characters.
const MAX_DETAIL_CHARS: usize = 200;

/// One logical fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub url: String,
    pub credential: Option<Credential>,
    /// Cache lifetime of a successful payload. Zero disables caching.
    pub ttl: Duration,
    pub bypass_cache: bool,
    /// Overrides the configured retry budget.
    pub max_retries: Option<u32>,
    pub force_proxy: bool,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            credential: None,
            ttl: Duration::ZERO,
            bypass_cache: false,
            max_retries: None,
            force_proxy: false,
        }
    }

    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn bypass_cache(mut self) -> Self {
        self.bypass_cache = true;
        self
    }

    pub fn force_proxy(mut self) -> Self {
        self.force_proxy = true;
        self
    }

    /// Whether a cached payload may answer this request.
    pub fn reads_cache(&self) -> bool {
        !self.bypass_cache && !self.ttl.is_zero()
    }
}

/// What a single network attempt produced, before retry policy is applied.
#[derive(Debug)]
enum Attempt {
    Payload(Value),
    Status {
        status: u16,
        retry_after: Option<Duration>,
        detail: Option<String>,
    },
    Malformed(String),
    Transport(HttpError),
}

type GateMap = HashMap<CacheKey, Arc<AsyncMutex<()>>>;

/// Resilient JSON fetcher shared by every widget.
///
/// Cloning yields another handle to the same cache, tracker and gates.
#[derive(Clone)]
pub struct Fetcher {
    client: Arc<dyn HttpClient>,
    cache: TtlCache,
    rate_limits: RateLimitTracker,
    proxy: Option<ProxyEndpoint>,
    config: FetchConfig,
    in_flight: Arc<Mutex<GateMap>>,
}

impl Debug for Fetcher {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("proxy", &self.proxy.as_ref().map(ProxyEndpoint::as_str))
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Fetcher {
    /// Fetcher with a fresh cache and tracker.
    pub fn new(client: Arc<dyn HttpClient>, config: FetchConfig) -> Result<Self, ConfigError> {
        let rate_limits = RateLimitTracker::new(config.rate_limit_scope);
        Self::with_state(client, config, TtlCache::new(), rate_limits)
    }

    /// Fetcher over existing shared state.
    pub fn with_state(
        client: Arc<dyn HttpClient>,
        config: FetchConfig,
        cache: TtlCache,
        rate_limits: RateLimitTracker,
    ) -> Result<Self, ConfigError> {
        let proxy = config
            .proxy_url
            .as_deref()
            .map(ProxyEndpoint::parse)
            .transpose()?;

        Ok(Self {
            client,
            cache,
            rate_limits,
            proxy,
            config,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn cache(&self) -> &TtlCache {
        &self.cache
    }

    pub fn rate_limits(&self) -> &RateLimitTracker {
        &self.rate_limits
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    pub fn spawn_cache_sweeper(&self, period: Duration) -> JoinHandle<()> {
        self.cache.spawn_sweeper(period)
    }

    /// Runs one logical fetch. Never fails: every problem is a [`FetchOutcome`] variant.
    pub async fn fetch(&self, request: &FetchRequest) -> FetchOutcome {
        let url = match parse_target(&request.url) {
            Ok(url) => url,
            Err(outcome) => return outcome,
        };
        let key = CacheKey::for_request(&url, request.credential.as_ref());

        if !request.reads_cache() {
            return self.fetch_uncached(request, &url, &key).await;
        }

        if let Some(hit) = self.cached(&key).await {
            debug!(target_url = %display_target(&url), "cache hit");
            return hit;
        }

        let _gate = self.enter(&key).await;
        if let Some(hit) = self.cached(&key).await {
            debug!(target_url = %display_target(&url), "cache filled while waiting");
            return hit;
        }

        self.fetch_uncached(request, &url, &key).await
    }

    async fn cached(&self, key: &CacheKey) -> Option<FetchOutcome> {
        let entry = self.cache.get(key).await?;
        let age = entry.age_at(Instant::now());
        Some(FetchOutcome::CacheHit {
            currency: self.currency_for(&entry.payload),
            data: entry.payload,
            fetched_at: entry.fetched_at,
            age_seconds: age.as_secs(),
        })
    }

    async fn enter(&self, key: &CacheKey) -> InFlightGuard {
        let gate = {
            let mut gates = lock_gates(&self.in_flight);
            Arc::clone(gates.entry(key.clone()).or_default())
        };
        let mut guard = InFlightGuard {
            gates: Arc::clone(&self.in_flight),
            key: key.clone(),
            permit: None,
        };
        guard.permit = Some(gate.lock_owned().await);
        guard
    }

    async fn fetch_uncached(
        &self,
        request: &FetchRequest,
        url: &Url,
        key: &CacheKey,
    ) -> FetchOutcome {
        let outcome = self.run_attempts(request, url).await;

        if let FetchOutcome::Success { data, .. } = &outcome {
            self.cache
                .put(key.clone(), data.clone(), request.ttl, url.as_str())
                .await;
        } else if let Some(kind) = outcome.failure_kind() {
            if self.cache.invalidate(key).await {
                debug!(
                    target_url = %display_target(url),
                    error_code = kind.code(),
                    "dropped cached payload after failure"
                );
            }
        }

        outcome
    }

    async fn run_attempts(&self, request: &FetchRequest, url: &Url) -> FetchOutcome {
        let retry = &self.config.retry;
        let max_retries = request.max_retries.unwrap_or(retry.max_retries);
        let credential = request.credential.as_ref();
        let target = display_target(url);

        let mut retry_count = 0;
        let mut via_proxy = request.force_proxy;
        let mut proxy_fallback = false;

        loop {
            if let Some(remaining) = self.rate_limits.check(url) {
                debug!(
                    target_url = %target,
                    wait_secs = remaining.as_secs(),
                    "origin is rate limited, skipping request"
                );
                return FetchOutcome::RateLimited {
                    retry_after_seconds: whole_seconds(remaining),
                };
            }

            let attempt = if via_proxy {
                self.send_via_proxy(url, credential).await
            } else {
                self.send_direct(url, credential).await
            };

            match attempt {
                Attempt::Payload(data) => return self.accept(data, &target),
                Attempt::Malformed(detail) => {
                    warn!(target_url = %target, "response body is not valid JSON");
                    return FetchOutcome::failure(
                        FailureKind::MalformedResponse,
                        format!("Response was not valid JSON: {detail}"),
                    );
                }
                Attempt::Status {
                    status: 429,
                    retry_after,
                    ..
                } => {
                    let hint = retry_after.unwrap_or(self.config.default_rate_limit_wait);
                    let wait = self.rate_limits.block(url, hint);
                    if retry_count >= max_retries {
                        return FetchOutcome::RateLimited {
                            retry_after_seconds: whole_seconds(wait),
                        };
                    }

                    let pause = retry.rate_limit_sleep(wait);
                    info!(
                        target_url = %target,
                        attempt = retry_count + 1,
                        wait_secs = pause.as_secs(),
                        "rate limited, waiting before retry"
                    );
                    tokio::time::sleep(pause).await;
                    retry_count += 1;
                }
                Attempt::Status { status, detail, .. } if status >= 500 => {
                    if retry_count >= max_retries {
                        return FetchOutcome::failure(
                            FailureKind::ServerError,
                            format!(
                                "Server error ({status}) after {} attempts. \
                                 The API may be temporarily unavailable.{}",
                                retry_count + 1,
                                detail_suffix(detail.as_deref())
                            ),
                        );
                    }

                    let delay = retry.delay_for_attempt(retry_count);
                    let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
                    warn!(
                        target_url = %target,
                        status,
                        attempt = retry_count + 1,
                        delay_ms,
                        "server error, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    retry_count += 1;
                }
                Attempt::Status { status, detail, .. } => {
                    debug!(target_url = %target, status, "request rejected");
                    return status_failure(status, detail.as_deref());
                }
                Attempt::Transport(error) => {
                    if error.is_cross_origin_shaped() && !via_proxy {
                        if self.proxy.is_none() {
                            return FetchOutcome::failure(
                                FailureKind::TransportError,
                                format!(
                                    "The request was blocked before a response arrived ({}). \
                                     The API likely does not allow cross-origin requests \
                                     and no proxy is configured.",
                                    error.message()
                                ),
                            );
                        }
                        info!(
                            target_url = %target,
                            "direct request rejected, retrying through proxy"
                        );
                        via_proxy = true;
                        proxy_fallback = true;
                        continue;
                    }

                    warn!(target_url = %target, via_proxy, error = %error, "transport failure");
                    return transport_failure(&error, proxy_fallback, self.config.request_timeout);
                }
            }
        }
    }

    fn accept(&self, data: Value, target: &str) -> FetchOutcome {
        if let Some(soft) = soft_error::detect(&data) {
            warn!(
                target_url = %target,
                field = soft.field,
                "provider reported an error in a successful response"
            );
            return FetchOutcome::failure(FailureKind::MalformedResponse, soft.message);
        }

        FetchOutcome::Success {
            currency: self.currency_for(&data),
            data,
            fetched_at: UtcDateTime::now(),
        }
    }

    fn currency_for(&self, data: &Value) -> Option<CurrencyMatch> {
        if self.config.infer_currency {
            currency::infer(data)
        } else {
            None
        }
    }

    async fn send_direct(&self, url: &Url, credential: Option<&Credential>) -> Attempt {
        let mut request = HttpRequest::get(url.as_str()).with_timeout(self.config.request_timeout);
        if let Some(credential) = credential.filter(|c| c.should_send_header(url)) {
            request = request.with_header(credential.header(), credential.key());
        }

        match self.client.execute(request).await {
            Ok(response) => classify(&response),
            Err(error) => Attempt::Transport(error),
        }
    }

    async fn send_via_proxy(&self, url: &Url, credential: Option<&Credential>) -> Attempt {
        let Some(proxy) = &self.proxy else {
            return Attempt::Transport(HttpError::new(
                TransportErrorKind::Request,
                "no proxy endpoint is configured",
            ));
        };

        let request = proxy
            .request_for(url, credential)
            .with_timeout(self.config.request_timeout);
        let response = match self.client.execute(request).await {
            Ok(response) => response,
            Err(error) => return Attempt::Transport(error),
        };

        match proxy::decode(&response) {
            Ok(ProxyReply::Data(data)) => Attempt::Payload(data),
            Ok(ProxyReply::Error { status, message }) => Attempt::Status {
                status,
                retry_after: retry_after_header(&response),
                detail: Some(truncate(&message)),
            },
            Err(error) => Attempt::Malformed(error.to_string()),
        }
    }
}

/// Holds the per-key gate; the gate is dropped from the map once unused.
struct InFlightGuard {
    gates: Arc<Mutex<GateMap>>,
    key: CacheKey,
    permit: Option<OwnedMutexGuard<()>>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.permit.take();
        let mut gates = lock_gates(&self.gates);
        if gates
            .get(&self.key)
            .is_some_and(|gate| Arc::strong_count(gate) == 1)
        {
            gates.remove(&self.key);
        }
    }
}

fn lock_gates(gates: &Mutex<GateMap>) -> MutexGuard<'_, GateMap> {
    gates.lock().unwrap_or_else(|poisoned| {
        warn!("in-flight gate map mutex was poisoned, recovering");
        poisoned.into_inner()
    })
}

fn parse_target(raw: &str) -> Result<Url, FetchOutcome> {
    let url = Url::parse(raw.trim()).map_err(|error| {
        FetchOutcome::failure(FailureKind::InvalidUrl, format!("Invalid URL '{raw}': {error}"))
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(FetchOutcome::failure(
            FailureKind::InvalidUrl,
            format!("Unsupported URL scheme '{scheme}'. Only http and https are allowed."),
        )),
    }
}

/// Origin and path only; query strings may carry credentials.
fn display_target(url: &Url) -> String {
    format!("{}{}", url.origin().ascii_serialization(), url.path())
}

fn classify(response: &HttpResponse) -> Attempt {
    if response.is_success() {
        return match serde_json::from_str(&response.body) {
            Ok(data) => Attempt::Payload(data),
            Err(error) => Attempt::Malformed(error.to_string()),
        };
    }

    Attempt::Status {
        status: response.status,
        retry_after: retry_after_header(response),
        detail: upstream_detail(&response.body),
    }
}

fn retry_after_header(response: &HttpResponse) -> Option<Duration> {
    response
        .header("retry-after")
        .and_then(|raw| parse_retry_after(raw, OffsetDateTime::now_utc()))
}

/// Parses a `Retry-After` value: delta-seconds or an HTTP-date.
///
/// A date in the past yields a zero wait.
pub fn parse_retry_after(raw: &str, now: OffsetDateTime) -> Option<Duration> {
    let raw = raw.trim();
    if let Ok(seconds) = raw.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let at = parse_http_date(raw)?;
    Some(Duration::try_from(at - now).unwrap_or(Duration::ZERO))
}

/// IMF-fixdate (`Wed, 21 Oct 2015 07:28:00 GMT`) or any RFC 2822 date.
fn parse_http_date(raw: &str) -> Option<OffsetDateTime> {
    match raw.strip_suffix(" GMT") {
        Some(stamp) => OffsetDateTime::parse(&format!("{stamp} +0000"), &Rfc2822).ok(),
        None => OffsetDateTime::parse(raw, &Rfc2822).ok(),
    }
}

/// The most useful line of an error body: a JSON message field or the raw text.
fn upstream_detail(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        let message = ["message", "error_description", "error", "detail"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .map(str::trim)
            .filter(|text| !text.is_empty());
        if let Some(message) = message {
            return Some(truncate(message));
        }
    }

    Some(truncate(body))
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_DETAIL_CHARS {
        return text.to_owned();
    }
    let head: String = text.chars().take(MAX_DETAIL_CHARS).collect();
    format!("{head}…")
}

fn detail_suffix(detail: Option<&str>) -> String {
    detail
        .map(|detail| format!(" Upstream response: {detail}"))
        .unwrap_or_default()
}

fn status_failure(status: u16, detail: Option<&str>) -> FetchOutcome {
    let kind = FailureKind::from_status(status);
    let message = match (kind, status) {
        (FailureKind::AuthError, 401) => String::from(
            "Authentication failed (401). Check that the API key is valid \
             and sent in the header the API expects.",
        ),
        (FailureKind::AuthError, _) => format!(
            "Access denied ({status}). The API key may lack permission for this endpoint or plan."
        ),
        (FailureKind::BadRequest, _) => String::from(
            "Bad request (400). Check the query parameters and symbol in the URL.",
        ),
        (_, 404) => String::from("Endpoint not found (404). Check the URL path."),
        _ => format!("Request failed with status {status}."),
    };

    FetchOutcome::failure(kind, format!("{message}{}", detail_suffix(detail)))
}

fn transport_failure(error: &HttpError, proxy_fallback: bool, timeout: Duration) -> FetchOutcome {
    let message = if proxy_fallback {
        format!(
            "The API rejected the cross-origin request and the proxy could not reach it either: {}",
            error.message()
        )
    } else if error.kind() == TransportErrorKind::Timeout {
        format!("Request timed out after {} seconds.", timeout.as_secs())
    } else {
        format!("Network error: {}", error.message())
    };

    FetchOutcome::failure(FailureKind::TransportError, message)
}

fn whole_seconds(duration: Duration) -> u64 {
    duration
        .as_secs()
        .saturating_add(u64::from(duration.subsec_nanos() > 0))
}
