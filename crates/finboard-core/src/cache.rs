//! In-memory TTL cache for fetched JSON payloads.
//!
//! Entries expire lazily on access and are also removed by
//! [`TtlCache::sweep_expired`], which [`TtlCache::spawn_sweeper`] runs on a
//! fixed interval so keys that are never read again do not accumulate.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::credential::Credential;
use crate::timestamp::UtcDateTime;

/// Interval used by [`TtlCache::spawn_sweeper`] callers that have no preference.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Longest lifetime an entry can have. Larger TTLs are clamped to this.
pub const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Normalized request fingerprint.
///
/// Built from the URL origin and path, the query parameters sorted by name
/// then value, and a truncated credential fingerprint. The fragment is
/// ignored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn for_request(url: &Url, credential: Option<&Credential>) -> Self {
        let mut path = url.path();
        if path.len() > 1 {
            path = path.trim_end_matches('/');
        }

        let mut params: Vec<(String, String)> = url
            .query_pairs()
            .map(|(name, value)| (name.into_owned(), value.into_owned()))
            .collect();
        params.sort();
        let query = params
            .iter()
            .map(|(name, value)| {
                format!("{}={}", urlencoding::encode(name), urlencoding::encode(value))
            })
            .collect::<Vec<_>>()
            .join("&");

        let auth = credential
            .filter(|credential| credential.is_complete())
            .map(Credential::fingerprint)
            .unwrap_or_else(|| String::from("anonymous"));

        Self(format!(
            "{}{}?{}#{}",
            url.origin().ascii_serialization(),
            path,
            query,
            auth
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A cached payload. `expires_at > created_at` always holds.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub payload: Value,
    pub created_at: Instant,
    pub expires_at: Instant,
    pub fetched_at: UtcDateTime,
    pub source_url: String,
}

impl CacheEntry {
    pub fn is_valid_at(&self, now: Instant) -> bool {
        now < self.expires_at
    }

    pub fn age_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }
}

#[derive(Debug, Default)]
struct CacheInner {
    map: HashMap<CacheKey, CacheEntry>,
}

impl CacheInner {
    fn peek(&self, key: &CacheKey, now: Instant) -> Option<&CacheEntry> {
        self.map.get(key).filter(|entry| entry.is_valid_at(now))
    }

    fn remove_if_expired(&mut self, key: &CacheKey, now: Instant) -> bool {
        let expired = self
            .map
            .get(key)
            .is_some_and(|entry| !entry.is_valid_at(now));
        if expired {
            self.map.remove(key);
        }
        expired
    }

    fn sweep(&mut self, now: Instant) -> usize {
        let before = self.map.len();
        self.map.retain(|_, entry| entry.is_valid_at(now));
        before - self.map.len()
    }
}

/// Thread-safe TTL cache shared by every fetch in the process.
///
/// Cloning yields another handle to the same store.
#[derive(Debug, Clone, Default)]
pub struct TtlCache {
    inner: Arc<RwLock<CacheInner>>,
}

impl TtlCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the entry for `key` if it has not expired.
    ///
    /// An expired entry is removed and reported as a miss.
    pub async fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let now = Instant::now();
        {
            let store = self.inner.read().await;
            if let Some(entry) = store.peek(key, now) {
                return Some(entry.clone());
            }
            if !store.map.contains_key(key) {
                return None;
            }
        }

        let mut store = self.inner.write().await;
        if store.remove_if_expired(key, now) {
            debug!(key = %key, "evicted expired cache entry");
        }
        store.peek(key, now).cloned()
    }

    /// Stores `payload` under `key`, replacing any existing entry.
    ///
    /// A zero `ttl` stores nothing and a `ttl` above [`MAX_TTL`] is clamped.
    pub async fn put(
        &self,
        key: CacheKey,
        payload: Value,
        ttl: Duration,
        source_url: impl Into<String>,
    ) {
        if ttl.is_zero() {
            return;
        }

        let created_at = Instant::now();
        let entry = CacheEntry {
            payload,
            created_at,
            expires_at: created_at + ttl.min(MAX_TTL),
            fetched_at: UtcDateTime::now(),
            source_url: source_url.into(),
        };

        let mut store = self.inner.write().await;
        store.map.insert(key, entry);
    }

    /// Removes the entry for `key`. Returns whether one existed.
    pub async fn invalidate(&self, key: &CacheKey) -> bool {
        let mut store = self.inner.write().await;
        store.map.remove(key).is_some()
    }

    /// Removes every entry whose source URL contains `pattern`.
    pub async fn invalidate_by_url_substring(&self, pattern: &str) -> usize {
        let mut store = self.inner.write().await;
        let before = store.map.len();
        store
            .map
            .retain(|_, entry| !entry.source_url.contains(pattern));
        before - store.map.len()
    }

    /// Clear all entries from the cache.
    pub async fn clear(&self) {
        let mut store = self.inner.write().await;
        store.map.clear();
    }

    /// Removes every entry with `expires_at <= now` and returns how many went.
    pub async fn sweep_expired(&self) -> usize {
        let mut store = self.inner.write().await;
        store.sweep(Instant::now())
    }

    /// Time since the entry was stored, or `None` for a miss or expired entry.
    pub async fn age(&self, key: &CacheKey) -> Option<Duration> {
        let now = Instant::now();
        let store = self.inner.read().await;
        store.peek(key, now).map(|entry| entry.age_at(now))
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub async fn len(&self) -> usize {
        self.inner.read().await.map.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.map.is_empty()
    }

    /// Runs [`sweep_expired`](Self::sweep_expired) every `period` on the
    /// current tokio runtime until the returned handle is aborted.
    pub fn spawn_sweeper(&self, period: Duration) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let removed = cache.sweep_expired().await;
                if removed > 0 {
                    debug!(removed, "swept expired cache entries");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(raw: &str) -> CacheKey {
        CacheKey::for_request(&Url::parse(raw).expect("valid url"), None)
    }

    #[test]
    fn key_ignores_query_order_and_fragment() {
        assert_eq!(
            key("https://API.example.test/v1/quote?b=2&a=1"),
            key("https://api.example.test/v1/quote/?a=1&b=2#top")
        );
        assert_ne!(
            key("https://api.example.test/v1/quote?a=1"),
            key("https://api.example.test/v1/quote?a=2")
        );
    }

    #[test]
    fn key_separates_credentials() {
        let url = Url::parse("https://api.example.test/v1/quote").expect("valid url");
        let alice = Credential::new("alice-key", "X-Api-Key");
        let bob = Credential::new("bob-key", "X-Api-Key");

        let anonymous = CacheKey::for_request(&url, None);
        let with_alice = CacheKey::for_request(&url, Some(&alice));

        assert_ne!(anonymous, with_alice);
        assert_ne!(with_alice, CacheKey::for_request(&url, Some(&bob)));
        assert!(!with_alice.as_str().contains("alice-key"));
    }

    #[tokio::test]
    async fn put_get_and_overwrite() {
        let cache = TtlCache::new();
        let k = key("https://api.example.test/a");

        assert!(cache.get(&k).await.is_none());

        let ttl = Duration::from_secs(60);
        cache.put(k.clone(), json!({"v": 1}), ttl, "https://api.example.test/a").await;
        assert_eq!(cache.get(&k).await.map(|entry| entry.payload), Some(json!({"v": 1})));

        cache.put(k.clone(), json!({"v": 2}), ttl, "https://api.example.test/a").await;
        assert_eq!(cache.get(&k).await.map(|entry| entry.payload), Some(json!({"v": 2})));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn entry_expires_lazily_and_is_removed() {
        let cache = TtlCache::new();
        let k = key("https://api.example.test/a");
        cache.put(k.clone(), json!(1), Duration::from_secs(5), "u").await;

        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(cache.get(&k).await.is_some());
        assert_eq!(cache.age(&k).await, Some(Duration::from_secs(4)));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get(&k).await.is_none());
        assert!(cache.age(&k).await.is_none());
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn zero_ttl_stores_nothing() {
        let cache = TtlCache::new();
        cache.put(key("https://api.example.test/a"), json!(1), Duration::ZERO, "u").await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_ttl_is_clamped() {
        let cache = TtlCache::new();
        let k = key("https://api.example.test/a");
        cache.put(k.clone(), json!(1), Duration::from_secs(u64::MAX), "u").await;

        let entry = cache.get(&k).await.expect("entry stored");
        assert_eq!(entry.expires_at - entry.created_at, MAX_TTL);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_removes_only_expired_entries() {
        let cache = TtlCache::new();
        cache.put(key("https://a.test/1"), json!(1), Duration::from_secs(1), "u1").await;
        cache.put(key("https://a.test/2"), json!(2), Duration::from_secs(100), "u2").await;

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.sweep_expired().await, 1);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn invalidation_by_key_and_url_substring() {
        let cache = TtlCache::new();
        let quote = key("https://api.example.test/quote");
        let bars = key("https://api.example.test/bars");
        let other = key("https://other.test/quote");
        let ttl = Duration::from_secs(60);

        cache.put(quote.clone(), json!(1), ttl, "https://api.example.test/quote").await;
        cache.put(bars.clone(), json!(2), ttl, "https://api.example.test/bars").await;
        cache.put(other.clone(), json!(3), ttl, "https://other.test/quote").await;

        assert!(cache.invalidate(&quote).await);
        assert!(!cache.invalidate(&quote).await);
        assert_eq!(cache.invalidate_by_url_substring("api.example.test").await, 1);
        assert!(cache.get(&other).await.is_some());

        cache.clear().await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_task_evicts_unread_entries() {
        let cache = TtlCache::new();
        cache.put(key("https://a.test/1"), json!(1), Duration::from_secs(10), "u").await;

        let sweeper = cache.spawn_sweeper(Duration::from_secs(30));
        tokio::time::sleep(Duration::from_secs(31)).await;

        assert_eq!(cache.len().await, 0);
        sweeper.abort();
    }
}
