//! # Finboard Core
//!
//! Resilient JSON fetching for financial dashboard widgets.
//!
//! ## Overview
//!
//! This crate turns "GET this URL" into a classified result that dashboard
//! widgets can render directly:
//!
//! - **TTL cache** keyed by a normalized request fingerprint
//! - **Rate-limit tracking** so a blocked origin is not hammered
//! - **Retries** with exponential backoff for 5xx and bounded waits for 429
//! - **Proxy fallback** for APIs that reject cross-origin requests
//! - **Path resolution**, **field discovery** and **currency inference** over
//!   arbitrary JSON payloads
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`cache`] | TTL cache and request fingerprints |
//! | [`config`] | Fetcher configuration and environment overrides |
//! | [`credential`] | API key placement and fingerprints |
//! | [`currency`] | Currency inference over JSON payloads |
//! | [`error`] | Failure taxonomy |
//! | [`fetcher`] | Fetch orchestration |
//! | [`fields`] | Field discovery for widget configuration |
//! | [`http_client`] | HTTP client abstraction |
//! | [`json_path`] | Dotted/bracketed path resolution |
//! | [`outcome`] | Fetch outcomes and the caller-facing envelope |
//! | [`proxy`] | Same-origin proxy codec |
//! | [`rate_limit`] | Per-origin rate-limit blocking |
//! | [`retry`] | Backoff schedules |
//! | [`soft_error`] | Errors reported inside 2xx bodies |
//! | [`timestamp`] | UTC timestamps |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use finboard_core::{FetchConfig, FetchRequest, Fetcher, ReqwestHttpClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Arc::new(ReqwestHttpClient::default());
//!     let fetcher = Fetcher::new(client, FetchConfig::from_env()?)?;
//!
//!     let request = FetchRequest::new("https://api.example.com/quote?symbol=IBM")
//!         .with_ttl(Duration::from_secs(30));
//!     let outcome = fetcher.fetch(&request).await;
//!
//!     let price = outcome
//!         .data()
//!         .and_then(|data| finboard_core::resolve_f64(data, "quote.price"));
//!     if let Some(price) = price {
//!         println!("IBM: {price:.2}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  Widget / CLI   │
//! └────────┬────────┘
//!          │ FetchRequest
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │    Fetcher      │────▶│ TTL Cache        │
//! │                 │────▶│ Rate-Limit       │
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │  HTTP Client    │────▶│ Proxy (fallback) │
//! │ (reqwest)       │     └──────────────────┘
//! └────────┬────────┘
//!          │ FetchOutcome
//!          ▼
//! ┌─────────────────┐
//! │ Path resolver,  │
//! │ fields, currency│
//! └─────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! A fetch never returns `Err`. Every problem is a [`FetchOutcome`] variant
//! whose [`FailureKind`] tells the caller what to do:
//!
//! ```rust
//! use finboard_core::{FailureKind, FetchOutcome};
//!
//! fn handle(outcome: FetchOutcome) {
//!     match outcome.failure_kind() {
//!         Some(FailureKind::RateLimited) => {
//!             // Pause auto-refresh
//!         }
//!         Some(FailureKind::AuthError) => {
//!             // Ask for a new API key
//!         }
//!         Some(_) => {
//!             // Show the message
//!         }
//!         None => {}
//!     }
//! }
//! ```
//!
//! ## Security
//!
//! - API keys are never logged; cache keys carry a truncated SHA-256 fingerprint
//! - Logged URLs are reduced to origin and path

pub mod cache;
pub mod config;
pub mod credential;
pub mod currency;
pub mod error;
pub mod fetcher;
pub mod fields;
pub mod http_client;
pub mod json_path;
pub mod outcome;
pub mod proxy;
pub mod rate_limit;
pub mod retry;
pub mod soft_error;
pub mod timestamp;

// Caching
pub use cache::{CacheEntry, CacheKey, TtlCache, DEFAULT_SWEEP_INTERVAL, MAX_TTL};

// Configuration
pub use config::{ConfigError, FetchConfig};

// Credentials
pub use credential::{url_embeds_auth, Credential};

// Currency inference
pub use currency::{infer as infer_currency, CurrencyMatch};

// Error taxonomy
pub use error::FailureKind;

// Orchestration
pub use fetcher::{parse_retry_after, FetchRequest, Fetcher};

// Field discovery
pub use fields::{extract_fields, flatten_paths, FieldDescriptor, FieldType};

// HTTP client types
pub use http_client::{
    HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient, ScriptedHttpClient,
    TransportErrorKind,
};

// Path resolution
pub use json_path::{resolve, resolve_display, resolve_f64};

// Outcomes
pub use outcome::{FetchOutcome, FetchResponse};

// Proxy
pub use proxy::{ProxyEndpoint, ProxyError, ProxyReply};

// Rate limiting
pub use rate_limit::{
    RateLimitScope, RateLimitTracker, DEFAULT_RATE_LIMIT_WAIT, MAX_RATE_LIMIT_WAIT,
};

// Retry logic
pub use retry::{Backoff, RetryConfig};

// Timestamps
pub use timestamp::UtcDateTime;
