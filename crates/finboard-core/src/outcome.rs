//! Fetch results and the caller-facing response envelope.

use serde::Serialize;
use serde_json::Value;

use crate::currency::CurrencyMatch;
use crate::error::FailureKind;
use crate::timestamp::UtcDateTime;

/// Result of one logical fetch. Exactly one variant is produced per call.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Success {
        data: Value,
        fetched_at: UtcDateTime,
        currency: Option<CurrencyMatch>,
    },
    CacheHit {
        data: Value,
        fetched_at: UtcDateTime,
        age_seconds: u64,
        currency: Option<CurrencyMatch>,
    },
    /// The origin is blocked; callers should pause auto-refresh this long.
    RateLimited { retry_after_seconds: u64 },
    Failure { kind: FailureKind, message: String },
}

impl FetchOutcome {
    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::Failure {
            kind,
            message: message.into(),
        }
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            Self::Success { data, .. } | Self::CacheHit { data, .. } => Some(data),
            Self::RateLimited { .. } | Self::Failure { .. } => None,
        }
    }

    pub fn currency(&self) -> Option<&CurrencyMatch> {
        match self {
            Self::Success { currency, .. } | Self::CacheHit { currency, .. } => currency.as_ref(),
            Self::RateLimited { .. } | Self::Failure { .. } => None,
        }
    }

    pub const fn is_data(&self) -> bool {
        matches!(self, Self::Success { .. } | Self::CacheHit { .. })
    }

    pub const fn is_cache_hit(&self) -> bool {
        matches!(self, Self::CacheHit { .. })
    }

    /// Taxonomy class for non-data outcomes.
    pub const fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Failure { kind, .. } => Some(*kind),
            Self::RateLimited { .. } => Some(FailureKind::RateLimited),
            Self::Success { .. } | Self::CacheHit { .. } => None,
        }
    }

    /// Message suitable for displaying verbatim.
    pub fn error_message(&self) -> Option<String> {
        match self {
            Self::Failure { message, .. } => Some(message.clone()),
            Self::RateLimited {
                retry_after_seconds,
            } => Some(format!(
                "Rate limit exceeded. Please wait {retry_after_seconds} seconds before retrying."
            )),
            Self::Success { .. } | Self::CacheHit { .. } => None,
        }
    }
}

/// Serialized shape handed to widget data hooks.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
    pub timestamp: UtcDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_cache: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_age: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<CurrencyMatch>,
}

impl From<FetchOutcome> for FetchResponse {
    fn from(outcome: FetchOutcome) -> Self {
        let error = outcome.error_message();
        let error_code = outcome.failure_kind().map(FailureKind::code);

        match outcome {
            FetchOutcome::Success {
                data,
                fetched_at,
                currency,
            } => Self {
                data: Some(data),
                error,
                error_code,
                timestamp: fetched_at,
                from_cache: Some(false),
                cache_age: None,
                retry_after: None,
                currency,
            },
            FetchOutcome::CacheHit {
                data,
                fetched_at,
                age_seconds,
                currency,
            } => Self {
                data: Some(data),
                error,
                error_code,
                timestamp: fetched_at,
                from_cache: Some(true),
                cache_age: Some(age_seconds),
                retry_after: None,
                currency,
            },
            FetchOutcome::RateLimited {
                retry_after_seconds,
            } => Self {
                data: None,
                error,
                error_code,
                timestamp: UtcDateTime::now(),
                from_cache: None,
                cache_age: None,
                retry_after: Some(retry_after_seconds),
                currency: None,
            },
            FetchOutcome::Failure { .. } => Self {
                data: None,
                error,
                error_code,
                timestamp: UtcDateTime::now(),
                from_cache: None,
                cache_age: None,
                retry_after: None,
                currency: None,
            },
        }
    }
}
