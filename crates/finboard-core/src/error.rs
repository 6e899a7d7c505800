use std::fmt::{Display, Formatter};

use serde::Serialize;

/// Classification of a failed fetch.
///
/// `ServerError`, a first cross-origin `TransportError` and a `RateLimited`
/// response with retries left are retried inside the fetcher; every class
/// reaching the caller has exhausted that budget or was never retryable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    RateLimited,
    AuthError,
    BadRequest,
    ClientError,
    ServerError,
    TransportError,
    MalformedResponse,
    InvalidUrl,
}

impl FailureKind {
    pub const fn code(self) -> &'static str {
        match self {
            Self::RateLimited => "fetch.rate_limited",
            Self::AuthError => "fetch.auth_error",
            Self::BadRequest => "fetch.bad_request",
            Self::ClientError => "fetch.client_error",
            Self::ServerError => "fetch.server_error",
            Self::TransportError => "fetch.transport_error",
            Self::MalformedResponse => "fetch.malformed_response",
            Self::InvalidUrl => "fetch.invalid_url",
        }
    }

    /// Whether the fetcher retries this class while budget remains.
    pub const fn is_transient(self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::ServerError | Self::TransportError
        )
    }

    /// Class of a non-success HTTP status.
    pub const fn from_status(status: u16) -> Self {
        match status {
            429 => Self::RateLimited,
            401 | 403 => Self::AuthError,
            400 => Self::BadRequest,
            500..=599 => Self::ServerError,
            _ => Self::ClientError,
        }
    }
}

impl Display for FailureKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}
