//! Client side of the same-origin proxy used after cross-origin rejections.
//!
//! The proxy is called as `GET <endpoint>?url=<target>[&apiKey=..&apiKeyHeader=..]`
//! and answers `{"data": <json>}` or `{"error": "<text>", "status": <int>}`.

use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::credential::Credential;
use crate::http_client::{HttpRequest, HttpResponse};

/// Status assumed when the proxy reports an error without one.
const DEFAULT_PROXY_ERROR_STATUS: u16 = 502;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProxyError {
    #[error("invalid proxy url '{value}'")]
    InvalidUrl { value: String },
    #[error("proxy returned an unreadable response: {0}")]
    Malformed(String),
}

/// What the proxy said about the upstream call.
#[derive(Debug, Clone, PartialEq)]
pub enum ProxyReply {
    Data(Value),
    Error { status: u16, message: String },
}

#[derive(Debug, Deserialize)]
struct ProxyEnvelope {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    status: Option<u16>,
}

/// Address of the proxy collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyEndpoint {
    base: Url,
}

impl ProxyEndpoint {
    pub fn parse(raw: &str) -> Result<Self, ProxyError> {
        Url::parse(raw.trim())
            .map(|base| Self { base })
            .map_err(|_| ProxyError::InvalidUrl {
                value: raw.to_owned(),
            })
    }

    pub fn as_str(&self) -> &str {
        self.base.as_str()
    }

    /// Proxy URL forwarding `target`, with the credential as query
    /// parameters when it would have been sent as a header directly.
    pub fn url_for(&self, target: &Url, credential: Option<&Credential>) -> String {
        let mut url = self.base.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("url", target.as_str());
            if let Some(credential) = credential.filter(|c| c.should_send_header(target)) {
                query.append_pair("apiKey", credential.key());
                query.append_pair("apiKeyHeader", credential.header());
            }
        }
        url.into()
    }

    /// GET request for `target`; the proxy must not serve it from a cache.
    pub fn request_for(&self, target: &Url, credential: Option<&Credential>) -> HttpRequest {
        HttpRequest::get(self.url_for(target, credential)).with_header("cache-control", "no-store")
    }
}

/// Interprets a proxy response.
pub fn decode(response: &HttpResponse) -> Result<ProxyReply, ProxyError> {
    let envelope = match serde_json::from_str::<ProxyEnvelope>(&response.body) {
        Ok(envelope) => envelope,
        Err(error) if response.is_success() => {
            return Err(ProxyError::Malformed(error.to_string()));
        }
        Err(_) => {
            return Ok(ProxyReply::Error {
                status: response.status,
                message: format!("proxy returned status {}", response.status),
            });
        }
    };

    if let Some(message) = envelope.error {
        let status = envelope.status.unwrap_or(if response.is_success() {
            DEFAULT_PROXY_ERROR_STATUS
        } else {
            response.status
        });
        return Ok(ProxyReply::Error { status, message });
    }

    if !response.is_success() {
        return Ok(ProxyReply::Error {
            status: response.status,
            message: format!("proxy returned status {}", response.status),
        });
    }

    envelope
        .data
        .map(ProxyReply::Data)
        .ok_or_else(|| ProxyError::Malformed(String::from("missing 'data' field")))
}
