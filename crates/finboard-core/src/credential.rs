//! Caller-supplied API key forwarding.

use std::fmt::{Debug, Formatter};

use reqwest::Url;
use sha2::{Digest, Sha256};

/// Query parameter names that already carry authentication.
const AUTH_QUERY_PARAMS: [&str; 4] = ["token", "apikey", "api_key", "key"];

/// Length of the hex fingerprint embedded in cache keys.
const FINGERPRINT_LEN: usize = 16;

/// A single key/header pair forwarded to the upstream API.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    key: String,
    header: String,
}

impl Credential {
    pub fn new(key: impl Into<String>, header: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            header: header.into(),
        }
    }

    /// Builds a credential from optional parts, dropping it when either part is blank.
    pub fn from_parts(key: Option<&str>, header: Option<&str>) -> Option<Self> {
        let credential = Self::new(
            key.unwrap_or_default().trim(),
            header.unwrap_or_default().trim(),
        );
        credential.is_complete().then_some(credential)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn is_complete(&self) -> bool {
        !self.key.is_empty() && !self.header.is_empty()
    }

    /// Truncated SHA-256 of `header:key`; never contains the secret itself.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(format!("{}:{}", self.header, self.key).as_bytes());
        let mut hex = String::with_capacity(FINGERPRINT_LEN);
        for byte in digest.iter().take(FINGERPRINT_LEN / 2) {
            hex.push_str(&format!("{byte:02x}"));
        }
        hex
    }

    /// Whether this credential should travel as a request header for `url`.
    ///
    /// URLs that already embed an auth-shaped query parameter keep their own
    /// auth; adding a header as well would conflict and can break preflight on
    /// APIs that do not expect custom headers.
    pub fn should_send_header(&self, url: &Url) -> bool {
        self.is_complete() && !url_embeds_auth(url)
    }
}

impl Debug for Credential {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("header", &self.header)
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

/// True when the URL query already carries `token`, `apikey`, `api_key` or `key`.
pub fn url_embeds_auth(url: &Url) -> bool {
    url.query_pairs().any(|(name, _)| {
        let name = name.to_ascii_lowercase();
        AUTH_QUERY_PARAMS.contains(&name.as_str())
    })
}
