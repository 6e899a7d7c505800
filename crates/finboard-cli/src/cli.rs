//! CLI argument definitions for finboard.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `fetch` | Fetch a JSON endpoint and print the response envelope |
//! | `fields` | List the fields a widget could bind to |
//! | `infer` | Detect the currency a payload is quoted in |
//!
//! # Examples
//!
//! ```bash
//! # Fetch a quote and pull out one value
//! finboard fetch "https://financialmodelingprep.com/api/v3/quote/IBM?apikey=demo" --path "[0].price"
//!
//! # Send the key as a header instead of a query parameter
//! finboard fetch https://api.example.com/v1/quote?symbol=IBM --api-key "$KEY" --api-key-header X-Api-Key
//!
//! # Which arrays can feed a table widget?
//! finboard fields https://api.example.com/v1/history --arrays-only --pretty
//! ```

use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use finboard_core::{Credential, FetchRequest};

/// Fetch and inspect JSON from financial APIs.
#[derive(Debug, Parser)]
#[command(
    name = "finboard",
    author,
    version,
    about = "Resilient JSON fetching for dashboard widgets"
)]
pub struct Cli {
    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Proxy used when the API rejects direct requests. Overrides FINBOARD_PROXY_URL.
    #[arg(long, global = true)]
    pub proxy_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch a URL and print the response envelope.
    Fetch(FetchArgs),
    /// Describe the fields of a response.
    Fields(FieldsArgs),
    /// Infer the currency of a response.
    Infer(InferArgs),
}

/// Options shared by every command that issues a fetch.
#[derive(Debug, Clone, Args)]
pub struct RequestArgs {
    /// Endpoint to fetch (http or https).
    pub url: String,

    /// API key sent as a request header.
    #[arg(long)]
    pub api_key: Option<String>,

    /// Header the API key is sent in.
    #[arg(long, requires = "api_key")]
    pub api_key_header: Option<String>,

    /// Cache lifetime in seconds. Only meaningful within one process.
    #[arg(long, default_value_t = 0)]
    pub ttl: u64,

    /// Always go to the network.
    #[arg(long, default_value_t = false)]
    pub bypass_cache: bool,

    /// Route the request through the proxy from the start.
    #[arg(long, default_value_t = false)]
    pub force_proxy: bool,

    /// Retry budget for 5xx and 429 responses.
    #[arg(long)]
    pub max_retries: Option<u32>,
}

impl RequestArgs {
    pub fn to_request(&self) -> FetchRequest {
        let mut request =
            FetchRequest::new(self.url.clone()).with_ttl(Duration::from_secs(self.ttl));
        if let Some(credential) =
            Credential::from_parts(self.api_key.as_deref(), self.api_key_header.as_deref())
        {
            request = request.with_credential(credential);
        }
        if let Some(max_retries) = self.max_retries {
            request = request.with_max_retries(max_retries);
        }
        if self.bypass_cache {
            request = request.bypass_cache();
        }
        if self.force_proxy {
            request = request.force_proxy();
        }
        request
    }
}

#[derive(Debug, Clone, Args)]
pub struct FetchArgs {
    #[command(flatten)]
    pub request: RequestArgs,

    /// Print only the value at this path (e.g. `quote.price`, `items[0].close`).
    #[arg(long)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct FieldsArgs {
    #[command(flatten)]
    pub request: RequestArgs,

    /// Only list arrays and the objects leading to them.
    #[arg(long, default_value_t = false)]
    pub arrays_only: bool,

    /// Prefix applied to every listed path.
    #[arg(long, default_value = "")]
    pub prefix: String,

    /// Print bare paths instead of descriptors.
    #[arg(long, default_value_t = false)]
    pub flat: bool,
}

#[derive(Debug, Clone, Args)]
pub struct InferArgs {
    #[command(flatten)]
    pub request: RequestArgs,
}
