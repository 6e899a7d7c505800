mod fetch;
mod fields;
mod infer;

use std::sync::Arc;

use finboard_core::{
    FetchConfig, FetchOutcome, FetchResponse, Fetcher, HttpClient, ReqwestHttpClient,
};
use serde_json::Value;
use tracing::debug;

use crate::cli::{Cli, Command};
use crate::error::CliError;

/// What a command prints, and whether the run should end in failure.
#[derive(Debug)]
pub struct CommandResult {
    pub payload: Value,
    pub failure: Option<CliError>,
}

impl CommandResult {
    pub fn ok(payload: Value) -> Self {
        Self {
            payload,
            failure: None,
        }
    }

    /// Envelope of a fetch that produced no data; the run exits non-zero.
    pub fn from_failed_fetch(outcome: FetchOutcome) -> Result<Self, CliError> {
        let failure = CliError::Fetch {
            code: outcome
                .failure_kind()
                .map(|kind| kind.code())
                .unwrap_or("fetch.unknown"),
            message: outcome.error_message().unwrap_or_default(),
        };
        Ok(Self {
            payload: serde_json::to_value(FetchResponse::from(outcome))?,
            failure: Some(failure),
        })
    }
}

pub async fn run(cli: &Cli) -> Result<CommandResult, CliError> {
    let fetcher = build_fetcher(cli)?;

    match &cli.command {
        Command::Fetch(args) => fetch::run(args, &fetcher).await,
        Command::Fields(args) => fields::run(args, &fetcher).await,
        Command::Infer(args) => infer::run(args, &fetcher).await,
    }
}

fn build_fetcher(cli: &Cli) -> Result<Fetcher, CliError> {
    let mut config = FetchConfig::from_env()?;
    if let Some(proxy_url) = &cli.proxy_url {
        config = config.with_proxy_url(proxy_url.clone());
    }

    debug!(
        proxy_configured = config.proxy_url.is_some(),
        max_retries = config.retry.max_retries,
        "fetcher configured"
    );
    let client: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new(&config.user_agent));
    Ok(Fetcher::new(client, config)?)
}
