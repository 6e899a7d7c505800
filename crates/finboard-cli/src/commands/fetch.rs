use finboard_core::{resolve, FetchResponse, Fetcher};
use serde_json::Value;

use crate::cli::FetchArgs;
use crate::error::CliError;

use super::CommandResult;

pub async fn run(args: &FetchArgs, fetcher: &Fetcher) -> Result<CommandResult, CliError> {
    let outcome = fetcher.fetch(&args.request.to_request()).await;
    if !outcome.is_data() {
        return CommandResult::from_failed_fetch(outcome);
    }

    let mut response = FetchResponse::from(outcome);
    if let Some(path) = &args.path {
        let selected = response
            .data
            .as_ref()
            .and_then(|data| resolve(data, path))
            .cloned()
            .ok_or_else(|| CliError::PathNotFound(path.clone()))?;
        response.data = Some(selected);
    }

    let payload: Value = serde_json::to_value(response)?;
    Ok(CommandResult::ok(payload))
}
