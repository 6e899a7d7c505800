use finboard_core::{infer_currency, Fetcher};
use serde_json::Value;

use crate::cli::InferArgs;
use crate::error::CliError;

use super::CommandResult;

/// Prints the detected currency, or `null` when the payload names none.
pub async fn run(args: &InferArgs, fetcher: &Fetcher) -> Result<CommandResult, CliError> {
    let outcome = fetcher.fetch(&args.request.to_request()).await;
    let Some(data) = outcome.data() else {
        return CommandResult::from_failed_fetch(outcome);
    };

    let payload = match infer_currency(data) {
        Some(found) => serde_json::to_value(found)?,
        None => Value::Null,
    };
    Ok(CommandResult::ok(payload))
}
