use finboard_core::{extract_fields, flatten_paths, Fetcher};

use crate::cli::FieldsArgs;
use crate::error::CliError;

use super::CommandResult;

pub async fn run(args: &FieldsArgs, fetcher: &Fetcher) -> Result<CommandResult, CliError> {
    let outcome = fetcher.fetch(&args.request.to_request()).await;
    let Some(data) = outcome.data() else {
        return CommandResult::from_failed_fetch(outcome);
    };

    let fields = extract_fields(data, &args.prefix, args.arrays_only);
    let payload = if args.flat {
        serde_json::to_value(flatten_paths(&fields))?
    } else {
        serde_json::to_value(&fields)?
    };
    Ok(CommandResult::ok(payload))
}
