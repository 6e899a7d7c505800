//! Detection of errors reported inside a successful (2xx) JSON body.
//!
//! Several financial APIs answer HTTP 200 and describe the failure in the
//! payload. These bodies must not be cached or shown as data.

use serde_json::Value;

/// An error embedded in an otherwise successful response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftError {
    /// Top-level field that carried the error.
    pub field: &'static str,
    /// Human-readable message including provider guidance where known.
    pub message: String,
}

impl SoftError {
    fn new(field: &'static str, message: String) -> Self {
        Self { field, message }
    }
}

/// Looks for a provider-reported error at the root of `body`.
pub fn detect(body: &Value) -> Option<SoftError> {
    let Value::Object(map) = body else {
        return None;
    };

    if let Some(detail) = map.get("Error Message").and_then(non_empty_str) {
        return Some(SoftError::new(
            "Error Message",
            format!(
                "API error: {detail}. Check the function, symbol and parameters in the URL."
            ),
        ));
    }

    if let Some(detail) = map.get("Note").and_then(non_empty_str) {
        return Some(SoftError::new(
            "Note",
            format!(
                "API call frequency limit reached: {detail} \
                 Increase the refresh interval or upgrade the API plan."
            ),
        ));
    }

    if let Some(detail) = map.get("Information").and_then(non_empty_str) {
        return Some(SoftError::new(
            "Information",
            format!(
                "API notice: {detail} The endpoint may require a premium plan \
                 or the daily quota may be exhausted."
            ),
        ));
    }

    if let Some(detail) = map.get("error").and_then(error_detail) {
        return Some(SoftError::new("error", format!("API error: {detail}")));
    }

    if let Some(detail) = map.get("errors").and_then(errors_detail) {
        return Some(SoftError::new("errors", format!("API error: {detail}")));
    }

    let status_is_error = map
        .get("status")
        .and_then(Value::as_str)
        .is_some_and(|status| status.eq_ignore_ascii_case("error"));
    if status_is_error {
        let detail = map
            .get("message")
            .and_then(non_empty_str)
            .unwrap_or("the provider reported an error without a message");
        return Some(SoftError::new("status", format!("API error: {detail}")));
    }

    None
}

fn non_empty_str(value: &Value) -> Option<&str> {
    value.as_str().map(str::trim).filter(|text| !text.is_empty())
}

/// `"error": "text"` or `"error": {"message"|"info"|"description": "text"}`.
fn error_detail(value: &Value) -> Option<String> {
    match value {
        Value::String(_) => non_empty_str(value).map(str::to_owned),
        Value::Object(map) => ["message", "info", "description", "type"]
            .iter()
            .find_map(|key| map.get(*key).and_then(non_empty_str))
            .map(str::to_owned)
            .or_else(|| (!map.is_empty()).then(|| value.to_string())),
        Value::Bool(true) => Some(String::from("the provider flagged the response as an error")),
        Value::Null | Value::Bool(false) | Value::Number(_) | Value::Array(_) => None,
    }
}

fn errors_detail(value: &Value) -> Option<String> {
    match value {
        Value::Array(items) => {
            let first = items.first()?;
            error_detail(first).or_else(|| Some(first.to_string()))
        }
        Value::String(_) | Value::Object(_) => error_detail(value),
        Value::Null | Value::Bool(_) | Value::Number(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn alpha_vantage_notes_are_errors() {
        let note = json!({
            "Note": "Thank you for using Alpha Vantage! \
                     Our standard API call frequency is 5 calls per minute."
        });
        let found = detect(&note).expect("note is an error");
        assert_eq!(found.field, "Note");
        assert!(found.message.contains("frequency limit"));

        let invalid = json!({"Error Message": "Invalid API call."});
        assert_eq!(detect(&invalid).map(|e| e.field), Some("Error Message"));

        let premium = json!({"Information": "This is a premium endpoint."});
        assert!(detect(&premium).expect("info").message.contains("premium plan"));
    }

    #[test]
    fn generic_error_shapes_are_recognized() {
        let text = json!({"error": "Invalid symbol"});
        assert_eq!(
            detect(&text).map(|e| e.message),
            Some(String::from("API error: Invalid symbol"))
        );

        let nested = json!({"success": false, "error": {"code": 101, "info": "No API key"}});
        assert_eq!(detect(&nested).map(|e| e.message), Some(String::from("API error: No API key")));

        let list = json!({"errors": [{"message": "rate exceeded"}]});
        assert_eq!(detect(&list).map(|e| e.field), Some("errors"));

        let twelve = json!({"code": 400, "message": "symbol not found", "status": "error"});
        assert_eq!(detect(&twelve).map(|e| e.field), Some("status"));
    }

    #[test]
    fn empty_or_false_error_fields_are_ignored() {
        assert!(detect(&json!({"error": null, "data": [1]})).is_none());
        assert!(detect(&json!({"error": false})).is_none());
        assert!(detect(&json!({"error": ""})).is_none());
        assert!(detect(&json!({"errors": []})).is_none());
        assert!(detect(&json!({"status": "ok", "price": 1})).is_none());
        assert!(detect(&json!([{"error": "inside array"}])).is_none());
    }
}
