//! Field discovery for the widget configuration picker.
//!
//! Builds a descriptive tree of every path reachable in a sample response.
//! Arrays are described by their first element, which is assumed to be
//! representative of the rest.

use serde::Serialize;
use serde_json::Value;

use crate::json_path::{join_index, join_key};

/// Deepest nesting described; anything below is omitted.
pub const MAX_FIELD_DEPTH: usize = 8;

const MAX_SAMPLE_CHARS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Null,
    Object,
    Array,
}

impl FieldType {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::String(_) => Self::String,
            Value::Number(_) => Self::Number,
            Value::Bool(_) => Self::Boolean,
            Value::Null => Self::Null,
            Value::Object(_) => Self::Object,
            Value::Array(_) => Self::Array,
        }
    }
}

/// One discoverable field. `path` is accepted by [`crate::json_path::resolve`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    pub path: String,
    pub key: String,
    pub inferred_type: FieldType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_count: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FieldDescriptor>,
}

impl FieldDescriptor {
    /// This descriptor followed by all of its descendants, depth first.
    pub fn walk(&self) -> Vec<&FieldDescriptor> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.walk());
        }
        out
    }
}

/// Describes the fields of `json`, prefixing every path with `prefix`.
///
/// With `arrays_only`, only arrays (and the objects leading to them) are
/// kept, which is what table widgets need to pick a row source.
pub fn extract_fields(json: &Value, prefix: &str, arrays_only: bool) -> Vec<FieldDescriptor> {
    match json {
        Value::Array(_) => describe("", json, prefix.to_owned(), arrays_only, 0)
            .into_iter()
            .collect(),
        Value::Object(_) => collect(json, prefix, arrays_only, 0),
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => Vec::new(),
    }
}

/// Every path in `fields`, depth first.
pub fn flatten_paths(fields: &[FieldDescriptor]) -> Vec<String> {
    fields
        .iter()
        .flat_map(FieldDescriptor::walk)
        .map(|field| field.path.clone())
        .collect()
}

fn collect(value: &Value, prefix: &str, arrays_only: bool, depth: usize) -> Vec<FieldDescriptor> {
    if depth >= MAX_FIELD_DEPTH {
        return Vec::new();
    }

    match value {
        Value::Object(map) => map
            .iter()
            .filter_map(|(key, child)| {
                describe(key, child, join_key(prefix, key), arrays_only, depth)
            })
            .collect(),
        Value::Array(items) => items
            .first()
            .map(|first| collect(first, &join_index(prefix, 0), arrays_only, depth + 1))
            .unwrap_or_default(),
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => Vec::new(),
    }
}

fn describe(
    key: &str,
    value: &Value,
    path: String,
    arrays_only: bool,
    depth: usize,
) -> Option<FieldDescriptor> {
    let inferred_type = FieldType::of(value);
    let (children, item_count) = match value {
        Value::Object(_) => (collect(value, &path, arrays_only, depth + 1), None),
        Value::Array(items) => (
            items
                .first()
                .map(|first| collect(first, &join_index(&path, 0), arrays_only, depth + 1))
                .unwrap_or_default(),
            Some(items.len()),
        ),
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => (Vec::new(), None),
    };

    if arrays_only && inferred_type != FieldType::Array && children.is_empty() {
        return None;
    }

    Some(FieldDescriptor {
        key: key.to_owned(),
        sample_value: sample(value),
        path,
        inferred_type,
        item_count,
        children,
    })
}

fn sample(value: &Value) -> Option<Value> {
    match value {
        Value::String(text) if text.chars().count() > MAX_SAMPLE_CHARS => {
            let truncated: String = text.chars().take(MAX_SAMPLE_CHARS).collect();
            Some(Value::String(format!("{truncated}…")))
        }
        Value::String(_) | Value::Number(_) | Value::Bool(_) => Some(value.clone()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json_path::resolve;
    use serde_json::json;

    fn sample_body() -> Value {
        json!({
            "symbol": "IBM",
            "quote": {"price": 189.5, "open": true},
            "history": [
                {"date": "2024-01-02", "close": 161.5},
                {"date": "2024-01-03", "close": 160.1}
            ]
        })
    }

    #[test]
    fn describes_object_tree() {
        let fields = extract_fields(&sample_body(), "", false);

        let paths = flatten_paths(&fields);
        assert_eq!(
            paths,
            vec![
                "symbol",
                "quote",
                "quote.price",
                "quote.open",
                "history",
                "history[0].date",
                "history[0].close",
            ]
        );

        assert_eq!(fields[0].inferred_type, FieldType::String);
        assert_eq!(fields[0].sample_value, Some(json!("IBM")));
        assert_eq!(fields[2].inferred_type, FieldType::Array);
        assert_eq!(fields[2].item_count, Some(2));
    }

    #[test]
    fn every_path_resolves_against_the_body() {
        let body = sample_body();
        for path in flatten_paths(&extract_fields(&body, "", false)) {
            assert!(resolve(&body, &path).is_some(), "{path}");
        }
    }

    #[test]
    fn arrays_only_keeps_array_ancestry() {
        let body = json!({
            "meta": {"count": 2},
            "data": {"rows": [{"id": 1}], "total": 2},
            "tags": ["a"]
        });

        let fields = extract_fields(&body, "", true);
        assert_eq!(flatten_paths(&fields), vec!["data", "data.rows", "tags"]);
    }

    #[test]
    fn root_array_is_described_with_prefix() {
        let body = json!([{"price": 1.0}]);
        let fields = extract_fields(&body, "", false);

        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].path, "");
        assert_eq!(fields[0].item_count, Some(1));
        assert_eq!(fields[0].children[0].path, "[0].price");
    }

    #[test]
    fn prefix_is_applied_to_paths() {
        let fields = extract_fields(&json!({"price": 1}), "data", false);
        assert_eq!(fields[0].path, "data.price");
    }

    #[test]
    fn long_strings_are_truncated_in_samples() {
        let long = "x".repeat(100);
        let fields = extract_fields(&json!({ "note": long }), "", false);
        let sample = fields[0]
            .sample_value
            .as_ref()
            .and_then(Value::as_str)
            .expect("string sample");
        assert_eq!(sample.chars().count(), MAX_SAMPLE_CHARS + 1);
    }

    #[test]
    fn scalar_roots_have_no_fields() {
        assert!(extract_fields(&json!(3), "", false).is_empty());
    }
}
