//! Path lookup over arbitrary JSON trees.
//!
//! Paths are dot-separated keys, each optionally followed by bracketed array
//! indices: `quote.items[0].price`, `matrix[1][0]`. A path that starts with an
//! index (`[1]`) addresses a root-level array, a purely numeric key also
//! indexes into an array (`items.0.price`), and the empty path is the root.
//!
//! Absence is a normal result: every lookup returns `Option` and malformed
//! paths simply resolve to `None`.

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step<'a> {
    Key(&'a str),
    Index(usize),
}

fn parse(path: &str) -> Option<Vec<Step<'_>>> {
    let path = path.trim();
    let mut steps = Vec::new();
    if path.is_empty() {
        return Some(steps);
    }

    for segment in path.split('.') {
        let (name, mut rest) = match segment.find('[') {
            Some(position) => segment.split_at(position),
            None => (segment, ""),
        };

        if !name.is_empty() {
            steps.push(Step::Key(name));
        } else if rest.is_empty() {
            // `a..b` or a trailing dot
            return None;
        }

        while !rest.is_empty() {
            let inner = rest.strip_prefix('[')?;
            let close = inner.find(']')?;
            let index = inner[..close].trim().parse::<usize>().ok()?;
            steps.push(Step::Index(index));
            rest = &inner[close + 1..];
        }
    }

    Some(steps)
}

/// Resolves `path` against `root`, returning `None` as soon as a step is missing.
pub fn resolve<'v>(root: &'v Value, path: &str) -> Option<&'v Value> {
    let steps = parse(path)?;
    steps.into_iter().try_fold(root, |current, step| match (step, current) {
        (Step::Key(key), Value::Object(map)) => map.get(key),
        (Step::Key(key), Value::Array(items)) => {
            key.parse::<usize>().ok().and_then(|index| items.get(index))
        }
        (Step::Index(index), Value::Array(items)) => items.get(index),
        (Step::Key(_) | Step::Index(_), Value::Null)
        | (Step::Key(_) | Step::Index(_), Value::Bool(_))
        | (Step::Key(_) | Step::Index(_), Value::Number(_))
        | (Step::Key(_) | Step::Index(_), Value::String(_))
        | (Step::Index(_), Value::Object(_)) => None,
    })
}

/// Resolves a numeric value. Numeric strings (`"101.5"`) are accepted since
/// many providers quote prices as strings.
pub fn resolve_f64(root: &Value, path: &str) -> Option<f64> {
    match resolve(root, path)? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        Value::Null | Value::Bool(_) | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Resolves a scalar for display. Containers and `null` resolve to `None`.
pub fn resolve_display(root: &Value, path: &str) -> Option<String> {
    match resolve(root, path)? {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

pub(crate) fn join_key(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_owned()
    } else {
        format!("{prefix}.{key}")
    }
}

pub(crate) fn join_index(prefix: &str, index: usize) -> String {
    format!("{prefix}[{index}]")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_nested_array_index() {
        let root = json!({"a": {"b": [{"c": 5}]}});
        assert_eq!(resolve(&root, "a.b[0].c"), Some(&json!(5)));
    }

    #[test]
    fn missing_intermediate_is_not_found() {
        let root = json!({"a": 1});
        assert_eq!(resolve(&root, "a.b"), None);
        assert_eq!(resolve(&root, "x.y.z"), None);
    }

    #[test]
    fn root_array_is_addressed_by_leading_index() {
        let root = json!([10, 20]);
        assert_eq!(resolve(&root, "[1]"), Some(&json!(20)));
        assert_eq!(resolve(&root, "[2]"), None);
        assert_eq!(resolve(&root, "1"), Some(&json!(20)));
    }

    #[test]
    fn empty_path_is_the_root() {
        let root = json!(42);
        assert_eq!(resolve(&root, ""), Some(&json!(42)));
        assert_eq!(resolve(&root, "value"), None);
    }

    #[test]
    fn chained_indices_walk_nested_arrays() {
        let root = json!({"matrix": [[1, 2], [3, 4]]});
        assert_eq!(resolve(&root, "matrix[1][0]"), Some(&json!(3)));
        assert_eq!(resolve(&root, "matrix.1.1"), Some(&json!(4)));
    }

    #[test]
    fn malformed_paths_resolve_to_none() {
        let root = json!({"items": [1, 2, 3]});
        assert_eq!(resolve(&root, "items[x]"), None);
        assert_eq!(resolve(&root, "items[0"), None);
        assert_eq!(resolve(&root, "items..0"), None);
        assert_eq!(resolve(&root, "items[0]tail"), None);
    }

    #[test]
    fn indexing_an_object_is_not_found() {
        let root = json!({"quote": {"price": 1}});
        assert_eq!(resolve(&root, "quote[0]"), None);
    }

    #[test]
    fn keys_containing_dots_are_not_addressable() {
        let root = json!({"Global Quote": {"05. price": "189.9800"}});
        assert_eq!(resolve_f64(&root, "Global Quote.05. price"), None);
        assert!(resolve(&root, "Global Quote").is_some());
    }

    #[test]
    fn numeric_strings_resolve_as_numbers() {
        let root = json!({"quote": {"price": "189.98", "volume": 1200}});
        assert_eq!(resolve_f64(&root, "quote.price"), Some(189.98));
        assert_eq!(resolve_f64(&root, "quote.volume"), Some(1200.0));
        assert_eq!(resolve_display(&root, "quote.volume").as_deref(), Some("1200"));
        assert_eq!(resolve_display(&root, "quote"), None);
    }
}
