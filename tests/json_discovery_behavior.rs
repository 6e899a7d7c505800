//! Behavior-driven tests for JSON discovery
//!
//! These tests verify HOW arbitrary provider payloads are navigated: path
//! resolution, field discovery for the widget picker and currency inference.

use finboard_core::{
    extract_fields, flatten_paths, infer_currency, resolve, resolve_display, resolve_f64,
    FieldType,
};
use serde_json::{json, Value};

fn time_series_payload() -> Value {
    json!({
        "Meta Data": {"2. Symbol": "IBM", "currency": "usd"},
        "items": [
            {"date": "2024-01-02", "price": 161.5},
            {"date": "2024-01-03", "price": "160.10"}
        ],
        "matrix": [[1, 2], [3, 4]]
    })
}

// =============================================================================
// Path resolution
// =============================================================================

#[test]
fn when_a_path_names_an_array_element_the_nested_value_is_returned() {
    // Given: A payload with an array of rows
    let payload = time_series_payload();

    // Then: Bracketed and numeric segments both index into arrays
    assert_eq!(resolve(&payload, "items[0].price"), Some(&json!(161.5)));
    assert_eq!(resolve(&payload, "items.1.date"), Some(&json!("2024-01-03")));
    assert_eq!(resolve(&payload, "matrix[1][0]"), Some(&json!(3)));
    assert_eq!(resolve(&payload, "Meta Data.2. Symbol"), None);
}

#[test]
fn when_a_path_leaves_the_payload_absence_is_reported_not_raised() {
    // Given: A payload
    let payload = time_series_payload();

    // Then: Missing keys, bad indices and malformed paths are all `None`
    assert_eq!(resolve(&payload, "items[5].price"), None);
    assert_eq!(resolve(&payload, "items[0].price.value"), None);
    assert_eq!(resolve(&payload, "nothing.here"), None);
    assert_eq!(resolve(&payload, "items[x]"), None);
    assert_eq!(resolve(&payload, "items[0"), None);
}

#[test]
fn when_the_payload_is_an_array_or_scalar_the_root_is_addressable() {
    // Given: Root-level arrays and scalars
    let rows = json!([{"price": 1}, {"price": 2}]);
    let scalar = json!(42);

    // Then: A leading index addresses the array and the empty path is the root
    assert_eq!(resolve(&rows, "[1].price"), Some(&json!(2)));
    assert_eq!(resolve(&scalar, ""), Some(&scalar));
    assert_eq!(resolve(&scalar, "price"), None);
}

#[test]
fn when_values_are_displayed_numeric_strings_count_as_numbers() {
    // Given: A price delivered as a string
    let payload = time_series_payload();

    // Then: Both representations coerce to numbers for display
    assert_eq!(resolve_f64(&payload, "items[1].price"), Some(160.10));
    assert_eq!(resolve_f64(&payload, "items[0].price"), Some(161.5));
    assert_eq!(resolve_f64(&payload, "items[0].date"), None);
    assert_eq!(
        resolve_display(&payload, "items[0].date").as_deref(),
        Some("2024-01-02")
    );
}

// =============================================================================
// Field discovery
// =============================================================================

#[test]
fn when_fields_are_extracted_every_listed_path_resolves() {
    // Given: A nested payload
    let payload = time_series_payload();

    // When: Its fields are extracted
    let fields = extract_fields(&payload, "", false);

    // Then: Every path can be bound by a widget
    for path in flatten_paths(&fields) {
        if path.ends_with("2. Symbol") {
            // keys containing dots are listed but cannot be addressed
            continue;
        }
        assert!(resolve(&payload, &path).is_some(), "{path} should resolve");
    }
    let items = fields
        .iter()
        .find(|field| field.key == "items")
        .expect("items listed");
    assert_eq!(items.inferred_type, FieldType::Array);
    assert_eq!(items.item_count, Some(2));
}

#[test]
fn when_a_table_source_is_needed_only_arrays_are_offered() {
    // Given: A payload mixing scalars, objects and arrays
    let payload = time_series_payload();

    // When: Only arrays are requested
    let fields = extract_fields(&payload, "", true);

    // Then: Scalar-only branches are dropped
    let top: Vec<&str> = fields.iter().map(|field| field.path.as_str()).collect();
    assert_eq!(top, vec!["items", "matrix"]);
}

#[test]
fn when_descriptors_are_serialized_they_use_camel_case() {
    // Given: A small payload
    let fields = extract_fields(&json!({"rows": [{"id": 7}]}), "data", false);

    // When: The picker receives them
    let wire = serde_json::to_value(&fields).expect("serializable");

    // Then: The wire shape matches the picker contract
    assert_eq!(
        wire,
        json!([{
            "path": "data.rows",
            "key": "rows",
            "inferredType": "array",
            "itemCount": 1,
            "children": [{
                "path": "data.rows[0].id",
                "key": "id",
                "inferredType": "number",
                "sampleValue": 7
            }]
        }])
    );
}

// =============================================================================
// Currency inference
// =============================================================================

#[test]
fn when_a_quote_names_its_currency_the_code_and_symbol_are_found() {
    // Given: The canonical quote payload
    let payload = json!({"quote": {"currency": "USD", "price": 100}});

    // When: Currency is inferred
    let found = infer_currency(&payload).expect("currency present");

    // Then: Code, symbol and location are reported
    assert_eq!(found.code, "USD");
    assert_eq!(found.symbol, "$");
    assert_eq!(found.path, "quote.currency");
}

#[test]
fn when_only_a_glyph_is_present_it_is_mapped_back_to_a_code() {
    // Given: A payload using a symbol instead of a code
    let payload = json!({"data": [{"unit": "€", "value": 3}]});

    // When: Currency is inferred
    let found = infer_currency(&payload).expect("glyph recognized");

    // Then: The glyph becomes its ISO code
    assert_eq!(found.code, "EUR");
    assert_eq!(found.symbol, "€");
}

#[test]
fn when_codes_are_lower_case_they_are_normalized() {
    // Given: A lower-case code in a metadata block
    let payload = time_series_payload();

    // Then: The code is upper-cased
    let found = infer_currency(&payload).expect("currency present");
    assert_eq!(found.code, "USD");
    assert_eq!(found.path, "Meta Data.currency");
}

#[test]
fn when_the_payload_is_a_list_the_first_row_is_scanned() {
    // Given: A root array of quotes
    let payload = json!([{"symbol": "GBP", "price": 1.27}, {"symbol": "JPY"}]);

    // Then: The first row decides
    let found = infer_currency(&payload).expect("currency present");
    assert_eq!(found.code, "GBP");
    assert_eq!(found.path, "[0].symbol");
}

#[test]
fn when_nothing_looks_like_a_currency_none_is_returned() {
    let named = json!({"price": 100, "name": "International Business Machines"});
    assert!(infer_currency(&named).is_none());
    assert!(infer_currency(&json!("USD")).is_none());
    assert!(infer_currency(&json!([])).is_none());
}
