//! Best-effort currency discovery in unknown JSON payloads.
//!
//! The scan is heuristic: it looks for currency-ish keys holding either a
//! three-letter code or a known symbol glyph, and reports the first hit.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::json_path::{join_index, join_key};

/// Deepest object nesting visited by the scan.
pub const MAX_SCAN_DEPTH: usize = 5;

/// Keys (lower-cased) whose string values may name a currency.
const CURRENCY_KEYS: [&str; 13] = [
    "currency",
    "currencycode",
    "currency_code",
    "base_currency",
    "basecurrency",
    "quote_currency",
    "quotecurrency",
    "currency_symbol",
    "currencysymbol",
    "ccy",
    "symbol",
    "code",
    "unit",
];

/// ISO-style code to display symbol.
const CODE_SYMBOLS: [(&str, &str); 30] = [
    ("USD", "$"),
    ("EUR", "€"),
    ("GBP", "£"),
    ("JPY", "¥"),
    ("CNY", "¥"),
    ("INR", "₹"),
    ("KRW", "₩"),
    ("RUB", "₽"),
    ("TRY", "₺"),
    ("BRL", "R$"),
    ("CAD", "C$"),
    ("AUD", "A$"),
    ("NZD", "NZ$"),
    ("HKD", "HK$"),
    ("SGD", "S$"),
    ("MXN", "MX$"),
    ("CHF", "CHF"),
    ("SEK", "kr"),
    ("NOK", "kr"),
    ("DKK", "kr"),
    ("PLN", "zł"),
    ("ZAR", "R"),
    ("ILS", "₪"),
    ("THB", "฿"),
    ("PHP", "₱"),
    ("VND", "₫"),
    ("NGN", "₦"),
    ("UAH", "₴"),
    ("BTC", "₿"),
    ("ETH", "Ξ"),
];

/// Glyphs that identify a single currency unambiguously.
const SYMBOL_CODES: [(&str, &str); 19] = [
    ("$", "USD"),
    ("US$", "USD"),
    ("€", "EUR"),
    ("£", "GBP"),
    ("¥", "JPY"),
    ("₹", "INR"),
    ("₩", "KRW"),
    ("₽", "RUB"),
    ("₺", "TRY"),
    ("R$", "BRL"),
    ("C$", "CAD"),
    ("A$", "AUD"),
    ("HK$", "HKD"),
    ("₪", "ILS"),
    ("฿", "THB"),
    ("₱", "PHP"),
    ("₫", "VND"),
    ("₦", "NGN"),
    ("₿", "BTC"),
];

/// A currency found in a payload and where it was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrencyMatch {
    pub code: String,
    pub symbol: String,
    pub path: String,
}

/// Display symbol for an ISO-style code, falling back to the code itself.
pub fn symbol_for_code(code: &str) -> String {
    let code = code.to_ascii_uppercase();
    CODE_SYMBOLS
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, symbol)| (*symbol).to_owned())
        .unwrap_or(code)
}

/// Code for an unambiguous symbol glyph.
pub fn code_for_symbol(symbol: &str) -> Option<&'static str> {
    SYMBOL_CODES
        .iter()
        .find(|(known, _)| *known == symbol)
        .map(|(_, code)| *code)
}

/// Scans `body` for a currency. Falls back to the `data` property and then
/// to the first element of a root array.
pub fn infer(body: &Value) -> Option<CurrencyMatch> {
    if let Some(found) = scan(body, "", 0) {
        return Some(found);
    }

    if let Some(data) = body.get("data") {
        if let Some(found) = scan(data, "data", 0) {
            return Some(found);
        }
    }

    match body {
        Value::Array(items) => items
            .first()
            .and_then(|first| scan(first, &join_index("", 0), 0)),
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) | Value::Object(_) => {
            None
        }
    }
}

fn scan(value: &Value, path: &str, depth: usize) -> Option<CurrencyMatch> {
    if depth > MAX_SCAN_DEPTH {
        return None;
    }

    match value {
        Value::Object(map) => scan_object(map, path, depth),
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) | Value::Array(_) => {
            None
        }
    }
}

fn scan_object(map: &Map<String, Value>, path: &str, depth: usize) -> Option<CurrencyMatch> {
    let own = map.iter().find_map(|(key, value)| {
        let lowered = key.to_ascii_lowercase();
        if !CURRENCY_KEYS.contains(&lowered.as_str()) {
            return None;
        }
        match value {
            Value::String(text) => match_currency(text, join_key(path, key)),
            Value::Null
            | Value::Bool(_)
            | Value::Number(_)
            | Value::Array(_)
            | Value::Object(_) => None,
        }
    });
    if own.is_some() {
        return own;
    }

    let nested = map.iter().find_map(|(key, value)| match value {
        Value::Object(_) => scan(value, &join_key(path, key), depth + 1),
        Value::Null
        | Value::Bool(_)
        | Value::Number(_)
        | Value::String(_)
        | Value::Array(_) => None,
    });
    if nested.is_some() {
        return nested;
    }

    map.iter().find_map(|(key, value)| match value {
        Value::Array(items) => items
            .first()
            .and_then(|first| scan(first, &join_index(&join_key(path, key), 0), depth + 1)),
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) | Value::Object(_) => {
            None
        }
    })
}

fn match_currency(raw: &str, path: String) -> Option<CurrencyMatch> {
    let text = raw.trim();

    if text.len() == 3 && text.chars().all(|ch| ch.is_ascii_alphabetic()) {
        let code = text.to_ascii_uppercase();
        return Some(CurrencyMatch {
            symbol: symbol_for_code(&code),
            code,
            path,
        });
    }

    code_for_symbol(text).map(|code| CurrencyMatch {
        code: code.to_owned(),
        symbol: text.to_owned(),
        path,
    })
}
