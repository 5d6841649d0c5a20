//! Primitive coercion of raw string values.
//!
//! Environment variables and query strings only carry text. These helpers turn
//! that text into the JSON value a handler most likely wants: booleans,
//! numbers, and for query strings a handful of literal sentinels and inline
//! JSON.

use serde_json::Value;

/// Largest integer a double represents exactly (`2^53 - 1`).
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Coerce a raw string using the configuration rules.
///
/// - `"true"` / `"false"` (any case) become booleans.
/// - Numeric strings within the safe-integer range become numbers.
/// - Everything else is returned as a string, unchanged.
///
/// # Examples
///
/// ```
/// use routestack_core::coerce_primitive;
/// use serde_json::json;
///
/// assert_eq!(coerce_primitive("42"), json!(42));
/// assert_eq!(coerce_primitive("TRUE"), json!(true));
/// assert_eq!(coerce_primitive("hello"), json!("hello"));
/// ```
#[must_use]
pub fn coerce_primitive(raw: &str) -> Value {
    if raw.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if raw.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if let Some(number) = parse_number(raw) {
        return number;
    }
    Value::String(raw.to_owned())
}

/// Coerce a decoded query-string value.
///
/// Applies [`coerce_primitive`] first, then recognizes the literal sentinels
/// `null`, `undefined`, `NaN`, `Infinity`, `-Infinity`, `[]`, `{}` and
/// JSON-shaped values. Sentinels JSON cannot represent collapse to `null`.
/// Malformed JSON stays a string.
#[must_use]
pub fn coerce_query_value(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::String(String::new());
    }

    match coerce_primitive(raw) {
        Value::String(_) => {}
        other => return other,
    }

    match raw {
        "null" | "undefined" | "NaN" | "Infinity" | "-Infinity" => return Value::Null,
        "[]" => return Value::Array(Vec::new()),
        "{}" => return Value::Object(serde_json::Map::new()),
        _ => {}
    }

    let json_shaped = (raw.starts_with('{') && raw.ends_with('}'))
        || (raw.starts_with('[') && raw.ends_with(']'));
    if json_shaped {
        if let Ok(value) = serde_json::from_str::<Value>(raw) {
            return value;
        }
    }

    Value::String(raw.to_owned())
}

/// Parse a finite number within the safe-integer range.
fn parse_number(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    // `f64::from_str` accepts "inf" and "nan" spellings; only digits count here.
    if trimmed
        .bytes()
        .any(|b| !(b.is_ascii_digit() || matches!(b, b'.' | b'-' | b'+' | b'e' | b'E')))
    {
        return None;
    }

    let n: f64 = trimmed.parse().ok()?;
    if !n.is_finite() || !(-MAX_SAFE_INTEGER..=MAX_SAFE_INTEGER).contains(&n) {
        return None;
    }

    if n.fract() == 0.0 {
        #[allow(clippy::cast_possible_truncation)]
        return Some(Value::from(n as i64));
    }
    serde_json::Number::from_f64(n).map(Value::Number)
}
