//! Query-string decoding into nested JSON.
//!
//! Keys and values are percent-decoded, values are coerced with
//! [`coerce_query_value`], and bracket-path keys expand into nested
//! structures:
//!
//! ```text
//! ?page=2&tags[]=a&tags[]=b&filter[name]=bob&filter[ids][]=1
//! => {"page": 2, "tags": ["a", "b"], "filter": {"name": "bob", "ids": [1]}}
//! ```

use percent_encoding::percent_decode_str;
use serde_json::{Map, Value};

use crate::coerce::coerce_query_value;

/// Deepest bracket path expanded. Longer keys are kept as literal keys.
const MAX_BRACKET_DEPTH: usize = 32;

/// Decode a query string (with or without the leading `?`).
///
/// Anything after a `#` is ignored. Empty input yields an empty map.
#[must_use]
pub fn parse_query(search: &str) -> Map<String, Value> {
    let search = search.strip_prefix('?').unwrap_or(search);
    let search = search.split_once('#').map_or(search, |(q, _)| q);

    let mut out = Map::new();
    for pair in search.split('&').filter(|p| !p.is_empty()) {
        let (raw_key, raw_value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode(raw_key);
        let value = coerce_query_value(&decode(raw_value));

        match split_bracket_path(&key) {
            Some((head, path)) => insert_path(&mut out, head, &path, value),
            None => {
                out.insert(key, value);
            }
        }
    }
    out
}

fn decode(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

/// Split `a[b][]` into `("a", ["b", ""])`.
///
/// Plain keys and keys nested deeper than [`MAX_BRACKET_DEPTH`] return `None`.
fn split_bracket_path(key: &str) -> Option<(&str, Vec<String>)> {
    if !key.ends_with(']') {
        return None;
    }
    let open = key.find('[')?;
    let head = &key[..open];
    let inner = &key[open + 1..key.len() - 1];
    if inner.matches("][").count() >= MAX_BRACKET_DEPTH {
        return None;
    }
    let segments = inner.split("][").map(|s| s.trim().to_owned()).collect();
    Some((head, segments))
}

fn is_index(segment: &str) -> bool {
    segment.is_empty() || segment.bytes().all(|b| b.is_ascii_digit())
}

fn container_for(next: &str) -> Value {
    if is_index(next) {
        Value::Array(Vec::new())
    } else {
        Value::Object(Map::new())
    }
}

fn insert_path(root: &mut Map<String, Value>, head: &str, path: &[String], value: Value) {
    let Some(first) = path.first() else {
        return;
    };
    let slot = root
        .entry(head.to_owned())
        .or_insert_with(|| container_for(first));
    if !slot.is_array() && !slot.is_object() {
        *slot = container_for(first);
    }
    assign(slot, path, value);
}

fn assign(target: &mut Value, path: &[String], value: Value) {
    let Some((segment, rest)) = path.split_first() else {
        *target = value;
        return;
    };

    // A named key on an array turns it into an object keyed by position.
    if target.is_array() && !is_index(segment) {
        if let Value::Array(items) = std::mem::take(target) {
            *target = Value::Object(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| (i.to_string(), v))
                    .collect(),
            );
        }
    }
    if !target.is_array() && !target.is_object() {
        *target = container_for(segment);
    }

    match target {
        Value::Array(items) => {
            let position = segment
                .parse::<usize>()
                .ok()
                .filter(|&i| i < items.len());
            let child = match position {
                Some(i) => &mut items[i],
                None => {
                    let fresh = rest.first().map_or(Value::Null, |next| container_for(next));
                    items.push(fresh);
                    let last = items.len() - 1;
                    &mut items[last]
                }
            };
            assign(child, rest, value);
        }
        Value::Object(map) => {
            if rest.is_empty() {
                match map.get_mut(segment.as_str()) {
                    Some(Value::Array(items)) => items.push(value),
                    _ => {
                        map.insert(segment.clone(), value);
                    }
                }
                return;
            }
            let child = map
                .entry(segment.clone())
                .or_insert_with(|| container_for(&rest[0]));
            assign(child, rest, value);
        }
        _ => {}
    }
}
