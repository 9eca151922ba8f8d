//! Bounded value summaries for telemetry
//!
//! Telemetry metadata must never carry raw payloads: a resolved value can be
//! arbitrarily large. [`summarize`] produces a bounded, inspection-safe
//! representation — long strings are truncated, collections are capped and
//! tagged with their real length, deep structures are cut off.

use serde::Serialize;
use serde_json::{json, Value};

/// Longest string carried verbatim
const STRING_LIMIT: usize = 120;

/// Most collection items carried per level
const ITEM_LIMIT: usize = 8;

/// Deepest structure level summarized before cutting off
const DEPTH_LIMIT: usize = 3;

/// Produce a bounded summary of an arbitrary JSON value
pub fn summarize(value: &Value) -> Value {
    summarize_at(value, 0)
}

/// Summarize any serializable value.
///
/// Values that fail to serialize are tagged opaque rather than erroring;
/// summaries are observability-only and must not affect control flow.
pub fn summarize_any<T: Serialize>(value: &T) -> Value {
    match serde_json::to_value(value) {
        Ok(v) => summarize(&v),
        Err(_) => json!({ "type": "opaque" }),
    }
}

fn summarize_at(value: &Value, depth: usize) -> Value {
    if depth >= DEPTH_LIMIT {
        return json!({ "type": type_name(value), "truncated": true });
    }

    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) => value.clone(),
        Value::String(s) => {
            if s.chars().count() <= STRING_LIMIT {
                value.clone()
            } else {
                let preview: String = s.chars().take(STRING_LIMIT).collect();
                json!({ "type": "string", "len": s.len(), "preview": preview })
            }
        }
        Value::Array(items) => {
            let summarized: Vec<Value> = items
                .iter()
                .take(ITEM_LIMIT)
                .map(|item| summarize_at(item, depth + 1))
                .collect();
            if items.len() <= ITEM_LIMIT {
                Value::Array(summarized)
            } else {
                json!({ "type": "array", "len": items.len(), "items": summarized })
            }
        }
        Value::Object(entries) => {
            let summarized: serde_json::Map<String, Value> = entries
                .iter()
                .take(ITEM_LIMIT)
                .map(|(k, v)| (k.clone(), summarize_at(v, depth + 1)))
                .collect();
            if entries.len() <= ITEM_LIMIT {
                Value::Object(summarized)
            } else {
                json!({ "type": "object", "len": entries.len(), "entries": summarized })
            }
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
