//! Schema coercion for raw JSON documents read from the store.
//!
//! Documents written by older clients carry amounts as strings, leave months
//! empty, or use keys that are not months at all. Everything is normalized
//! here so the rest of the crate only sees typed records.

use serde_json::{Map, Value};

use super::month::Month;

/// Read a number that may be encoded as a JSON number or a numeric string.
/// Anything else (missing, empty, non-numeric, non-finite) counts as zero.
pub fn coerce_number(value: Option<&Value>) -> f64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite()).unwrap_or(0.0)
}

/// Read a string field, accepting numbers for fields like account numbers.
pub fn coerce_string(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Iterate the month-keyed object at `field`, dropping keys that are not months.
pub fn month_entries<'a>(
    doc: &'a Map<String, Value>,
    field: &str,
    doc_id: &str,
) -> Vec<(Month, &'a Map<String, Value>)> {
    let Some(Value::Object(months)) = doc.get(field) else {
        return Vec::new();
    };

    months
        .iter()
        .filter_map(|(key, entry)| {
            let Ok(month) = key.parse::<Month>() else {
                tracing::warn!(doc_id, key = %key, field, "Dropping non-month key from document");
                return None;
            };
            match entry {
                Value::Object(obj) => Some((month, obj)),
                _ => {
                    tracing::warn!(doc_id, month = %month, field, "Dropping malformed month entry");
                    None
                }
            }
        })
        .collect()
}

/// Deep-merge `patch` into `target` the way document stores merge writes:
/// nested objects are merged key by key, everything else is replaced.
pub fn merge_document(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(dst), Value::Object(src)) => {
            for (key, value) in src {
                match dst.get_mut(&key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        merge_document(existing, value);
                    }
                    _ => {
                        dst.insert(key, value);
                    }
                }
            }
        }
        (dst, src) => *dst = src,
    }
}
