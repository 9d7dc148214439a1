//! Lenient accessors over model-produced JSON.
//!
//! Models return numbers as strings, booleans as words and empty strings for
//! missing values. Every accessor here maps what it cannot read to `None` (or
//! an empty collection) instead of failing.

use serde_json::{Map, Value};

/// Non-empty string value. Numbers are rendered as their JSON text.
pub fn string(obj: &Value, key: &str) -> Option<String> {
    value_as_string(obj.get(key)?)
}

pub fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Number from a JSON number or a numeric string ("1250.50", "R$ 1.250,50").
pub fn number(obj: &Value, key: &str) -> Option<f64> {
    value_as_number(obj.get(key)?)
}

pub fn value_as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => parse_numeric_text(s),
        _ => None,
    }
}

/// Whole number, truncating any fraction.
pub fn integer(obj: &Value, key: &str) -> Option<i64> {
    number(obj, key).map(|n| n.trunc() as i64)
}

pub fn boolean(obj: &Value, key: &str) -> Option<bool> {
    match obj.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "sim" => Some(true),
            "false" | "nao" | "não" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Elements of an array field; anything else reads as empty.
pub fn array<'a>(obj: &'a Value, key: &str) -> &'a [Value] {
    obj.get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Object elements of an array field, skipping everything else.
pub fn objects<'a>(obj: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    array(obj, key).iter().filter(|v| v.is_object())
}

/// String elements of an array field.
pub fn strings(obj: &Value, key: &str) -> Vec<String> {
    array(obj, key).iter().filter_map(value_as_string).collect()
}

pub fn object<'a>(obj: &'a Value, key: &str) -> Option<&'a Value> {
    obj.get(key).filter(|v| v.is_object())
}

/// Value restricted to a closed vocabulary (case-insensitive).
pub fn one_of(obj: &Value, key: &str, allowed: &[&str]) -> Option<String> {
    let value = string(obj, key)?.to_lowercase();
    allowed.contains(&value.as_str()).then_some(value)
}

/// An empty JSON object.
pub fn empty_object() -> Value {
    Value::Object(Map::new())
}

fn parse_numeric_text(text: &str) -> Option<f64> {
    let cleaned: String = text
        .trim()
        .trim_start_matches("R$")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    // Brazilian notation uses '.' for thousands and ',' for decimals
    let normalized = if cleaned.contains(',') {
        cleaned.replace('.', "").replace(',', ".")
    } else {
        cleaned
    };
    normalized.parse::<f64>().ok().filter(|f| f.is_finite())
}
