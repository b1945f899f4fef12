//! Response extraction
//!
//! Paths are either simple dot paths with optional array indexing
//! (`meta.count`, `data[0].items`, `items[-1]`) or JSONPath expressions with
//! wildcards (`$.results[*].work`).

use crate::error::{Error, Result};
use crate::types::Record;
use serde_json::Value;

/// Extract the value at `path`
pub fn extract_path(value: &Value, path: &str) -> Option<Value> {
    if is_jsonpath(path) {
        return extract_with_jsonpath(value, path)
            .ok()
            .filter(|items| !items.is_empty())
            .map(Value::Array);
    }
    extract_simple_path(value, path)
}

/// Extract the record list at `path` (the whole body when `path` is `None`)
///
/// Every record must be a JSON object.
pub fn extract_records(value: &Value, path: Option<&str>) -> Result<Vec<Record>> {
    let items = match path {
        Some(path) if is_jsonpath(path) => extract_with_jsonpath(value, path)?,
        Some(path) => match extract_simple_path(value, path) {
            Some(Value::Array(items)) => items,
            Some(Value::Null) | None => Vec::new(),
            Some(single) => vec![single],
        },
        None => match value {
            Value::Array(items) => items.clone(),
            other => vec![other.clone()],
        },
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(record) => Ok(record),
            other => Err(Error::decode(format!(
                "record {index} is not an object: {}",
                type_name(&other)
            ))),
        })
        .collect()
}

/// Extract a count, accepting numbers and numeric strings
pub fn extract_count(value: &Value, path: &str) -> Option<u64> {
    match extract_path(value, path)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Extract a non-empty string
pub fn extract_string(value: &Value, path: &str) -> Option<String> {
    match extract_path(value, path)? {
        Value::String(s) if !s.is_empty() => Some(s),
        _ => None,
    }
}

fn is_jsonpath(path: &str) -> bool {
    path.contains('*') && !path.contains("[-")
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Simple dot-notation path, with `[i]`, `[-i]` and `[*]` segments
fn extract_simple_path(value: &Value, path: &str) -> Option<Value> {
    let path = path.strip_prefix("$.").unwrap_or(path);

    let mut current = value;
    for part in path.split('.') {
        if let Some(bracket_pos) = part.find('[') {
            let name = &part[..bracket_pos];
            let index_str = part[bracket_pos + 1..].strip_suffix(']')?;

            if !name.is_empty() {
                current = current.get(name)?;
            }

            if index_str == "*" {
                return Some(current.clone());
            }

            let index = index_str.parse::<i64>().ok()?;
            let Value::Array(arr) = current else {
                return None;
            };
            #[allow(clippy::cast_possible_wrap)]
            let idx = if index < 0 {
                usize::try_from(arr.len() as i64 + index).ok()?
            } else {
                usize::try_from(index).ok()?
            };
            current = arr.get(idx)?;
        } else {
            current = current.get(part)?;
        }
    }

    Some(current.clone())
}

/// JSONPath extraction for wildcard paths
fn extract_with_jsonpath(value: &Value, path: &str) -> Result<Vec<Value>> {
    use jsonpath_rust::JsonPath;

    let jp = JsonPath::try_from(path)
        .map_err(|e| Error::json_path(format!("Invalid JSONPath: {e}")))?;

    match jp.find(value) {
        Value::Array(arr) => Ok(arr),
        Value::Null => Ok(vec![]),
        other => Ok(vec![other]),
    }
}
