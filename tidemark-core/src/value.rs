//! Value - The universal representation of declared and observed data

use serde_json::{Map, Value};

/// Declared configuration and remote API responses share one shape:
/// scalars, ordered lists, and string-keyed maps.
pub type ConfigValue = Value;

/// String-keyed map node
pub type ConfigMap = Map<String, Value>;

/// Read a value as a map. Maps are returned as-is and strings holding a JSON
/// object are parsed; everything else is vacuously empty.
pub fn as_object_or_empty(value: &ConfigValue) -> ConfigMap {
    match value {
        Value::Object(map) => map.clone(),
        Value::String(s) if !s.trim().is_empty() => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(map)) => map,
            _ => ConfigMap::new(),
        },
        _ => ConfigMap::new(),
    }
}

/// Read a value as a list of non-empty strings. A comma-separated string is
/// split; non-string elements are dropped.
pub fn as_string_list(value: &ConfigValue) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| item.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Value::String(s) => parse_list_with_separator(s, ","),
        _ => Vec::new(),
    }
}

/// Split `text` on `separator`, trimming whitespace and dropping empty parts
pub fn parse_list_with_separator(text: &str, separator: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    text.split(separator)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// String form of a value as seen by scalar diff hooks
pub fn to_flat_string(value: &ConfigValue) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn kind_name(value: &ConfigValue) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn object_or_empty_accepts_maps_and_json_strings() {
        let map = as_object_or_empty(&json!({"a": 1}));
        assert_eq!(map.get("a"), Some(&json!(1)));

        let parsed = as_object_or_empty(&json!("{\"b\": {\"c\": true}}"));
        assert_eq!(parsed.get("b"), Some(&json!({"c": true})));
    }

    #[test]
    fn object_or_empty_degrades_to_empty() {
        assert!(as_object_or_empty(&Value::Null).is_empty());
        assert!(as_object_or_empty(&json!("not json")).is_empty());
        assert!(as_object_or_empty(&json!("[1, 2]")).is_empty());
        assert!(as_object_or_empty(&json!(3)).is_empty());
    }

    #[test]
    fn string_list_from_array_and_csv() {
        assert_eq!(as_string_list(&json!(["a", "", "b", 3])), vec!["a", "b"]);
        assert_eq!(as_string_list(&json!("a, b,,c")), vec!["a", "b", "c"]);
        assert!(as_string_list(&Value::Null).is_empty());
    }

    #[test]
    fn separator_parsing() {
        assert_eq!(parse_list_with_separator("x; y ;z", ";"), vec!["x", "y", "z"]);
        assert!(parse_list_with_separator("", "|").is_empty());
    }

    #[test]
    fn flat_strings() {
        assert_eq!(to_flat_string(&Value::Null), "");
        assert_eq!(to_flat_string(&json!("abc")), "abc");
        assert_eq!(to_flat_string(&json!(10)), "10");
        assert_eq!(to_flat_string(&json!(true)), "true");
    }
}
