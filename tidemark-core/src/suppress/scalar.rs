//! Scalar hooks for string-valued attributes

use std::sync::LazyLock;

use chrono::DateTime;
use log::debug;
use regex::Regex;
use serde_json::Value;

use super::SuppressFn;
use crate::resource::ResourceData;
use crate::value::{ConfigValue, to_flat_string};

/// Suppress when old and new differ only in letter case
pub fn suppress_case_diffs() -> SuppressFn {
    super::from_fn(|_, old, new, _| {
        to_flat_string(old).to_lowercase() == to_flat_string(new).to_lowercase()
    })
}

/// A declared size of `0` means "use the computed minimum"
pub fn suppress_min_disk(_: &str, old: &ConfigValue, new: &ConfigValue, _: &ResourceData) -> bool {
    let new = to_flat_string(new);
    new == "0" || to_flat_string(old) == new
}

pub fn suppress_trim_space(_: &str, old: &ConfigValue, new: &ConfigValue, _: &ResourceData) -> bool {
    to_flat_string(old).trim() == to_flat_string(new).trim()
}

/// Suppress when the values differ only by leading or trailing newlines
pub fn suppress_new_line_diffs(
    _: &str,
    old: &ConfigValue,
    new: &ConfigValue,
    _: &ResourceData,
) -> bool {
    to_flat_string(old).trim_matches('\n') == to_flat_string(new).trim_matches('\n')
}

/// Suppress when two comma-separated strings hold the same items in a
/// different order (e.g. IP whitelists)
pub fn suppress_comma_separated_diffs(
    _: &str,
    old: &ConfigValue,
    new: &ConfigValue,
    _: &ResourceData,
) -> bool {
    let old = to_flat_string(old);
    let new = to_flat_string(new);
    if old.len() != new.len() {
        return false;
    }

    let mut old_items: Vec<&str> = old.split(',').collect();
    let mut new_items: Vec<&str> = new.split(',').collect();
    old_items.sort_unstable();
    new_items.sort_unstable();
    old_items == new_items
}

/// Suppress when both values are RFC 3339 timestamps of the same instant
pub fn suppress_equivalent_time_diffs(
    _: &str,
    old: &ConfigValue,
    new: &ConfigValue,
    _: &ResourceData,
) -> bool {
    let (Ok(old_time), Ok(new_time)) = (
        DateTime::parse_from_rfc3339(&to_flat_string(old)),
        DateTime::parse_from_rfc3339(&to_flat_string(new)),
    ) else {
        return false;
    };
    old_time == new_time
}

static VERSION_SEPARATOR: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"[\.\-]+").ok());

/// Suppress when the declared version is a prefix of the observed one,
/// e.g. `5.7` against `5.7.31`.
pub fn suppress_version_diffs(
    _: &str,
    old: &ConfigValue,
    new: &ConfigValue,
    _: &ResourceData,
) -> bool {
    let Some(separator) = VERSION_SEPARATOR.as_ref() else {
        return false;
    };
    let old = to_flat_string(old);
    let new = to_flat_string(new);
    let old_parts: Vec<&str> = separator.split(&old).collect();
    let new_parts: Vec<&str> = separator.split(&new).collect();

    new_parts.len() <= old_parts.len() && new_parts.iter().zip(&old_parts).all(|(n, o)| n == o)
}

/// Compare two JSON documents ignoring formatting and key order
pub fn compare_json_template_are_equivalent(a: &str, b: &str) -> Result<bool, serde_json::Error> {
    let first: Value = serde_json::from_str(a)?;
    let second: Value = serde_json::from_str(b)?;

    let equal = first == second;
    if !equal {
        debug!(
            "canonical templates are not equal.\nFirst: {}\nSecond: {}",
            first, second
        );
    }
    Ok(equal)
}

/// JSON equivalence over either JSON-encoded strings or structured values.
/// Unparsable strings are never equivalent.
pub fn suppress_equivalent_json(old: &ConfigValue, new: &ConfigValue) -> bool {
    match (old, new) {
        (Value::String(a), Value::String(b)) => {
            compare_json_template_are_equivalent(a, b).unwrap_or(false)
        }
        (Value::String(_), _) | (_, Value::String(_)) => false,
        _ => old == new,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceId;
    use serde_json::json;

    fn data() -> ResourceData {
        ResourceData::new(ResourceId::new("rds_instance", "db"))
    }

    #[test]
    fn case_diffs() {
        let hook = suppress_case_diffs();
        assert!(hook("mode", &json!("ReadWrite"), &json!("readwrite"), &data()));
        assert!(!hook("mode", &json!("ReadWrite"), &json!("readonly"), &data()));
    }

    #[test]
    fn min_disk() {
        assert!(suppress_min_disk("min_disk", &json!("40"), &json!("0"), &data()));
        assert!(suppress_min_disk("min_disk", &json!(40), &json!(40), &data()));
        assert!(!suppress_min_disk("min_disk", &json!("40"), &json!("50"), &data()));
    }

    #[test]
    fn trim_space_and_new_lines() {
        assert!(suppress_trim_space("d", &json!("  text "), &json!("text"), &data()));
        assert!(!suppress_trim_space("d", &json!("te xt"), &json!("text"), &data()));
        assert!(suppress_new_line_diffs("d", &json!("script\n"), &json!("script"), &data()));
        assert!(!suppress_new_line_diffs("d", &json!("script "), &json!("script"), &data()));
    }

    #[test]
    fn comma_separated_order_is_ignored() {
        let d = data();
        assert!(suppress_comma_separated_diffs(
            "whitelist",
            &json!("10.0.0.1,10.0.0.2"),
            &json!("10.0.0.2,10.0.0.1"),
            &d
        ));
        assert!(!suppress_comma_separated_diffs(
            "whitelist",
            &json!("10.0.0.1,10.0.0.2"),
            &json!("10.0.0.1,10.0.0.3"),
            &d
        ));
        assert!(!suppress_comma_separated_diffs("whitelist", &json!("a,b"), &json!("a,b,c"), &d));
    }

    #[test]
    fn equivalent_times() {
        let d = data();
        assert!(suppress_equivalent_time_diffs(
            "start",
            &json!("2024-01-01T08:00:00+08:00"),
            &json!("2024-01-01T00:00:00Z"),
            &d
        ));
        assert!(!suppress_equivalent_time_diffs(
            "start",
            &json!("2024-01-01T00:00:00Z"),
            &json!("2024-01-01T00:00:01Z"),
            &d
        ));
        assert!(!suppress_equivalent_time_diffs("start", &json!("yesterday"), &json!("yesterday"), &d));
    }

    #[test]
    fn version_prefix() {
        let d = data();
        assert!(suppress_version_diffs("v", &json!("5.7.31"), &json!("5.7"), &d));
        assert!(suppress_version_diffs("v", &json!("8.0-beta"), &json!("8.0"), &d));
        assert!(!suppress_version_diffs("v", &json!("5.7"), &json!("5.7.31"), &d));
        assert!(!suppress_version_diffs("v", &json!("5.7.31"), &json!("5.6"), &d));
    }

    #[test]
    fn version_separator_compiles_once() {
        assert!(VERSION_SEPARATOR.is_some());
        let d = data();
        for _ in 0..3 {
            assert!(suppress_version_diffs("v", &json!("1-2.3"), &json!("1.2"), &d));
        }
    }

    #[test]
    fn json_templates() {
        assert!(compare_json_template_are_equivalent("{\"a\": [1, 2], \"b\": {}}", "{\"b\":{},\"a\":[1,2]}").unwrap());
        assert!(!compare_json_template_are_equivalent("[1, 2]", "[2, 1]").unwrap());
        assert!(compare_json_template_are_equivalent("{", "{}").is_err());
    }

    #[test]
    fn equivalent_json_values() {
        assert!(suppress_equivalent_json(&json!("{\"a\": 1}"), &json!("{\"a\":1}")));
        assert!(suppress_equivalent_json(&json!({"a": 1}), &json!({"a": 1})));
        assert!(!suppress_equivalent_json(&json!("{"), &json!("{")));
        assert!(!suppress_equivalent_json(&json!("{\"a\": 1}"), &json!({"a": 1})));
    }
}
