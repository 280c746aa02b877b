//! Objects - Recursive set algebra over string-keyed maps
//!
//! All functions are total: a missing map is passed as an empty one by the
//! callers, and no combination of inputs is an error.

use serde_json::Value;

use crate::value::ConfigMap;

/// Whether `a` contains every key of `b` with an equal value.
///
/// Nested maps on both sides are compared recursively, so `a` may carry extra
/// keys at any depth. Any other pair of values must be deeply equal.
pub fn contains_all_key_values(a: &ConfigMap, b: &ConfigMap) -> bool {
    b.iter().all(|(key, b_val)| match a.get(key) {
        None => false,
        Some(a_val) => match (a_val, b_val) {
            (Value::Object(a_map), Value::Object(b_map)) => contains_all_key_values(a_map, b_map),
            _ => a_val == b_val,
        },
    })
}

/// Keys of `a` that `b` is missing, at any depth.
///
/// Keys present on both sides with map values are recursed into and kept
/// only when something below them was removed. Additions in `b` and changed
/// scalar values are ignored.
pub fn find_decrease_keys(a: &ConfigMap, b: &ConfigMap) -> ConfigMap {
    let mut result = ConfigMap::new();
    for (key, a_val) in a {
        match b.get(key) {
            None => {
                result.insert(key.clone(), a_val.clone());
            }
            Some(b_val) => {
                if let (Value::Object(a_map), Value::Object(b_map)) = (a_val, b_val) {
                    let sub = find_decrease_keys(a_map, b_map);
                    if !sub.is_empty() {
                        result.insert(key.clone(), Value::Object(sub));
                    }
                }
            }
        }
    }
    result
}

/// The complement `a \ b`, including nested differences.
///
/// Keys of `a` missing from `b` and keys whose values differ are copied from
/// `a`; nested maps on both sides contribute only their own difference.
pub fn take_objects_different(a: &ConfigMap, b: &ConfigMap) -> ConfigMap {
    let mut result = ConfigMap::new();
    for (key, a_val) in a {
        let Some(b_val) = b.get(key) else {
            result.insert(key.clone(), a_val.clone());
            continue;
        };

        match (a_val, b_val) {
            (Value::Object(a_map), Value::Object(b_map)) => {
                let sub = take_objects_different(a_map, b_map);
                if !sub.is_empty() {
                    result.insert(key.clone(), Value::Object(sub));
                }
            }
            _ if a_val != b_val => {
                result.insert(key.clone(), a_val.clone());
            }
            _ => {}
        }
    }
    result
}

/// Elements of `a` that do not appear in `b`, in the order of `a`
pub fn find_str_slice_elements_not_in_another(a: &[String], b: &[String]) -> Vec<String> {
    a.iter().filter(|item| !b.contains(item)).cloned().collect()
}
