//! List mode: lists and sets of strings
//!
//! Elements the remote side appended are ignored; elements added to the
//! declaration, or dropped from it relative to origin, surface.
//!
//! ```text
//! origin:  ["a", "b", "c"]
//! console: ["a", "b", "c", "d"]      ("d" added remotely)
//!
//! ["a", "b", "c", "e"]   surface   ("e" is not on the console)
//! ["a", "b"]             surface   ("c" was applied before)
//! ["a", "b", "c"]        suppress
//! ```

use log::debug;
use serde_json::Value;

use super::SuppressFn;
use crate::objects::find_str_slice_elements_not_in_another;
use crate::path::AttrPath;
use crate::resource::ResourceData;
use crate::value::{ConfigValue, as_string_list, to_flat_string};

/// Hook for list-of-string attributes. Handles the length marker
/// (`zones.#`), single elements (`zones.0`, or a set hash) and the whole list.
pub fn suppress_str_slice_diffs() -> SuppressFn {
    super::from_fn(|key, old, new, d| {
        debug!("slice change '{}': old={}, new={}", key, old, new);

        let path = AttrPath::parse(key);
        if path.is_length_marker() {
            return diff_length(&path, old, new, d);
        }
        if path.is_count_marker() {
            debug!("the change '{}' is not of type slice", key);
            return false;
        }
        if is_element_key(&path) {
            return diff_element(&path, old, new, d);
        }

        let suppress = diff_whole_list(key, old, new, d);
        debug!("slice change '{}' suppressed: {}", key, suppress);
        suppress
    })
}

fn is_element_key(path: &AttrPath) -> bool {
    path.len() >= 2 && path.last().is_some_and(|s| s.parse::<u64>().is_ok())
}

fn count_of(value: &ConfigValue) -> usize {
    match value {
        Value::Number(n) => n.as_u64().unwrap_or(0) as usize,
        Value::String(s) => s.parse().unwrap_or(0),
        Value::Array(items) => items.len(),
        _ => 0,
    }
}

fn diff_length(path: &AttrPath, old: &ConfigValue, new: &ConfigValue, d: &ResourceData) -> bool {
    let base = path.parent().to_string();
    let origin = d.get_origin(&base);
    let old_count = count_of(old);
    let new_count = count_of(new);

    // First time the list is set
    if origin.is_null() {
        return false;
    }

    let origin_count = origin.as_array().map_or(0, Vec::len);
    if origin_count == 0 {
        // A shorter declaration than what is stored may be a remote removal
        let current_count = d.get(&base).as_array().map_or(0, Vec::len);
        return new_count < current_count;
    }

    let local_additions = new_count > old_count;
    let local_removals = new_count < origin_count;
    if local_additions || local_removals {
        debug!(
            "length of '{}': local additions={}, local removals={}",
            base, local_additions, local_removals
        );
        return false;
    }
    true
}

fn diff_element(path: &AttrPath, old: &ConfigValue, new: &ConfigValue, d: &ResourceData) -> bool {
    let base = path.parent().to_string();
    let origin = d.get_origin(&base);
    let old_val = to_flat_string(old);
    let new_val = to_flat_string(new);

    if new_val.is_empty() {
        return handle_element_removal(&old_val, origin, &base, d);
    }
    handle_element_addition(&old_val, &new_val, origin, &base, d)
}

fn handle_element_removal(old_val: &str, origin: &ConfigValue, base: &str, d: &ResourceData) -> bool {
    if is_element_in_origin(old_val, origin) {
        debug!("element '{}' was applied before, allowing its removal", old_val);
        return false;
    }
    if element_in_remote_state(base, old_val, d) {
        debug!("element '{}' exists only remotely, ignoring its removal", old_val);
    }
    true
}

fn handle_element_addition(
    old_val: &str,
    new_val: &str,
    origin: &ConfigValue,
    base: &str,
    d: &ResourceData,
) -> bool {
    if is_origin_empty(origin) {
        // On create there is nothing stored to compare with
        if old_val.is_empty() {
            return false;
        }
        return element_in_remote_state(base, new_val, d);
    }

    if is_element_in_origin(new_val, origin) {
        // An unchanged element must stay in the plan so the value is kept
        return old_val != new_val;
    }

    debug!("element '{}' is a local addition", new_val);
    false
}

fn is_origin_empty(origin: &ConfigValue) -> bool {
    origin.as_array().is_none_or(Vec::is_empty)
}

fn is_element_in_origin(element: &str, origin: &ConfigValue) -> bool {
    origin
        .as_array()
        .is_some_and(|items| items.iter().any(|item| item.as_str() == Some(element)))
}

fn element_in_remote_state(base: &str, element: &str, d: &ResourceData) -> bool {
    d.get(base)
        .as_array()
        .is_some_and(|items| items.iter().any(|item| item.as_str() == Some(element)))
}

fn diff_whole_list(key: &str, old: &ConfigValue, new: &ConfigValue, d: &ResourceData) -> bool {
    let origin = as_string_list(d.get_origin(key));
    if origin.is_empty() {
        debug!("origin of '{}' is empty, allowing the change", key);
        return false;
    }

    let console = as_string_list(old);
    let script = as_string_list(new);

    let local_additions = find_str_slice_elements_not_in_another(&script, &console);
    if !local_additions.is_empty() {
        debug!("'{}' adds elements not on the console: {:?}", key, local_additions);
        return false;
    }

    let local_removals = find_str_slice_elements_not_in_another(&origin, &script);
    if !local_removals.is_empty() {
        debug!("'{}' removes applied elements: {:?}", key, local_removals);
        return false;
    }

    true
}
