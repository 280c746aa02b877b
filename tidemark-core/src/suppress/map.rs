//! Map mode: flat key/value attributes such as tags
//!
//! Changes arrive one key at a time (`tags.env`), plus a size marker
//! (`tags.%`) and, when a whole map appears or disappears, the map itself.
//! A key is surfaced when the declaration holds it, or when the declaration
//! dropped a key that origin recorded. Keys only the remote side knows about
//! are suppressed.

use log::debug;

use super::SuppressFn;
use crate::path::AttrPath;
use crate::resource::ResourceData;
use crate::value::{ConfigValue, as_object_or_empty};

/// Hook for map-shaped attributes.
///
/// Without knowing where the map lives, only a single-segment key is taken as
/// the whole map. Use [`suppress_map_diffs_at`] for maps below the top level.
pub fn suppress_map_diffs() -> SuppressFn {
    super::from_fn(|key, old, new, d| {
        let path = AttrPath::parse(key);
        let whole_map = path.len() < 2;
        suppress_map_change(&path, whole_map, old, new, d)
    })
}

/// Hook for the map stored at `map_path`
pub fn suppress_map_diffs_at(map_path: impl Into<AttrPath>) -> SuppressFn {
    let map_path = map_path.into();
    super::from_fn(move |key, old, new, d| {
        let path = AttrPath::parse(key);
        let whole_map = path == map_path;
        suppress_map_change(&path, whole_map, old, new, d)
    })
}

fn suppress_map_change(
    path: &AttrPath,
    whole_map: bool,
    old: &ConfigValue,
    new: &ConfigValue,
    d: &ResourceData,
) -> bool {
    debug!("map change '{}': old={}, new={}", path, old, new);

    // Size changes follow from the per-key decisions
    if path.is_count_marker() {
        debug!("ignoring size change for '{}'", path);
        return true;
    }

    if whole_map {
        return suppress_entire_map_diff(&path.to_string(), d);
    }

    suppress_single_key_diff(path, d)
}

fn suppress_entire_map_diff(key: &str, d: &ResourceData) -> bool {
    let origin = d.get_origin(key);
    if origin.is_null() {
        debug!("origin of map '{}' is unset, suppressing the whole-map change", key);
        return true;
    }
    if as_object_or_empty(origin).is_empty() {
        debug!("origin of map '{}' is empty, suppressing the whole-map change", key);
        return true;
    }

    // Leave the decision to the per-key changes
    debug!("whole-map change for '{}' reported, origin is set", key);
    false
}

fn suppress_single_key_diff(path: &AttrPath, d: &ResourceData) -> bool {
    let map_path = path.parent().to_string();
    let Some(key_name) = path.last() else {
        return false;
    };

    let origin_value = d.get_origin(&map_path);
    let origin = as_object_or_empty(origin_value);

    let current_value = d.get_raw_config(&map_path);
    if current_value.is_null() {
        debug!(
            "map '{}' is not declared, suppressing change for key '{}'",
            map_path, key_name
        );
        return true;
    }
    let current = as_object_or_empty(current_value);

    let exists_in_current = current.contains_key(key_name);
    let exists_in_origin = origin.contains_key(key_name);
    let origin_empty = origin_value.is_null() || origin.is_empty();

    let suppress = determine_suppression(exists_in_current, exists_in_origin, origin_empty);
    debug!(
        "key '{}' of map '{}': in config={}, in origin={}, origin empty={} -> suppress={}",
        key_name, map_path, exists_in_current, exists_in_origin, origin_empty, suppress
    );
    suppress
}

/// Decision table for a single map key.
///
/// | in config | in origin | origin empty | suppress |
/// |-----------|-----------|--------------|----------|
/// | yes       | any       | any          | no       |
/// | no        | any       | yes          | yes      |
/// | no        | yes       | no           | no       |
/// | no        | no        | no           | yes      |
pub fn determine_suppression(
    exists_in_current: bool,
    exists_in_origin: bool,
    origin_empty: bool,
) -> bool {
    if exists_in_current {
        // Locally added, or present on both sides with a value to propagate
        return false;
    }
    if origin_empty {
        // Nothing was ever applied locally: the key came from the remote side
        return true;
    }
    // Removed locally when origin had it, remote-only otherwise
    !exists_in_origin
}
