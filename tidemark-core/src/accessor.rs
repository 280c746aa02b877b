//! Accessor - Read and write values at a path inside a nested tree
//!
//! Lists met during traversal follow the single-element-list convention: a
//! numeric segment selects that index, any other segment descends into the
//! first element and is resolved again there.
//!
//! Reads are lenient. Out-of-range indices, empty lists and paths continuing
//! past a scalar resolve to a value (null or the scalar) rather than an error;
//! only a map without the requested key is reported. Writes are strict and
//! only ever overwrite structure that already exists.

use serde_json::Value;
use thiserror::Error;

use crate::path::AttrPath;
use crate::value::{ConfigValue, kind_name};

static NULL: ConfigValue = Value::Null;

/// Errors raised while traversing a ConfigValue tree
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AccessError {
    /// A map node has no entry for the segment
    #[error("the parameter key '{segment}' not found (path: {path})")]
    PathNotFound { path: String, segment: String },

    /// A write had to descend through a list with no elements
    #[error("cannot update empty list (path: {path})")]
    EmptyList { path: String },

    /// A write addressed a list index past the end
    #[error("index {index} out of range for list of length {len} (path: {path})")]
    IndexOutOfRange {
        path: String,
        index: usize,
        len: usize,
    },

    /// A write had to descend through a node that is neither map nor list
    #[error("unsupported type at '{segment}': {found} (path: {path})")]
    UnsupportedNodeType {
        path: String,
        segment: String,
        found: &'static str,
    },
}

/// Resolve `path` against `tree`.
///
/// The empty path returns the root. A scalar reached with segments left is
/// returned unchanged.
pub fn get<'a>(tree: &'a ConfigValue, path: &AttrPath) -> Result<&'a ConfigValue, AccessError> {
    let segments = path.segments();
    let mut current = tree;
    let mut i = 0;

    while let Some(segment) = segments.get(i) {
        match current {
            Value::Array(items) => match segment.parse::<usize>() {
                Ok(index) => match items.get(index) {
                    Some(item) => {
                        current = item;
                        i += 1;
                    }
                    None => return Ok(&NULL),
                },
                // Resolve the same segment against the first element
                Err(_) => match items.first() {
                    Some(first) => current = first,
                    None => return Ok(&NULL),
                },
            },
            Value::Object(map) => match map.get(segment) {
                Some(value) => {
                    current = value;
                    i += 1;
                }
                None => {
                    return Err(AccessError::PathNotFound {
                        path: path.to_string(),
                        segment: segment.clone(),
                    });
                }
            },
            _ => return Ok(current),
        }
    }

    Ok(current)
}

/// Like [`get`], with a missing key read as null
pub fn get_or_null<'a>(tree: &'a ConfigValue, path: &AttrPath) -> &'a ConfigValue {
    get(tree, path).unwrap_or(&NULL)
}

/// Spell out the list indices [`get`] picks implicitly.
///
/// `metadata.labels` against `{"metadata": [{"labels": {}}]}` becomes
/// `metadata.0.labels`. Once the tree runs out, the remaining segments are
/// kept as given.
pub fn resolve_path(tree: &ConfigValue, path: &AttrPath) -> AttrPath {
    let mut resolved = Vec::with_capacity(path.len());
    let mut current = Some(tree);

    for segment in path.segments() {
        let is_index = segment.parse::<usize>().is_ok();
        while let Some(Value::Array(items)) = current {
            if is_index {
                break;
            }
            let Some(first) = items.first() else {
                break;
            };
            resolved.push("0".to_string());
            current = Some(first);
        }

        current = match current {
            Some(Value::Array(items)) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            Some(Value::Object(map)) => map.get(segment),
            _ => None,
        };
        resolved.push(segment.clone());
    }

    AttrPath::from_segments(resolved)
}

/// Return a copy of `tree` with the value at `path` replaced by `value`.
///
/// The input is never modified: the whole tree is copied before the target
/// is overwritten, so callers holding other views of the same data are not
/// affected.
pub fn set(
    tree: &ConfigValue,
    path: &AttrPath,
    value: ConfigValue,
) -> Result<ConfigValue, AccessError> {
    let mut updated = tree.clone();
    set_in_place(&mut updated, path, value)?;
    Ok(updated)
}

/// Overwrite the value at `path` inside a tree the caller owns.
///
/// On error the tree may have been left untouched or partially descended, but
/// never partially written: the only mutation is the final assignment.
pub fn set_in_place(
    tree: &mut ConfigValue,
    path: &AttrPath,
    value: ConfigValue,
) -> Result<(), AccessError> {
    set_at(tree, path.segments(), value, path)
}

fn set_at(
    node: &mut ConfigValue,
    segments: &[String],
    value: ConfigValue,
    path: &AttrPath,
) -> Result<(), AccessError> {
    let Some((segment, rest)) = segments.split_first() else {
        *node = value;
        return Ok(());
    };

    match node {
        Value::Array(items) => {
            if items.is_empty() {
                return Err(AccessError::EmptyList {
                    path: path.to_string(),
                });
            }
            match segment.parse::<usize>() {
                Ok(index) => {
                    let len = items.len();
                    let item = items
                        .get_mut(index)
                        .ok_or_else(|| AccessError::IndexOutOfRange {
                            path: path.to_string(),
                            index,
                            len,
                        })?;
                    set_at(item, rest, value, path)
                }
                Err(_) => set_at(&mut items[0], segments, value, path),
            }
        }
        Value::Object(map) => {
            let child = map
                .get_mut(segment)
                .ok_or_else(|| AccessError::PathNotFound {
                    path: path.to_string(),
                    segment: segment.clone(),
                })?;
            set_at(child, rest, value, path)
        }
        other => Err(AccessError::UnsupportedNodeType {
            path: path.to_string(),
            segment: segment.clone(),
            found: kind_name(other),
        }),
    }
}
