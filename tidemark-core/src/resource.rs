//! Resource - A resource's stored state alongside its declared configuration

use std::fmt;

use serde_json::Value;

use crate::accessor::{self, AccessError};
use crate::path::AttrPath;
use crate::value::{ConfigMap, ConfigValue};

/// Unique identifier for a resource
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceId {
    /// Resource type (e.g., "nat_gateway", "fgs_function")
    pub resource_type: String,
    /// Resource name (identifier in the manifest)
    pub name: String,
}

impl ResourceId {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.resource_type, self.name)
    }
}

/// View over one resource during change detection and after apply.
///
/// `state` holds what was stored by the previous cycle: values observed from
/// the remote side plus the `_origin` companions written by the origin
/// tracker. `config` is the raw declared configuration, where an unset
/// attribute is absent rather than defaulted.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceData {
    pub id: ResourceId,
    state: ConfigValue,
    config: ConfigValue,
}

impl ResourceData {
    pub fn new(id: ResourceId) -> Self {
        Self {
            id,
            state: Value::Object(ConfigMap::new()),
            config: Value::Object(ConfigMap::new()),
        }
    }

    pub fn with_state(mut self, state: ConfigValue) -> Self {
        self.state = state;
        self
    }

    pub fn with_config(mut self, config: ConfigValue) -> Self {
        self.config = config;
        self
    }

    pub fn state(&self) -> &ConfigValue {
        &self.state
    }

    pub fn config(&self) -> &ConfigValue {
        &self.config
    }

    /// Whether anything was stored for this resource
    pub fn has_state(&self) -> bool {
        match &self.state {
            Value::Object(map) => !map.is_empty(),
            Value::Null => false,
            _ => true,
        }
    }

    /// Stored value at `path`, null when absent
    pub fn get(&self, path: &str) -> &ConfigValue {
        accessor::get_or_null(&self.state, &AttrPath::parse(path))
    }

    /// Declared value at `path`, null when absent
    pub fn get_raw_config(&self, path: &str) -> &ConfigValue {
        accessor::get_or_null(&self.config, &AttrPath::parse(path))
    }

    /// `(stored, declared)` values at `path`
    pub fn get_change(&self, path: &str) -> (&ConfigValue, &ConfigValue) {
        (self.get(path), self.get_raw_config(path))
    }

    /// Last locally applied value of the attribute at `path`
    pub fn get_origin(&self, path: &str) -> &ConfigValue {
        accessor::get_or_null(&self.state, &AttrPath::parse(path).origin())
    }

    /// Write a value into the stored state.
    ///
    /// A single-segment path sets the top-level attribute whether or not it
    /// existed. Deeper paths copy the top-level attribute, overwrite the
    /// target inside the copy with the strict accessor, then store the copy
    /// back, so nothing outside that attribute is touched.
    pub fn set(&mut self, path: &AttrPath, value: ConfigValue) -> Result<(), AccessError> {
        let Some((root_key, rest)) = path.segments().split_first() else {
            self.state = value;
            return Ok(());
        };

        let mut root = match std::mem::take(&mut self.state) {
            Value::Object(map) => map,
            _ => ConfigMap::new(),
        };
        let result = set_in_root(&mut root, root_key, rest, value, path);
        self.state = Value::Object(root);
        result
    }
}

fn set_in_root(
    root: &mut ConfigMap,
    root_key: &str,
    rest: &[String],
    value: ConfigValue,
    path: &AttrPath,
) -> Result<(), AccessError> {
    if rest.is_empty() {
        root.insert(root_key.to_string(), value);
        return Ok(());
    }

    let current = root
        .get(root_key)
        .ok_or_else(|| AccessError::PathNotFound {
            path: path.to_string(),
            segment: root_key.to_string(),
        })?;
    let updated = accessor::set(current, &AttrPath::from_segments(rest.to_vec()), value)
        .map_err(|e| rebase_error(e, path))?;
    root.insert(root_key.to_string(), updated);
    Ok(())
}

/// Report nested write failures against the full path, not the remainder
fn rebase_error(error: AccessError, full: &AttrPath) -> AccessError {
    let path = full.to_string();
    match error {
        AccessError::PathNotFound { segment, .. } => AccessError::PathNotFound { path, segment },
        AccessError::EmptyList { .. } => AccessError::EmptyList { path },
        AccessError::IndexOutOfRange { index, len, .. } => {
            AccessError::IndexOutOfRange { path, index, len }
        }
        AccessError::UnsupportedNodeType { segment, found, .. } => {
            AccessError::UnsupportedNodeType {
                path,
                segment,
                found,
            }
        }
    }
}
