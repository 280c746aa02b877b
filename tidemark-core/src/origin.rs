//! Origin - Snapshot the locally applied value of tracked attributes
//!
//! After a successful create or update, the declared value of every tracked
//! attribute is copied into its `<field>_origin` companion in the stored
//! state. The next change detection compares against this snapshot to tell
//! local removals apart from keys the remote side added on its own.

use std::fmt;

use log::{debug, warn};
use serde_json::Value;
use thiserror::Error;

use crate::accessor::{self, AccessError};
use crate::path::AttrPath;
use crate::resource::ResourceData;
use crate::value::ConfigValue;

/// A tracked path whose origin could not be written
#[derive(Debug, Clone, PartialEq)]
pub struct OriginFailure {
    pub origin_path: String,
    pub error: AccessError,
}

impl fmt::Display for OriginFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to set origin value for '{}': {}",
            self.origin_path, self.error
        )
    }
}

/// Errors from refreshing origin values
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OriginError {
    /// One or more tracked paths failed; the others were still written
    #[error("{}", .0.iter().map(|f| f.to_string()).collect::<Vec<_>>().join("; "))]
    Aggregate(Vec<OriginFailure>),
}

impl OriginError {
    pub fn failures(&self) -> &[OriginFailure] {
        match self {
            OriginError::Aggregate(failures) => failures,
        }
    }
}

/// Copy the declared value of each tracked path into its origin companion.
///
/// Paths not set in the declared configuration are skipped. A failed write
/// does not stop the remaining paths; all failures are returned together.
pub fn refresh_origin_values(d: &mut ResourceData, tracked: &[AttrPath]) -> Result<(), OriginError> {
    refresh_with(d, tracked, |value| value)
}

/// Same as [`refresh_origin_values`] for list-shaped attributes: the copied
/// value is normalised to a list before it is written.
pub fn refresh_slice_origin_values(
    d: &mut ResourceData,
    tracked: &[AttrPath],
) -> Result<(), OriginError> {
    refresh_with(d, tracked, into_list)
}

fn refresh_with(
    d: &mut ResourceData,
    tracked: &[AttrPath],
    normalise: impl Fn(ConfigValue) -> ConfigValue,
) -> Result<(), OriginError> {
    debug!(
        "refreshing origin values for {} tracked paths on {}",
        tracked.len(),
        d.id
    );

    let mut failures = Vec::new();
    for path in tracked {
        let origin_path = path.origin();

        let declared = match accessor::get(d.config(), path) {
            Ok(Value::Null) | Err(_) => {
                debug!("parameter '{}' is not configured, skipping its origin", path);
                continue;
            }
            Ok(value) => value.clone(),
        };

        match d.set(&origin_path, normalise(declared)) {
            Ok(()) => debug!("set origin value for '{}'", origin_path),
            Err(error) => {
                warn!("failed to set origin value for '{}': {}", origin_path, error);
                failures.push(OriginFailure {
                    origin_path: origin_path.to_string(),
                    error,
                });
            }
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(OriginError::Aggregate(failures))
    }
}

/// Create missing origin companions as null so later writes have a slot to
/// overwrite. Companions are only added under parents that already exist.
pub fn declare_origin_slots(d: &mut ResourceData, tracked: &[AttrPath]) {
    for path in tracked {
        let origin_path = path.origin();
        if accessor::get(d.state(), &origin_path).is_ok() {
            continue;
        }

        let parent = origin_path.parent();
        let Some(leaf) = origin_path.last() else {
            continue;
        };
        let parent_value = if parent.is_empty() {
            Ok(d.state())
        } else {
            accessor::get(d.state(), &parent)
        };

        // Only a map parent can take a new key
        let Ok(Value::Object(siblings)) = parent_value else {
            debug!("no parent map for '{}', not declaring its origin", origin_path);
            continue;
        };
        let mut siblings = siblings.clone();
        siblings.insert(leaf.to_string(), Value::Null);

        if let Err(e) = d.set(&parent, Value::Object(siblings)) {
            warn!("failed to declare origin slot '{}': {}", origin_path, e);
        }
    }
}

fn into_list(value: ConfigValue) -> ConfigValue {
    match value {
        Value::Array(items) => Value::Array(items),
        Value::Null => Value::Array(Vec::new()),
        other => Value::Array(vec![other]),
    }
}
