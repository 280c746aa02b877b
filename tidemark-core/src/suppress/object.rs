//! Object mode: whole nested-object attributes
//!
//! Only local intent surfaces. A change is real when the declared object:
//!
//! 1. adds keys the remote value does not have,
//! 2. changes the value of a key the remote value has (at any depth), or
//! 3. drops keys that were present in the last applied (origin) value.
//!
//! Keys the remote side added and the declaration never mentioned are
//! ignored.
//!
//! ```text
//! remote: {"A": {"Aa": "aa_aa", "Ab": "aa_bb"}, "B": "bb", "C": "cc", "D": "dd"}
//!
//! {"B": "bb", "C": "cc"}            -> {"B": "bb", "C": "cc", "D": "dd"}   suppress (D matches remote)
//! {"B": "bb", "C": "cc"}            -> {"B": "bb", "C": "cc", "E": "ee"}   surface  (E is new)
//! {"B": "bb", "C": "cc"}            -> {"B": "bb", "C": "ccc"}             surface  (C changed)
//! {"A": {"Aa": "aa_aa"}, "B": "bb"} -> {"A": {"Aa": "aa_aaa"}, "B": "bb"}  surface  (A.Aa changed)
//! {"B": "bb", "C": "cc", "D": "dd"} -> {"B": "bb", "C": "cc"}             surface  (D removed)
//! ```

use log::debug;

use super::SuppressFn;
use crate::objects::{contains_all_key_values, find_decrease_keys};
use crate::path::AttrPath;
use crate::value::{ConfigMap, as_object_or_empty};

/// Hook for object-shaped attributes (maps or JSON object strings)
pub fn suppress_object_diffs() -> SuppressFn {
    super::from_fn(|key, old, new, d| {
        let path = AttrPath::parse(key);
        if path.is_count_marker() || path.is_length_marker() {
            debug!("the change '{}' is not of type object", key);
            return false;
        }

        // The stored value was refreshed from the remote side and is what
        // the console currently shows.
        let console = as_object_or_empty(old);
        let script = as_object_or_empty(new);
        let origin = as_object_or_empty(d.get_origin(key));

        let suppress = should_suppress_object(&console, &script, &origin);
        debug!("object change '{}' suppressed: {}", key, suppress);
        suppress
    })
}

/// Suppress iff the declared object contains no key/value the remote value
/// lacks, and nothing present in origin was removed from the declaration.
pub fn should_suppress_object(observed: &ConfigMap, requested: &ConfigMap, origin: &ConfigMap) -> bool {
    contains_all_key_values(observed, requested) && find_decrease_keys(origin, requested).is_empty()
}
