//! Suppress - Decide whether a reported change is noise or a real difference
//!
//! A hook receives the change key the differ reported (e.g. `tags.env`,
//! `tags.%`, `metadata.0.labels`), the stored and declared values at that
//! key, and the resource data for any further lookups such as origin values.
//! Returning `true` suppresses the change.

mod map;
mod object;
mod scalar;
mod slice;

use std::sync::Arc;

use crate::resource::ResourceData;
use crate::value::ConfigValue;

pub use map::{determine_suppression, suppress_map_diffs, suppress_map_diffs_at};
pub use object::{should_suppress_object, suppress_object_diffs};
pub use scalar::{
    compare_json_template_are_equivalent, suppress_case_diffs, suppress_comma_separated_diffs,
    suppress_equivalent_json, suppress_equivalent_time_diffs, suppress_min_disk,
    suppress_new_line_diffs, suppress_trim_space, suppress_version_diffs,
};
pub use slice::suppress_str_slice_diffs;

/// Diff suppression hook: `(key, old, new, data) -> suppress?`
pub type SuppressFn =
    Arc<dyn Fn(&str, &ConfigValue, &ConfigValue, &ResourceData) -> bool + Send + Sync>;

/// Wrap a plain function or closure as a hook
pub fn from_fn<F>(f: F) -> SuppressFn
where
    F: Fn(&str, &ConfigValue, &ConfigValue, &ResourceData) -> bool + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Suppress when any of the hooks suppresses
pub fn compose_any(hooks: Vec<SuppressFn>) -> SuppressFn {
    from_fn(move |key, old, new, d| hooks.iter().any(|hook| hook(key, old, new, d)))
}

/// Suppress every change
pub fn suppress_all() -> SuppressFn {
    from_fn(|_, _, _, _| true)
}

/// Look up a built-in hook by the name used in manifests
pub fn builtin(name: &str) -> Option<SuppressFn> {
    let hook = match name {
        "all" => suppress_all(),
        "object" => suppress_object_diffs(),
        "map" => suppress_map_diffs(),
        "str_slice" => suppress_str_slice_diffs(),
        "case" => suppress_case_diffs(),
        "min_disk" => from_fn(suppress_min_disk),
        "trim_space" => from_fn(suppress_trim_space),
        "new_line" => from_fn(suppress_new_line_diffs),
        "comma_separated" => from_fn(suppress_comma_separated_diffs),
        "rfc3339_time" => from_fn(suppress_equivalent_time_diffs),
        "version" => from_fn(suppress_version_diffs),
        "json" => from_fn(|_, old, new, _| suppress_equivalent_json(old, new)),
        _ => return None,
    };
    Some(hook)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceId;
    use serde_json::json;

    fn data() -> ResourceData {
        ResourceData::new(ResourceId::new("nat_gateway", "main"))
    }

    #[test]
    fn compose_any_suppresses_if_one_does() {
        let hook = compose_any(vec![
            from_fn(suppress_trim_space),
            suppress_case_diffs(),
        ]);
        assert!(hook("name", &json!("Main"), &json!("main"), &data()));
        assert!(hook("name", &json!(" main "), &json!("main"), &data()));
        assert!(!hook("name", &json!("main"), &json!("other"), &data()));
    }

    #[test]
    fn compose_of_nothing_never_suppresses() {
        let hook = compose_any(Vec::new());
        assert!(!hook("name", &json!("a"), &json!("a"), &data()));
    }

    #[test]
    fn suppress_all_always() {
        assert!(suppress_all()("x", &json!(1), &json!(2), &data()));
    }

    #[test]
    fn builtin_lookup() {
        assert!(builtin("map").is_some());
        assert!(builtin("json").is_some());
        assert!(builtin("unknown").is_none());

        let hook = builtin("json").unwrap();
        assert!(hook("doc", &json!("{\"a\": 1, \"b\": 2}"), &json!("{\"b\":2,\"a\":1}"), &data()));
    }
}
