//! Differ - Compare declared configuration with stored state
//!
//! Walks the registered suppression rules and the remaining declared
//! attributes, reports every changed key the way the suppression hooks
//! expect to see it (`tags.env`, `tags.%`, `zones.#`), and asks each rule's
//! hook whether the change is noise.

use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::accessor;
use crate::path::{AttrPath, COUNT_MARKER, LENGTH_MARKER, ORIGIN_SUFFIX};
use crate::resource::{ResourceData, ResourceId};
use crate::suppress::{self, SuppressFn};
use crate::value::{ConfigMap, ConfigValue};

/// How an attribute's changes are reported and suppressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffMode {
    Scalar,
    Object,
    Map,
    List,
}

impl DiffMode {
    /// Hook used when a rule for `path` does not name one
    pub fn default_suppressor(self, path: &AttrPath) -> Option<SuppressFn> {
        match self {
            DiffMode::Scalar => None,
            DiffMode::Object => Some(suppress::suppress_object_diffs()),
            DiffMode::Map => Some(suppress::suppress_map_diffs_at(path.clone())),
            DiffMode::List => Some(suppress::suppress_str_slice_diffs()),
        }
    }
}

/// A tracked attribute and the hook deciding its changes
#[derive(Clone)]
pub struct SuppressRule {
    pub path: AttrPath,
    pub mode: DiffMode,
    suppress: Option<SuppressFn>,
}

impl SuppressRule {
    pub fn new(path: impl Into<AttrPath>, mode: DiffMode) -> Self {
        let path = path.into();
        Self {
            suppress: mode.default_suppressor(&path),
            path,
            mode,
        }
    }

    pub fn with_suppress(mut self, hook: SuppressFn) -> Self {
        self.suppress = Some(hook);
        self
    }

    fn is_suppressed(&self, change: &AttributeChange, d: &ResourceData) -> bool {
        self.suppress
            .as_ref()
            .is_some_and(|hook| hook(&change.key, &change.old, &change.new, d))
    }
}

impl fmt::Debug for SuppressRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SuppressRule")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .field("has_suppress", &self.suppress.is_some())
            .finish()
    }
}

/// One reported change
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeChange {
    pub key: String,
    pub old: ConfigValue,
    pub new: ConfigValue,
    pub suppressed: bool,
}

impl AttributeChange {
    fn new(key: impl Into<String>, old: ConfigValue, new: ConfigValue) -> Self {
        Self {
            key: key.into(),
            old,
            new,
            suppressed: false,
        }
    }
}

/// Result of comparing one resource
#[derive(Debug, Clone, PartialEq)]
pub enum Diff {
    /// Nothing stored yet -> needs creation
    Create(ResourceId),
    /// Surfaced changes remain -> needs update
    Update {
        id: ResourceId,
        changes: Vec<AttributeChange>,
        suppressed: Vec<AttributeChange>,
    },
    /// Every change was suppressed, or there were none
    NoChange(ResourceId),
}

impl Diff {
    /// Returns whether this Diff involves a change
    pub fn is_change(&self) -> bool {
        !matches!(self, Diff::NoChange(_))
    }
}

/// Paths whose origin companions must be refreshed after apply
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackedPaths {
    /// Object and map attributes
    pub objects: Vec<AttrPath>,
    /// List attributes
    pub slices: Vec<AttrPath>,
}

#[derive(Debug, Clone, Default)]
pub struct Differ {
    rules: Vec<SuppressRule>,
}

impl Differ {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule(mut self, rule: SuppressRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn add_rule(&mut self, rule: SuppressRule) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[SuppressRule] {
        &self.rules
    }

    pub fn tracked_paths(&self) -> TrackedPaths {
        let mut tracked = TrackedPaths::default();
        for rule in &self.rules {
            match rule.mode {
                DiffMode::Object | DiffMode::Map => tracked.objects.push(rule.path.clone()),
                DiffMode::List => tracked.slices.push(rule.path.clone()),
                DiffMode::Scalar => {}
            }
        }
        tracked
    }

    /// Every changed key with its suppression decision
    pub fn changes(&self, d: &ResourceData) -> Vec<AttributeChange> {
        let mut changes = Vec::new();

        for rule in &self.rules {
            let old = accessor::get_or_null(d.state(), &rule.path);
            let new = accessor::get_or_null(d.config(), &rule.path);
            for mut change in rule_changes(rule, old, new) {
                change.suppressed = rule.is_suppressed(&change, d);
                debug!(
                    "{}: change '{}' suppressed={}",
                    d.id, change.key, change.suppressed
                );
                changes.push(change);
            }
        }

        changes.extend(self.untracked_changes(d));
        changes
    }

    /// Compare one resource
    pub fn diff(&self, d: &ResourceData) -> Diff {
        if !d.has_state() {
            return Diff::Create(d.id.clone());
        }

        let (suppressed, changes): (Vec<_>, Vec<_>) =
            self.changes(d).into_iter().partition(|c| c.suppressed);

        if changes.is_empty() {
            Diff::NoChange(d.id.clone())
        } else {
            Diff::Update {
                id: d.id.clone(),
                changes,
                suppressed,
            }
        }
    }

    /// Leaf-by-leaf comparison of declared attributes no rule covers
    fn untracked_changes(&self, d: &ResourceData) -> Vec<AttributeChange> {
        let Some(config) = d.config().as_object() else {
            return Vec::new();
        };

        // Rule paths may leave list indices implicit; declared leaves never do
        let tracked: Vec<AttrPath> = self
            .rules
            .iter()
            .map(|rule| accessor::resolve_path(d.config(), &rule.path))
            .collect();

        let mut leaves = Vec::new();
        for (key, value) in config {
            if is_internal_key(key) {
                continue;
            }
            flatten(AttrPath::parse(key), value, &mut leaves);
        }

        leaves
            .into_iter()
            .filter(|(path, _)| !tracked.iter().any(|rule_path| path.starts_with(rule_path)))
            .filter_map(|(path, new)| {
                let old = accessor::get_or_null(d.state(), &path);
                (old != &new).then(|| AttributeChange::new(path.to_string(), old.clone(), new))
            })
            .collect()
    }
}

fn rule_changes(rule: &SuppressRule, old: &ConfigValue, new: &ConfigValue) -> Vec<AttributeChange> {
    let key = rule.path.to_string();
    match rule.mode {
        DiffMode::Scalar | DiffMode::Object => {
            if old == new {
                Vec::new()
            } else {
                vec![AttributeChange::new(key, old.clone(), new.clone())]
            }
        }
        DiffMode::Map => map_changes(&rule.path, old, new),
        DiffMode::List => list_changes(&rule.path, old, new),
    }
}

fn map_changes(path: &AttrPath, old: &ConfigValue, new: &ConfigValue) -> Vec<AttributeChange> {
    let empty = ConfigMap::new();
    let old_map = old.as_object().unwrap_or(&empty);
    let new_map = new.as_object().unwrap_or(&empty);
    let mut changes = Vec::new();

    if old_map.len() != new_map.len() {
        changes.push(AttributeChange::new(
            path.child(COUNT_MARKER).to_string(),
            json!(old_map.len()),
            json!(new_map.len()),
        ));
    }

    if old.is_object() != new.is_object() {
        changes.push(AttributeChange::new(path.to_string(), old.clone(), new.clone()));
    }

    let keys = old_map
        .keys()
        .chain(new_map.keys().filter(|k| !old_map.contains_key(*k)));
    for key in keys {
        if key.ends_with(ORIGIN_SUFFIX) {
            continue;
        }
        let old_value = old_map.get(key).unwrap_or(&Value::Null);
        let new_value = new_map.get(key).unwrap_or(&Value::Null);
        if old_value != new_value {
            changes.push(AttributeChange::new(
                path.child(key.as_str()).to_string(),
                old_value.clone(),
                new_value.clone(),
            ));
        }
    }

    changes
}

fn list_changes(path: &AttrPath, old: &ConfigValue, new: &ConfigValue) -> Vec<AttributeChange> {
    let old_len = old.as_array().map_or(0, Vec::len);
    let new_len = new.as_array().map_or(0, Vec::len);
    let mut changes = Vec::new();

    if old_len != new_len {
        changes.push(AttributeChange::new(
            path.child(LENGTH_MARKER).to_string(),
            json!(old_len),
            json!(new_len),
        ));
    }
    if old != new {
        changes.push(AttributeChange::new(path.to_string(), old.clone(), new.clone()));
    }

    changes
}

// Internal attributes (starting with _) and origin companions are never diffed
fn is_internal_key(key: &str) -> bool {
    key.starts_with('_') || key.ends_with(ORIGIN_SUFFIX)
}

/// Flatten a declared value into leaf paths. Empty maps and lists are leaves.
fn flatten(path: AttrPath, value: &ConfigValue, out: &mut Vec<(AttrPath, ConfigValue)>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                if is_internal_key(key) {
                    continue;
                }
                flatten(path.child(key.as_str()), child, out);
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (index, child) in items.iter().enumerate() {
                flatten(path.child(index.to_string()), child, out);
            }
        }
        _ => out.push((path, value.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(state: Value, config: Value) -> ResourceData {
        ResourceData::new(ResourceId::new("fgs_function", "worker"))
            .with_state(state)
            .with_config(config)
    }

    fn keys(changes: &[AttributeChange]) -> Vec<&str> {
        changes.iter().map(|c| c.key.as_str()).collect()
    }

    #[test]
    fn diff_create_when_nothing_stored() {
        let d = data(json!({}), json!({"name": "worker"}));
        assert!(matches!(Differ::new().diff(&d), Diff::Create(_)));
    }

    #[test]
    fn diff_no_change_when_same() {
        let d = data(json!({"name": "worker"}), json!({"name": "worker"}));
        let result = Differ::new().diff(&d);
        assert!(!result.is_change());
    }

    #[test]
    fn diff_update_for_untracked_leaf() {
        let d = data(
            json!({"name": "worker", "spec": {"memory": 128, "runtime": "python3"}}),
            json!({"name": "worker", "spec": {"memory": 256}}),
        );
        match Differ::new().diff(&d) {
            Diff::Update { changes, .. } => {
                assert_eq!(keys(&changes), vec!["spec.memory"]);
                assert_eq!(changes[0].old, json!(128));
                assert_eq!(changes[0].new, json!(256));
            }
            other => panic!("Expected Update, got {:?}", other),
        }
    }

    #[test]
    fn internal_and_origin_keys_are_not_diffed() {
        let d = data(
            json!({"name": "a", "tags_origin": {"x": "1"}}),
            json!({"name": "a", "_note": "local", "tags_origin": {"y": "2"}}),
        );
        assert!(Differ::new().changes(&d).is_empty());
    }

    #[test]
    fn map_rule_reports_per_key_changes() {
        let d = data(
            json!({"tags": {"a": "1", "remote": "r"}, "tags_origin": {"a": "1"}}),
            json!({"tags": {"a": "1", "local": "l"}}),
        );
        let differ = Differ::new().with_rule(SuppressRule::new("tags", DiffMode::Map));
        let changes = differ.changes(&d);

        assert_eq!(keys(&changes), vec!["tags.remote", "tags.local"]);
        assert!(changes[0].suppressed);
        assert!(!changes[1].suppressed);
        assert!(differ.diff(&d).is_change());
    }

    #[test]
    fn map_rule_remote_only_keys_give_no_change() {
        let d = data(
            json!({"tags": {"a": "1", "remote": "r"}, "tags_origin": {"a": "1"}}),
            json!({"tags": {"a": "1"}}),
        );
        let differ = Differ::new().with_rule(SuppressRule::new("tags", DiffMode::Map));

        let changes = differ.changes(&d);
        assert_eq!(keys(&changes), vec!["tags.%", "tags.remote"]);
        assert!(changes.iter().all(|c| c.suppressed));
        assert!(matches!(differ.diff(&d), Diff::NoChange(_)));
    }

    #[test]
    fn map_rule_reports_whole_map_when_one_side_is_missing() {
        let d = data(json!({"name": "a", "tags": {"k": "v"}}), json!({"name": "a"}));
        let differ = Differ::new().with_rule(SuppressRule::new("tags", DiffMode::Map));
        let changes = differ.changes(&d);
        assert_eq!(keys(&changes), vec!["tags.%", "tags", "tags.k"]);
    }

    #[test]
    fn list_rule_reports_length_and_whole_list() {
        let d = data(
            json!({"zones": ["a", "b", "c", "d"], "zones_origin": ["a", "b", "c"]}),
            json!({"zones": ["a", "b", "c"]}),
        );
        let differ = Differ::new().with_rule(SuppressRule::new("zones", DiffMode::List));
        let changes = differ.changes(&d);

        assert_eq!(keys(&changes), vec!["zones.#", "zones"]);
        assert!(changes.iter().all(|c| c.suppressed));
    }

    #[test]
    fn list_rule_surfaces_local_removal() {
        let d = data(
            json!({"zones": ["a", "b", "c", "d"], "zones_origin": ["a", "b", "c"]}),
            json!({"zones": ["a", "b"]}),
        );
        let differ = Differ::new().with_rule(SuppressRule::new("zones", DiffMode::List));
        match differ.diff(&d) {
            Diff::Update { changes, .. } => assert_eq!(keys(&changes), vec!["zones.#", "zones"]),
            other => panic!("Expected Update, got {:?}", other),
        }
    }

    #[test]
    fn object_rule_on_nested_path() {
        let d = data(
            json!({"spec": [{"conditions": {"B": "bb", "C": "cc", "D": "dd"}, "name": "x"}]}),
            json!({"spec": [{"conditions": {"B": "bb", "C": "cc"}, "name": "x"}]}),
        );
        let differ =
            Differ::new().with_rule(SuppressRule::new("spec.0.conditions", DiffMode::Object));
        let changes = differ.changes(&d);

        assert_eq!(keys(&changes), vec!["spec.0.conditions"]);
        assert!(changes[0].suppressed);
    }

    #[test]
    fn scalar_rule_uses_given_hook() {
        let d = data(json!({"mode": "ReadWrite"}), json!({"mode": "readwrite"}));

        let plain = Differ::new().with_rule(SuppressRule::new("mode", DiffMode::Scalar));
        assert!(plain.diff(&d).is_change());

        let with_hook = Differ::new().with_rule(
            SuppressRule::new("mode", DiffMode::Scalar).with_suppress(suppress::suppress_case_diffs()),
        );
        assert!(!with_hook.diff(&d).is_change());
    }

    #[test]
    fn tracked_paths_by_mode() {
        let differ = Differ::new()
            .with_rule(SuppressRule::new("tags", DiffMode::Map))
            .with_rule(SuppressRule::new("spec.0.conditions", DiffMode::Object))
            .with_rule(SuppressRule::new("zones", DiffMode::List))
            .with_rule(SuppressRule::new("mode", DiffMode::Scalar));

        let tracked = differ.tracked_paths();
        assert_eq!(
            tracked.objects,
            vec![AttrPath::parse("tags"), AttrPath::parse("spec.0.conditions")]
        );
        assert_eq!(tracked.slices, vec![AttrPath::parse("zones")]);
    }

    #[test]
    fn map_rule_surfaces_edit_of_object_valued_key() {
        let d = data(
            json!({"tags": {"a": {"x": 1}}, "tags_origin": {"a": {"x": 1}}}),
            json!({"tags": {"a": {"x": 2}}}),
        );
        let differ = Differ::new().with_rule(SuppressRule::new("tags", DiffMode::Map));
        match differ.diff(&d) {
            Diff::Update { changes, .. } => assert_eq!(keys(&changes), vec!["tags.a"]),
            other => panic!("Expected Update, got {:?}", other),
        }
    }

    #[test]
    fn nested_map_rule_checks_whole_map_against_its_origin() {
        let d = data(
            json!({"metadata": [{"labels": {"app": "web"}, "labels_origin": {"app": "web"}}]}),
            json!({"metadata": [{}]}),
        );
        let differ =
            Differ::new().with_rule(SuppressRule::new("metadata.0.labels", DiffMode::Map));
        let changes = differ.changes(&d);

        let whole = changes.iter().find(|c| c.key == "metadata.0.labels").unwrap();
        assert!(!whole.suppressed);
    }

    #[test]
    fn rule_without_index_covers_declared_leaves() {
        // The remote side reordered the zones
        let d = data(
            json!({"spec": [{"zones": ["b", "a"], "zones_origin": ["a", "b"]}]}),
            json!({"spec": [{"zones": ["a", "b"]}]}),
        );

        for rule_path in ["spec.zones", "spec.0.zones"] {
            let differ = Differ::new().with_rule(SuppressRule::new(rule_path, DiffMode::List));
            let changes = differ.changes(&d);
            assert_eq!(keys(&changes), vec![rule_path]);
            assert!(matches!(differ.diff(&d), Diff::NoChange(_)));
        }
    }

    #[test]
    fn diff_mode_deserializes_lowercase() {
        let mode: DiffMode = serde_json::from_str("\"map\"").unwrap();
        assert_eq!(mode, DiffMode::Map);
    }
}
