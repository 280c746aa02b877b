//! State file structures persisted between runs

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tidemark_core::resource::{ResourceData, ResourceId};
use tidemark_core::value::ConfigMap;

/// The main state file structure that persists to the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateFile {
    /// State file format version
    pub version: u32,
    /// Monotonically increasing number for each state modification
    pub serial: u64,
    /// Unique identifier for this state lineage (prevents accidental overwrites)
    pub lineage: String,
    /// Version of Tidemark that last modified this state
    pub tidemark_version: String,
    /// All managed resources and their stored attributes
    pub resources: Vec<ResourceState>,
}

impl StateFile {
    /// Current state file format version
    pub const CURRENT_VERSION: u32 = 1;

    pub fn new() -> Self {
        Self::with_lineage(uuid::Uuid::new_v4().to_string())
    }

    pub fn with_lineage(lineage: String) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            serial: 0,
            lineage,
            tidemark_version: env!("CARGO_PKG_VERSION").to_string(),
            resources: Vec::new(),
        }
    }

    /// Increment serial and update the tool version for a new state write
    pub fn increment_serial(&mut self) {
        self.serial += 1;
        self.tidemark_version = env!("CARGO_PKG_VERSION").to_string();
    }

    pub fn find_resource(&self, id: &ResourceId) -> Option<&ResourceState> {
        self.resources.iter().find(|r| r.matches(id))
    }

    pub fn find_resource_mut(&mut self, id: &ResourceId) -> Option<&mut ResourceState> {
        self.resources.iter_mut().find(|r| r.matches(id))
    }

    /// Add or update a resource in the state
    pub fn upsert_resource(&mut self, resource: ResourceState) {
        if let Some(existing) = self.find_resource_mut(&resource.id()) {
            *existing = resource;
        } else {
            self.resources.push(resource);
        }
    }

    pub fn remove_resource(&mut self, id: &ResourceId) -> Option<ResourceState> {
        let pos = self.resources.iter().position(|r| r.matches(id))?;
        Some(self.resources.remove(pos))
    }

    /// Pair the stored attributes of `id` with its declared configuration.
    /// A resource that was never stored gets empty state.
    pub fn resource_data(&self, id: &ResourceId, config: Value) -> ResourceData {
        match self.find_resource(id) {
            Some(stored) => stored.to_resource_data(config),
            None => ResourceData::new(id.clone()).with_config(config),
        }
    }
}

impl Default for StateFile {
    fn default() -> Self {
        Self::new()
    }
}

/// Stored state of a single resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceState {
    /// Resource type (e.g., "fgs_function", "vpc_eip")
    pub resource_type: String,
    /// Resource name from the manifest
    pub name: String,
    /// Stored attributes, origin companions included
    pub attributes: HashMap<String, Value>,
}

impl ResourceState {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn id(&self) -> ResourceId {
        ResourceId::new(self.resource_type.clone(), self.name.clone())
    }

    fn matches(&self, id: &ResourceId) -> bool {
        self.resource_type == id.resource_type && self.name == id.name
    }

    pub fn to_resource_data(&self, config: Value) -> ResourceData {
        let state: ConfigMap = self
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        ResourceData::new(self.id())
            .with_state(Value::Object(state))
            .with_config(config)
    }

    /// Capture the stored side of `d`. Non-map state stores nothing.
    pub fn from_resource_data(d: &ResourceData) -> Self {
        let attributes = match d.state() {
            Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            _ => HashMap::new(),
        };
        Self {
            resource_type: d.id.resource_type.clone(),
            name: d.id.name.clone(),
            attributes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eip() -> ResourceId {
        ResourceId::new("vpc_eip", "main")
    }

    #[test]
    fn test_state_file_new() {
        let state = StateFile::new();
        assert_eq!(state.version, StateFile::CURRENT_VERSION);
        assert_eq!(state.serial, 0);
        assert!(!state.lineage.is_empty());
        assert!(state.resources.is_empty());
    }

    #[test]
    fn test_state_file_increment_serial() {
        let mut state = StateFile::new();
        state.increment_serial();
        state.increment_serial();
        assert_eq!(state.serial, 2);
    }

    #[test]
    fn test_state_file_upsert_resource() {
        let mut state = StateFile::new();

        state.upsert_resource(
            ResourceState::new("vpc_eip", "main").with_attribute("bandwidth", json!(5)),
        );
        assert_eq!(state.resources.len(), 1);

        state.upsert_resource(
            ResourceState::new("vpc_eip", "main").with_attribute("bandwidth", json!(10)),
        );
        assert_eq!(state.resources.len(), 1);
        assert_eq!(state.resources[0].attributes.get("bandwidth"), Some(&json!(10)));
    }

    #[test]
    fn test_state_file_remove_resource() {
        let mut state = StateFile::new();
        state.upsert_resource(ResourceState::new("vpc_eip", "main"));

        assert!(state.remove_resource(&eip()).is_some());
        assert!(state.resources.is_empty());
        assert!(state.remove_resource(&eip()).is_none());
    }

    #[test]
    fn test_resource_data_round_trip_keeps_origin() {
        let mut state = StateFile::new();
        state.upsert_resource(
            ResourceState::new("vpc_eip", "main")
                .with_attribute("tags", json!({"a": "1", "remote": "r"}))
                .with_attribute("tags_origin", json!({"a": "1"})),
        );

        let d = state.resource_data(&eip(), json!({"tags": {"a": "1"}}));
        assert_eq!(d.get_origin("tags"), &json!({"a": "1"}));
        assert_eq!(d.get_raw_config("tags"), &json!({"a": "1"}));

        let stored = ResourceState::from_resource_data(&d);
        assert_eq!(stored.attributes.len(), 2);
        assert_eq!(stored.id(), eip());
    }

    #[test]
    fn test_resource_data_for_unknown_resource_is_empty() {
        let state = StateFile::new();
        let d = state.resource_data(&eip(), json!({"bandwidth": 5}));
        assert!(!d.has_state());
    }

    #[test]
    fn test_state_file_serialization() {
        let mut state = StateFile::new();
        state.upsert_resource(
            ResourceState::new("vpc_eip", "main").with_attribute("zones_origin", json!(["az1"])),
        );

        let json = serde_json::to_string_pretty(&state).unwrap();
        let deserialized: StateFile = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.lineage, state.lineage);
        assert_eq!(deserialized.resources.len(), 1);
        assert_eq!(
            deserialized.resources[0].attributes.get("zones_origin"),
            Some(&json!(["az1"]))
        );
    }
}
