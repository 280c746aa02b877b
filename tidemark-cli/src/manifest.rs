//! Manifest - Declared resources and their suppression rules
//!
//! ```json
//! {
//!   "backend": { "type": "local", "path": "tidemark.state.json" },
//!   "resources": [
//!     {
//!       "type": "fgs_function",
//!       "name": "worker",
//!       "attributes": { "tags": { "env": "prod" } },
//!       "rules": [ { "path": "tags", "mode": "map" } ]
//!     }
//!   ]
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};

use tidemark_core::differ::{DiffMode, Differ, SuppressRule};
use tidemark_core::resource::ResourceId;
use tidemark_core::suppress;
use tidemark_state::BackendConfig;

#[derive(Debug, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub backend: Option<BackendSpec>,
    #[serde(default)]
    pub resources: Vec<ResourceSpec>,
}

#[derive(Debug, Deserialize)]
pub struct BackendSpec {
    #[serde(rename = "type", default = "default_backend_type")]
    pub backend_type: String,
    #[serde(default)]
    pub path: Option<String>,
}

fn default_backend_type() -> String {
    "local".to_string()
}

#[derive(Debug, Deserialize)]
pub struct ResourceSpec {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
}

#[derive(Debug, Deserialize)]
pub struct RuleSpec {
    pub path: String,
    pub mode: DiffMode,
    /// Built-in hook name; the mode's default hook when absent
    #[serde(default)]
    pub suppress: Option<String>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, String> {
        let manifest: Manifest =
            serde_json::from_str(content).map_err(|e| format!("Parse error: {}", e))?;
        manifest.validate()?;
        Ok(manifest)
    }

    fn validate(&self) -> Result<(), String> {
        let mut seen = std::collections::HashSet::new();
        for resource in &self.resources {
            let id = resource.id();
            if !seen.insert(id.clone()) {
                return Err(format!("Duplicate resource: {}", id));
            }
            // Fail on unknown hook names before anything is diffed
            resource.differ()?;
        }
        Ok(())
    }

    /// Backend configuration; relative state paths resolve against `base_dir`
    pub fn backend_config(&self, base_dir: &Path) -> BackendConfig {
        let Some(spec) = &self.backend else {
            let path = base_dir.join(tidemark_state::backends::LocalBackend::DEFAULT_STATE_FILE);
            return BackendConfig::local(path.to_string_lossy());
        };

        let mut config = BackendConfig {
            backend_type: spec.backend_type.clone(),
            ..BackendConfig::default()
        };
        let path = spec
            .path
            .as_deref()
            .unwrap_or(tidemark_state::backends::LocalBackend::DEFAULT_STATE_FILE);
        config.attributes.insert(
            "path".to_string(),
            Value::String(base_dir.join(path).to_string_lossy().into_owned()),
        );
        config
    }
}

impl ResourceSpec {
    pub fn id(&self) -> ResourceId {
        ResourceId::new(self.resource_type.clone(), self.name.clone())
    }

    /// Declared configuration as one object
    pub fn config(&self) -> Value {
        Value::Object(self.attributes.clone())
    }

    pub fn differ(&self) -> Result<Differ, String> {
        let mut differ = Differ::new();
        for rule in &self.rules {
            let mut suppress_rule = SuppressRule::new(rule.path.as_str(), rule.mode);
            if let Some(name) = &rule.suppress {
                let hook = suppress::builtin(name).ok_or_else(|| {
                    format!(
                        "{}: unknown suppress function '{}' for '{}'",
                        self.id(),
                        name,
                        rule.path
                    )
                })?;
                suppress_rule = suppress_rule.with_suppress(hook);
            }
            differ.add_rule(suppress_rule);
        }
        Ok(differ)
    }
}
