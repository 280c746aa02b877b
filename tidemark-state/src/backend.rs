//! Where state is stored, and what can go wrong storing it

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::lock::LockInfo;
use crate::state::StateFile;

#[derive(Debug, Error)]
pub enum BackendError {
    /// Another run holds an unexpired lock
    #[error(
        "State is locked by {holder} during {operation}. If that run is gone, release it with `tidemark force-unlock {lock_id}`"
    )]
    Locked {
        lock_id: String,
        holder: String,
        operation: String,
    },

    #[error("No lock {0} is held")]
    LockNotFound(String),

    #[error("Lock {actual} is held, not {expected}")]
    LockMismatch { expected: String, actual: String },

    #[error("Unsupported backend type: {0}")]
    UnsupportedBackend(String),

    #[error("Backend configuration error: {0}")]
    Configuration(String),

    #[error("Invalid state file: {0}")]
    InvalidState(String),

    /// The stored state was started by a different first apply
    #[error("State lineage mismatch: expected {expected}, got {actual}")]
    LineageMismatch { expected: String, actual: String },

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl BackendError {
    pub fn locked(lock: &LockInfo) -> Self {
        Self::Locked {
            lock_id: lock.id.clone(),
            holder: lock.holder.clone(),
            operation: lock.operation.clone(),
        }
    }

    pub fn unsupported_backend(backend_type: impl Into<String>) -> Self {
        Self::UnsupportedBackend(backend_type.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Where resource attributes and their origin values live between runs
#[async_trait]
pub trait StateBackend: Send + Sync {
    /// `None` before the first apply
    async fn read_state(&self) -> BackendResult<Option<StateFile>>;

    /// Replace the stored state. Bump the serial first; a state from
    /// another lineage is refused.
    async fn write_state(&self, state: &StateFile) -> BackendResult<()>;

    /// Take the lock for `operation`, replacing a lapsed one
    async fn acquire_lock(&self, operation: &str) -> BackendResult<LockInfo>;

    async fn release_lock(&self, lock: &LockInfo) -> BackendResult<()>;

    /// Drop the lock with `lock_id` whoever holds it
    async fn force_unlock(&self, lock_id: &str) -> BackendResult<()>;

    /// Create whatever the backend needs before the first write
    async fn init(&self) -> BackendResult<()>;
}

/// The manifest's `backend` block
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Only "local" is supported
    pub backend_type: String,
    pub attributes: HashMap<String, Value>,
}

impl BackendConfig {
    /// Local backend writing to `path`
    pub fn local(path: impl Into<String>) -> Self {
        let mut attributes = HashMap::new();
        attributes.insert("path".to_string(), Value::String(path.into()));
        Self {
            backend_type: "local".to_string(),
            attributes,
        }
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            backend_type: "local".to_string(),
            attributes: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn locked_error_points_at_force_unlock() {
        let lock = LockInfo::new("apply");
        let error = BackendError::locked(&lock);

        match &error {
            BackendError::Locked {
                lock_id, holder, ..
            } => {
                assert_eq!(lock_id, &lock.id);
                assert_eq!(holder, &lock.holder);
            }
            other => panic!("Expected Locked error, got {:?}", other),
        }
        assert!(
            error
                .to_string()
                .ends_with(&format!("`tidemark force-unlock {}`", lock.id))
        );
    }

    #[test]
    fn lineage_mismatch_message() {
        let error = BackendError::LineageMismatch {
            expected: "a".to_string(),
            actual: "b".to_string(),
        };
        assert_eq!(error.to_string(), "State lineage mismatch: expected a, got b");
    }

    #[test]
    fn local_config_carries_path() {
        let config = BackendConfig::local("state.json");
        assert_eq!(config.backend_type, "local");
        assert_eq!(config.get_string("path"), Some("state.json"));
        assert_eq!(config.get_string("missing"), None);

        let mut config = BackendConfig::default();
        config.attributes.insert("path".to_string(), json!(1));
        assert_eq!(config.get_string("path"), None);
    }
}
