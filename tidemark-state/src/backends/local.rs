//! Local file backend
//!
//! State lives in one pretty-printed JSON file (`tidemark.state.json` by
//! default). The lock is a sibling `.lock` file that is only ever created
//! exclusively, so two runs racing for it cannot both win. State is written
//! to a temporary file and renamed into place, so an interrupted apply never
//! leaves half a state file behind.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::backend::{BackendConfig, BackendError, BackendResult, StateBackend};
use crate::lock::LockInfo;
use crate::state::StateFile;

pub struct LocalBackend {
    state_path: PathBuf,
    lock_path: PathBuf,
}

impl LocalBackend {
    pub const DEFAULT_STATE_FILE: &'static str = "tidemark.state.json";

    pub fn new() -> Self {
        Self::with_path(PathBuf::from(Self::DEFAULT_STATE_FILE))
    }

    pub fn with_path(state_path: PathBuf) -> Self {
        let lock_path = state_path.with_extension("lock");
        Self {
            state_path,
            lock_path,
        }
    }

    pub fn from_config(config: &BackendConfig) -> BackendResult<Self> {
        let path = match config.attributes.get("path") {
            None => PathBuf::from(Self::DEFAULT_STATE_FILE),
            Some(_) => config
                .get_string("path")
                .filter(|p| !p.is_empty())
                .map(PathBuf::from)
                .ok_or_else(|| BackendError::configuration("'path' must be a non-empty string"))?,
        };
        Ok(Self::with_path(path))
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// The lock on disk. An unreadable lock file counts as no lock.
    async fn current_lock(&self) -> BackendResult<Option<LockInfo>> {
        let content = match fs::read_to_string(&self.lock_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error("read lock file", e)),
        };

        match serde_json::from_str(&content) {
            Ok(lock) => Ok(Some(lock)),
            Err(e) => {
                warn!(
                    "ignoring unreadable lock file {}: {}",
                    self.lock_path.display(),
                    e
                );
                Ok(None)
            }
        }
    }

    /// Write `lock` unless a lock file already exists. Returns whether it was
    /// written.
    async fn create_lock(&self, lock: &LockInfo) -> BackendResult<bool> {
        let content = serde_json::to_string_pretty(lock)
            .map_err(|e| BackendError::Serialization(format!("Failed to serialize lock: {}", e)))?;

        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.lock_path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(io_error("create lock file", e)),
        };

        file.write_all(content.as_bytes())
            .await
            .map_err(|e| io_error("write lock file", e))?;
        file.flush().await.map_err(|e| io_error("write lock file", e))?;
        Ok(true)
    }

    async fn remove_lock(&self) -> BackendResult<()> {
        match fs::remove_file(&self.lock_path).await {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(io_error("remove lock file", e)),
            _ => Ok(()),
        }
    }
}

impl Default for LocalBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn io_error(action: &str, e: std::io::Error) -> BackendError {
    BackendError::Io(format!("Failed to {}: {}", action, e))
}

#[async_trait]
impl StateBackend for LocalBackend {
    async fn read_state(&self) -> BackendResult<Option<StateFile>> {
        let content = match fs::read_to_string(&self.state_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("no state file at {}", self.state_path.display());
                return Ok(None);
            }
            Err(e) => return Err(io_error("read state file", e)),
        };

        let state = serde_json::from_str(&content).map_err(|e| {
            BackendError::InvalidState(format!("Failed to parse state file: {}", e))
        })?;
        Ok(Some(state))
    }

    async fn write_state(&self, state: &StateFile) -> BackendResult<()> {
        if let Some(existing) = self.read_state().await?
            && existing.lineage != state.lineage
        {
            return Err(BackendError::LineageMismatch {
                expected: existing.lineage,
                actual: state.lineage.clone(),
            });
        }

        let content = serde_json::to_string_pretty(state).map_err(|e| {
            BackendError::Serialization(format!("Failed to serialize state: {}", e))
        })?;

        let staging = self.state_path.with_extension("json.tmp");
        fs::write(&staging, content)
            .await
            .map_err(|e| io_error("write state file", e))?;
        fs::rename(&staging, &self.state_path)
            .await
            .map_err(|e| io_error("replace state file", e))?;

        debug!(
            "wrote state serial {} to {}",
            state.serial,
            self.state_path.display()
        );
        Ok(())
    }

    async fn acquire_lock(&self, operation: &str) -> BackendResult<LockInfo> {
        let lock = LockInfo::new(operation);
        if self.create_lock(&lock).await? {
            debug!("acquired lock {} for {}", lock.id, operation);
            return Ok(lock);
        }

        if let Some(existing) = self.current_lock().await?
            && !existing.is_expired()
        {
            return Err(BackendError::locked(&existing));
        }

        info!("taking over lapsed lock at {}", self.lock_path.display());
        self.remove_lock().await?;
        if self.create_lock(&lock).await? {
            return Ok(lock);
        }

        // Another run took it over first
        match self.current_lock().await? {
            Some(winner) => Err(BackendError::locked(&winner)),
            None => Err(BackendError::Io(format!(
                "Failed to create lock file {}",
                self.lock_path.display()
            ))),
        }
    }

    async fn release_lock(&self, lock: &LockInfo) -> BackendResult<()> {
        match self.current_lock().await? {
            None => Err(BackendError::LockNotFound(lock.id.clone())),
            Some(held) if !held.same_lock(lock) => Err(BackendError::LockMismatch {
                expected: lock.id.clone(),
                actual: held.id,
            }),
            Some(_) => self.remove_lock().await,
        }
    }

    async fn force_unlock(&self, lock_id: &str) -> BackendResult<()> {
        match self.current_lock().await? {
            None => Err(BackendError::LockNotFound(lock_id.to_string())),
            Some(held) if held.id != lock_id => Err(BackendError::LockMismatch {
                expected: lock_id.to_string(),
                actual: held.id,
            }),
            Some(held) => {
                self.remove_lock().await?;
                info!("force-unlocked {}", held);
                Ok(())
            }
        }
    }

    async fn init(&self) -> BackendResult<()> {
        if let Some(parent) = self.state_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error("create state directory", e))?;
        }
        Ok(())
    }
}
