//! Tidemark State Management
//!
//! Persists each resource's stored attributes, including the `_origin`
//! companions written after apply, between runs. State is kept in a backend
//! with locking so two runs cannot interleave their writes.
//!
//! # Example
//!
//! ```ignore
//! use tidemark_state::{create_backend, BackendConfig};
//!
//! let config = BackendConfig::local("infra/tidemark.state.json");
//! let backend = create_backend(&config).await?;
//!
//! let lock = backend.acquire_lock("apply").await?;
//! let mut state = backend.read_state().await?.unwrap_or_default();
//!
//! // ... refresh resources and their origin values ...
//!
//! state.increment_serial();
//! backend.write_state(&state).await?;
//! backend.release_lock(&lock).await?;
//! ```

pub mod backend;
pub mod backends;
pub mod lock;
pub mod state;

pub use backend::{BackendConfig, BackendError, BackendResult, StateBackend};
pub use backends::create_backend;
pub use lock::LockInfo;
pub use state::{ResourceState, StateFile};
