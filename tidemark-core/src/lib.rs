//! Tidemark Core
//!
//! Reconciles a declared configuration against remotely observed state for
//! dynamically shaped attributes (maps of maps, single-element lists standing
//! in for nested blocks). Decides, per reported change, whether the change was
//! introduced locally and must be surfaced, or echoed by the remote side and
//! can be suppressed.

pub mod accessor;
pub mod differ;
pub mod objects;
pub mod origin;
pub mod path;
pub mod resource;
pub mod suppress;
pub mod value;

pub use accessor::AccessError;
pub use path::AttrPath;
pub use resource::{ResourceData, ResourceId};
pub use value::ConfigValue;
