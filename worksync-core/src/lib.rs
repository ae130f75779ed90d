//! worksync core library: work-item domain types, engine config, errors.
//!
//! Public API surface:
//! - [`types`]: newtypes, [`WorkItem`] and the comparable [`Field`] set
//! - [`config`]: [`EngineConfig`] load / state paths
//! - [`error`]: [`CoreError`]

pub mod config;
pub mod error;
pub mod types;

pub use config::{
    BatchConfig, DiffConfig, EngineConfig, Encoding, RetryConfig, WriteConfig,
};
pub use error::CoreError;
pub use types::{Field, Priority, WorkItem, WorkItemId};
