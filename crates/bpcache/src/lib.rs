//! # bpcache
//!
//! Local, size-bounded cache of blueprint directory trees.
//!
//! ## Architecture
//! - **Store**: one directory per key below a root, guarded by a reader-writer lock
//! - **Index**: size, creation time and hit count per key (AHash map)
//! - **GC**: evicts by weighted hits and age between a high and a low usage threshold
//! - **Maintenance**: background thread for hit resets and asynchronous GC
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use bpcache::{Store, StoreConfig, TypedContent};
//! use blueprintfs::{Blueprint, OsFs};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let fs = Arc::new(OsFs);
//! let store = Store::open(fs.clone(), &StoreConfig::new("/var/cache/blueprints", "10Gi"))?;
//! let blueprint = Blueprint::from_path(fs, "/tmp/extracted")?;
//! store.put("my-key", &TypedContent::blueprint(blueprint))?;
//! assert!(store.get("my-key")?.is_some());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod config;
mod content;
mod error;
mod gc;
mod index;
mod key;
mod parser;
mod stats;
mod store;
mod worker;

pub use config::{
    GarbageCollectionConfig, GcSettings, IndexMethod, StoreConfig, DEFAULT_GC_HIGH_THRESHOLD,
    DEFAULT_GC_LOW_THRESHOLD, DEFAULT_RESET_INTERVAL,
};
pub use content::{Resource, TypedContent, BLUEPRINT_TYPE};
pub use error::{Error, Result};
pub use gc::GcReport;
pub use index::{calculate_priority, Index, IndexEntry, PriorityBounds};
pub use key::{
    component_identity_key, derive_key, digest_key, validate_key, ComponentIdentity,
    ResourceIdentity, MAX_KEY_LEN,
};
pub use parser::{parse_duration, parse_quantity};
pub use stats::{CacheStats, StatsSnapshot};
pub use store::Store;
