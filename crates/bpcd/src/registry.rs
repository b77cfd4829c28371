//! Process-wide active store
//!
//! Starts out as an unbounded in-memory store. Installing a new store closes
//! the one it replaces before the swap.

use std::sync::{Arc, OnceLock};

use anyhow::{Context, Result};
use bpcache::Store;
use parking_lot::RwLock;
use tracing::debug;

static ACTIVE: OnceLock<RwLock<Arc<Store>>> = OnceLock::new();

fn slot() -> &'static RwLock<Arc<Store>> {
    ACTIVE.get_or_init(|| RwLock::new(Arc::new(Store::unbounded_in_memory())))
}

/// The active store
pub fn store() -> Arc<Store> {
    Arc::clone(&slot().read())
}

/// Close the active store and install `store` in its place
pub fn set_store(store: Store) -> Result<()> {
    let mut active = slot().write();
    active
        .close()
        .context("Failed to close the previous blueprint store")?;
    debug!(
        "Replacing blueprint store at {} with {}",
        active.root().display(),
        store.root().display()
    );
    *active = Arc::new(store);
    Ok(())
}
