//! Blueprint store: a size-bounded cache of blueprint directory trees
//!
//! Every entry lives in `<root>/<key>/`. Writes are staged in a hidden
//! sibling directory and renamed into place, so readers never observe a
//! half-written tree. A single reader-writer lock guards the root: `get`
//! holds it shared, `put`, `remove`, `clear` and garbage collection hold it
//! exclusively.
//!
//! None of the operations can be cancelled once started. Garbage collection
//! in particular always runs to completion.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use blueprintfs::{copy_dir, dir_size, Blueprint, FileSystem, MemoryFs};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use crate::config::{GcSettings, IndexMethod, StoreConfig};
use crate::content::TypedContent;
use crate::error::{Error, Result};
use crate::gc::GcReport;
use crate::index::{Index, IndexEntry};
use crate::key::{validate_key, STAGING_PREFIX};
use crate::stats::CacheStats;
use crate::worker::Maintenance;

/// Disk accounting, guarded by the store lock
#[derive(Debug, Default)]
pub(crate) struct Usage {
    pub(crate) current_size: u64,
    pub(crate) usage: f64,
}

pub(crate) fn size_delta(size: u64) -> i64 {
    i64::try_from(size).unwrap_or(i64::MAX)
}

/// State shared between a [`Store`] and its maintenance thread
#[derive(Debug)]
pub(crate) struct Inner {
    pub(crate) fs: Arc<dyn FileSystem>,
    pub(crate) root: PathBuf,
    pub(crate) disabled: bool,
    pub(crate) index_method: IndexMethod,
    pub(crate) settings: GcSettings,
    pub(crate) index: Index,
    pub(crate) usage: RwLock<Usage>,
    pub(crate) stats: CacheStats,
    closed: AtomicBool,
}

impl Inner {
    fn new(
        fs: Arc<dyn FileSystem>,
        root: PathBuf,
        disabled: bool,
        index_method: IndexMethod,
        settings: GcSettings,
    ) -> Self {
        Self {
            fs,
            root,
            disabled,
            index_method,
            settings,
            index: Index::new(),
            usage: RwLock::new(Usage::default()),
            stats: CacheStats::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn entry_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn staging_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}{}", STAGING_PREFIX, key))
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::StoreClosed);
        }
        Ok(())
    }

    /// Apply a signed size change and recompute the usage fraction
    pub(crate) fn update_usage(&self, usage: &mut Usage, delta: i64) {
        usage.current_size = usage.current_size.saturating_add_signed(delta);
        usage.usage = if self.settings.capacity == 0 {
            0.0
        } else {
            usage.current_size as f64 / self.settings.capacity as f64
        };
        self.stats.set_disk_usage(usage.current_size);
    }

    /// Rebuild the index from the entry directories under the root.
    ///
    /// Leftover staging directories of an interrupted `put` are removed.
    fn reconcile(&self) -> Result<()> {
        let mut usage = self.usage.write();
        let mut items = 0;

        for entry in self.fs.read_dir(&self.root)? {
            let path = self.root.join(&entry.name);
            if entry.name.starts_with('.') {
                if entry.metadata.is_dir() && entry.name.starts_with(STAGING_PREFIX) {
                    warn!("Removing leftover staging directory {}", path.display());
                    if let Err(e) = self.fs.remove_dir_all(&path) {
                        warn!(error = %e, "Unable to remove {}", path.display());
                    }
                }
                continue;
            }
            if !entry.metadata.is_dir() {
                debug!("Ignoring stray file {}", path.display());
                continue;
            }

            let size = match dir_size(self.fs.as_ref(), &path) {
                Ok(size) => size,
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable entry {}", path.display());
                    continue;
                }
            };
            let created_at: DateTime<Utc> = entry.metadata.modified.into();
            self.index.add(&entry.name, size, created_at);
            self.update_usage(&mut usage, size_delta(size));
            items += 1;
        }

        self.stats.set_stored_items(items);
        Ok(())
    }

    /// Load the entry for `key`. The caller holds the store lock.
    fn read_entry(&self, key: &str) -> Result<Option<Blueprint>> {
        let path = self.entry_path(key);
        match self.fs.metadata(&path) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Ok(None),
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e.into()),
        }
        Ok(Some(Blueprint::from_path(Arc::clone(&self.fs), path)?))
    }

    /// Copy `blueprint` into the entry for `key`, replacing any previous
    /// entry. The caller holds the store lock exclusively.
    fn write_entry(&self, usage: &mut Usage, key: &str, blueprint: &Blueprint) -> Result<u64> {
        let path = self.entry_path(key);
        let staging = self.staging_path(key);
        self.remove_if_present(&staging)?;

        let result = self.stage(blueprint, &staging).and_then(|size| {
            self.replace_entry(usage, key, &staging, &path)?;
            Ok(size)
        });
        let size = match result {
            Ok(size) => size,
            Err(e) => {
                error!(key, error = %e, "Unable to store blueprint");
                if let Err(cleanup) = self.remove_if_present(&staging) {
                    warn!(error = %cleanup, "Unable to clean up {}", staging.display());
                }
                return Err(e);
            }
        };

        self.index.add(key, size, Utc::now());
        self.update_usage(usage, size_delta(size));
        self.stats.record_insert();
        Ok(size)
    }

    fn stage(&self, blueprint: &Blueprint, staging: &Path) -> Result<u64> {
        copy_dir(blueprint.fs(), blueprint.root(), self.fs.as_ref(), staging)?;
        Ok(dir_size(self.fs.as_ref(), staging)?)
    }

    fn replace_entry(&self, usage: &mut Usage, key: &str, staging: &Path, path: &Path) -> Result<()> {
        if self.fs.exists(path)? {
            self.fs.remove_dir_all(path)?;
            if let Some(previous) = self.index.remove(key) {
                self.update_usage(usage, -size_delta(previous.size));
                self.stats.record_removal();
            }
        }
        self.fs.rename(staging, path)?;
        Ok(())
    }

    fn remove_if_present(&self, path: &Path) -> Result<()> {
        match self.fs.remove_dir_all(path) {
            Err(e) if !e.is_not_found() => Err(e.into()),
            _ => Ok(()),
        }
    }

    pub(crate) fn reset_hits(&self) {
        let preserved = self.settings.preserved_hits_proportion;
        if preserved > 0.0 {
            self.index.decay(preserved);
        } else {
            self.index.reset();
        }
        debug!("Reset hit counters of {} entries", self.index.len());
    }
}

/// Content-addressed, size-bounded store of blueprint directory trees
#[derive(Debug)]
pub struct Store {
    inner: Arc<Inner>,
    maintenance: Option<Maintenance>,
}

impl Store {
    /// Open a store on `fs` as described by `config`.
    ///
    /// The root directory is created if needed and the index is rebuilt from
    /// the entries already on disk. Bounded stores start a maintenance thread
    /// that resets hit counters and collects garbage.
    ///
    /// # Arguments
    /// * `fs` - Filesystem holding the store root
    /// * `config` - Store configuration
    ///
    /// # Returns
    /// * `Result<Store>` - Open store handle
    pub fn open(fs: Arc<dyn FileSystem>, config: &StoreConfig) -> Result<Self> {
        let settings = config.garbage_collection.resolve()?;
        let root = if config.path.as_os_str().is_empty() {
            fs.temp_dir("bpstore-")?
        } else {
            fs.create_dir_all(&config.path)?;
            config.path.clone()
        };

        let inner = Arc::new(Inner::new(
            fs,
            root,
            config.disable_cache,
            config.index_method,
            settings,
        ));
        inner.reconcile()?;

        let maintenance = if settings.capacity > 0 {
            let maintenance = Maintenance::spawn(Arc::clone(&inner)).map_err(Error::Worker)?;
            Some(maintenance)
        } else {
            None
        };

        info!(
            "Opened blueprint store at {} ({} entries, {} bytes, capacity {})",
            inner.root.display(),
            inner.index.len(),
            inner.usage.read().current_size,
            settings.capacity
        );
        Ok(Self { inner, maintenance })
    }

    /// Unbounded store in a fresh in-memory filesystem
    pub fn unbounded_in_memory() -> Self {
        let inner = Inner::new(
            Arc::new(MemoryFs::new()),
            PathBuf::from("/"),
            false,
            IndexMethod::default(),
            GcSettings::unbounded(),
        );
        Self {
            inner: Arc::new(inner),
            maintenance: None,
        }
    }

    /// Store a blueprint under `key`, replacing any previous entry.
    ///
    /// Returns `Ok(false)` without touching the store when `key` is empty.
    /// On bounded stores a garbage collection pass is requested afterwards;
    /// it runs in the background.
    pub fn put(&self, key: &str, content: &TypedContent) -> Result<bool> {
        self.inner.ensure_open()?;
        if key.is_empty() {
            return Ok(false);
        }
        validate_key(key)?;
        let blueprint = content
            .as_blueprint()
            .ok_or_else(|| Error::UnexpectedContent(content.content_type.clone()))?;

        {
            let mut usage = self.inner.usage.write();
            let size = self.inner.write_entry(&mut usage, key, blueprint)?;
            debug!(
                key,
                size,
                "Stored blueprint, usage {:.2}%",
                usage.usage * 100.0
            );
        }

        if let Some(maintenance) = &self.maintenance {
            maintenance.request_gc();
        }
        Ok(true)
    }

    /// Look up the blueprint stored under `key`.
    ///
    /// Returns `Ok(None)` on a miss and for the empty key. A disabled store
    /// answers every lookup with [`Error::NotFound`].
    pub fn get(&self, key: &str) -> Result<Option<Blueprint>> {
        self.inner.ensure_open()?;
        if self.inner.disabled {
            return Err(Error::NotFound);
        }
        if key.is_empty() {
            return Ok(None);
        }
        validate_key(key)?;

        let _guard = self.inner.usage.read();
        match self.inner.read_entry(key)? {
            Some(blueprint) => {
                self.inner.index.hit(key);
                self.inner.stats.record_hit();
                Ok(Some(blueprint))
            }
            None => {
                self.inner.stats.record_miss();
                Ok(None)
            }
        }
    }

    /// Return the cached blueprint for `key` or resolve, store and return it.
    ///
    /// `resolve` only runs on a miss. The returned blueprint reads from the
    /// stored copy whenever one is available.
    pub fn fetch<F>(&self, key: &str, resolve: F) -> Result<Blueprint>
    where
        F: FnOnce() -> Result<TypedContent>,
    {
        match self.get(key) {
            Ok(Some(blueprint)) => return Ok(blueprint),
            Ok(None) | Err(Error::NotFound) => {}
            Err(e) => return Err(e),
        }

        let content = resolve()?;
        let resolved = content
            .as_blueprint()
            .cloned()
            .ok_or_else(|| Error::UnexpectedContent(content.content_type.clone()))?;
        if !self.put(key, &content)? {
            return Ok(resolved);
        }

        let _guard = self.inner.usage.read();
        // garbage collection may already have evicted the fresh entry
        Ok(self.inner.read_entry(key)?.unwrap_or(resolved))
    }

    /// Remove the entry for `key`. Returns whether an entry existed.
    pub fn remove(&self, key: &str) -> Result<bool> {
        self.inner.ensure_open()?;
        if key.is_empty() {
            return Ok(false);
        }
        validate_key(key)?;

        let mut usage = self.inner.usage.write();
        match self.inner.fs.remove_dir_all(&self.inner.entry_path(key)) {
            Ok(()) => {}
            Err(e) if e.is_not_found() => return Ok(false),
            Err(e) => return Err(e.into()),
        }
        if let Some(entry) = self.inner.index.remove(key) {
            self.inner.update_usage(&mut usage, -size_delta(entry.size));
            self.inner.stats.record_removal();
        }
        debug!(key, "Removed blueprint");
        Ok(true)
    }

    /// Remove every entry. Returns the number of entries removed.
    pub fn clear(&self) -> Result<usize> {
        self.inner.ensure_open()?;
        let mut usage = self.inner.usage.write();
        let mut removed = 0;

        for entry in self.inner.index.entries() {
            self.inner.remove_if_present(&self.inner.entry_path(&entry.key))?;
            self.inner.index.remove(&entry.key);
            self.inner.update_usage(&mut usage, -size_delta(entry.size));
            self.inner.stats.record_removal();
            removed += 1;
        }

        info!("Cleared {} blueprints from {}", removed, self.inner.root.display());
        Ok(removed)
    }

    /// Run a garbage collection pass on the calling thread
    pub fn run_garbage_collection(&self) -> GcReport {
        self.inner.collect_garbage()
    }

    /// Reset (or decay) all hit counters now instead of waiting for the
    /// next reset interval
    pub fn reset_hits(&self) {
        self.inner.reset_hits();
    }

    /// Stop background maintenance and reject further reads and writes.
    /// Calling it again has no effect.
    pub fn close(&self) -> Result<()> {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Some(maintenance) = &self.maintenance {
            maintenance.shutdown();
        }
        info!("Closed blueprint store at {}", self.inner.root.display());
        Ok(())
    }

    /// Whether an entry for `key` exists, without counting a hit
    pub fn contains(&self, key: &str) -> Result<bool> {
        self.inner.ensure_open()?;
        if key.is_empty() {
            return Ok(false);
        }
        validate_key(key)?;
        let _guard = self.inner.usage.read();
        Ok(self.inner.fs.exists(&self.inner.entry_path(key))?)
    }

    /// Bytes currently stored
    pub fn current_size(&self) -> u64 {
        self.inner.usage.read().current_size
    }

    /// Stored bytes as a fraction of capacity; always 0 when unbounded
    pub fn usage(&self) -> f64 {
        self.inner.usage.read().usage
    }

    /// Capacity in bytes; 0 is unbounded
    pub fn capacity(&self) -> u64 {
        self.inner.settings.capacity
    }

    /// Resolved garbage collection settings
    pub fn settings(&self) -> &GcSettings {
        &self.inner.settings
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.inner.index.len()
    }

    /// Whether the store holds no entries
    pub fn is_empty(&self) -> bool {
        self.inner.index.is_empty()
    }

    /// Index entries sorted by key
    pub fn entries(&self) -> Vec<IndexEntry> {
        self.inner.index.entries()
    }

    /// Index entries in eviction order
    pub fn priority_list(&self) -> Vec<IndexEntry> {
        self.inner.index.priority_list()
    }

    /// Store statistics
    pub fn stats(&self) -> &CacheStats {
        &self.inner.stats
    }

    /// Root directory of the store
    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    /// Filesystem the store lives on
    pub fn fs(&self) -> Arc<dyn FileSystem> {
        Arc::clone(&self.inner.fs)
    }

    /// Key derivation method configured for this store
    pub fn index_method(&self) -> IndexMethod {
        self.inner.index_method
    }

    /// Whether lookups are disabled
    pub fn is_disabled(&self) -> bool {
        self.inner.disabled
    }

    /// Whether [`Store::close`] has been called
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
