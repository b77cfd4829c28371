//! Store statistics tracking

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters and gauges updated by the store
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
    evictions: AtomicU64,
    eviction_failures: AtomicU64,
    gc_runs: AtomicU64,
    stored_items: AtomicU64,
    disk_usage: AtomicU64,
}

/// Point-in-time copy of [`CacheStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    /// Successful lookups
    pub hits: u64,
    /// Lookups that found nothing
    pub misses: u64,
    /// Stored entries
    pub inserts: u64,
    /// Entries removed by garbage collection
    pub evictions: u64,
    /// Garbage collection deletions that failed
    pub eviction_failures: u64,
    /// Garbage collection passes that evaluated usage
    pub gc_runs: u64,
    /// Entries currently stored
    pub stored_items: u64,
    /// Bytes currently stored
    pub disk_usage: u64,
    /// hits / (hits + misses)
    pub hit_ratio: f64,
}

impl CacheStats {
    /// Create new stats tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a cache hit
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a cache miss
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a stored entry
    pub fn record_insert(&self) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
        self.stored_items.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an entry removed by garbage collection
    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
        self.record_removal();
    }

    /// Record a garbage collection deletion that failed
    pub fn record_eviction_failure(&self) {
        self.eviction_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a garbage collection pass
    pub fn record_gc_run(&self) {
        self.gc_runs.fetch_add(1, Ordering::Relaxed);
    }

    /// Decrement the stored items gauge
    pub fn record_removal(&self) {
        // saturating: the gauge never goes below zero
        let _ = self
            .stored_items
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                Some(n.saturating_sub(1))
            });
    }

    /// Set the stored items gauge
    pub fn set_stored_items(&self, items: u64) {
        self.stored_items.store(items, Ordering::Relaxed);
    }

    /// Set the disk usage gauge
    pub fn set_disk_usage(&self, bytes: u64) {
        self.disk_usage.store(bytes, Ordering::Relaxed);
    }

    /// Get total hits
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Get total misses
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Get total inserts
    pub fn inserts(&self) -> u64 {
        self.inserts.load(Ordering::Relaxed)
    }

    /// Get total evictions
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Get total failed evictions
    pub fn eviction_failures(&self) -> u64 {
        self.eviction_failures.load(Ordering::Relaxed)
    }

    /// Get total garbage collection passes
    pub fn gc_runs(&self) -> u64 {
        self.gc_runs.load(Ordering::Relaxed)
    }

    /// Get stored items gauge
    pub fn stored_items(&self) -> u64 {
        self.stored_items.load(Ordering::Relaxed)
    }

    /// Get disk usage gauge
    pub fn disk_usage(&self) -> u64 {
        self.disk_usage.load(Ordering::Relaxed)
    }

    /// Calculate hit ratio (0.0 to 1.0)
    pub fn hit_ratio(&self) -> f64 {
        let hits = self.hits();
        let total = hits + self.misses();
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Copy all values
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            hits: self.hits(),
            misses: self.misses(),
            inserts: self.inserts(),
            evictions: self.evictions(),
            eviction_failures: self.eviction_failures(),
            gc_runs: self.gc_runs(),
            stored_items: self.stored_items(),
            disk_usage: self.disk_usage(),
            hit_ratio: self.hit_ratio(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_basic() {
        let stats = CacheStats::new();

        stats.record_hit();
        stats.record_hit();
        stats.record_miss();

        assert_eq!(stats.hits(), 2);
        assert_eq!(stats.misses(), 1);
        assert_eq!(stats.hit_ratio(), 2.0 / 3.0);
    }

    #[test]
    fn test_stored_items_gauge() {
        let stats = CacheStats::new();

        stats.record_insert();
        stats.record_insert();
        stats.record_eviction();

        assert_eq!(stats.inserts(), 2);
        assert_eq!(stats.evictions(), 1);
        assert_eq!(stats.stored_items(), 1);

        stats.record_removal();
        stats.record_removal();
        assert_eq!(stats.stored_items(), 0);
    }

    #[test]
    fn test_snapshot() {
        let stats = CacheStats::new();
        stats.record_hit();
        stats.set_disk_usage(2048);
        stats.record_gc_run();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.hits, 1);
        assert_eq!(snapshot.disk_usage, 2048);
        assert_eq!(snapshot.gc_runs, 1);
        assert_eq!(snapshot.hit_ratio, 1.0);
    }
}
