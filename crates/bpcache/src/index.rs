//! In-memory index of cached entries
//!
//! Tracks size, creation time and hit count per key. Eviction order is a
//! weighted score of hits and age, each normalized over the current entries:
//! few hits and old age evict first.

use std::collections::HashMap;

use ahash::RandomState;
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

const HITS_WEIGHT: f64 = 0.6;
const AGE_WEIGHT: f64 = 0.4;

/// Bookkeeping for one cached entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Cache key, also the directory name of the entry
    pub key: String,
    /// Size of the entry on disk in bytes
    pub size: u64,
    /// When the entry was stored
    pub created_at: DateTime<Utc>,
    /// Hits since the last reset
    pub hits: u64,
}

/// Value ranges used to normalize priorities
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriorityBounds {
    /// Smallest hit count
    pub min_hits: u64,
    /// Largest hit count
    pub max_hits: u64,
    /// Earliest creation time
    pub oldest: DateTime<Utc>,
    /// Latest creation time
    pub newest: DateTime<Utc>,
}

impl PriorityBounds {
    /// Bounds over `entries`, or `None` if there are none
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a IndexEntry>) -> Option<Self> {
        let mut iter = entries.into_iter();
        let first = iter.next()?;
        let mut bounds = PriorityBounds {
            min_hits: first.hits,
            max_hits: first.hits,
            oldest: first.created_at,
            newest: first.created_at,
        };
        for entry in iter {
            bounds.min_hits = bounds.min_hits.min(entry.hits);
            bounds.max_hits = bounds.max_hits.max(entry.hits);
            bounds.oldest = bounds.oldest.min(entry.created_at);
            bounds.newest = bounds.newest.max(entry.created_at);
        }
        Some(bounds)
    }
}

fn seconds(delta: TimeDelta) -> f64 {
    delta
        .num_microseconds()
        .map_or(delta.num_seconds() as f64, |us| us as f64 / 1_000_000.0)
}

/// GC priority of an entry in `[0, 1]`; lower is evicted first.
///
/// `0.6 * normalized hits + 0.4 * normalized recency`. A component is 0 when
/// all entries share the same value.
pub fn calculate_priority(entry: &IndexEntry, bounds: &PriorityBounds) -> f64 {
    let hit_range = bounds.max_hits.saturating_sub(bounds.min_hits);
    let hits = if hit_range == 0 {
        0.0
    } else {
        entry.hits.saturating_sub(bounds.min_hits) as f64 / hit_range as f64
    };

    let age_range = seconds(bounds.newest - bounds.oldest);
    let recency = if age_range <= 0.0 {
        0.0
    } else {
        seconds(entry.created_at - bounds.oldest) / age_range
    };

    hits * HITS_WEIGHT + recency * AGE_WEIGHT
}

/// Map from cache key to [`IndexEntry`]
#[derive(Debug, Default)]
pub struct Index {
    entries: RwLock<HashMap<String, IndexEntry, RandomState>>,
}

impl Index {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite an entry. An overwritten entry starts with zero hits.
    pub fn add(&self, key: &str, size: u64, created_at: DateTime<Utc>) {
        self.entries.write().insert(
            key.to_string(),
            IndexEntry {
                key: key.to_string(),
                size,
                created_at,
                hits: 0,
            },
        );
    }

    /// Count a hit. Unknown keys are ignored; returns whether the key was known.
    pub fn hit(&self, key: &str) -> bool {
        match self.entries.write().get_mut(key) {
            Some(entry) => {
                entry.hits += 1;
                true
            }
            None => false,
        }
    }

    /// Zero the hit counter of every entry
    pub fn reset(&self) {
        for entry in self.entries.write().values_mut() {
            entry.hits = 0;
        }
    }

    /// Keep `floor(hits * preserved)` of every hit counter
    pub fn decay(&self, preserved: f64) {
        let preserved = preserved.clamp(0.0, 1.0);
        for entry in self.entries.write().values_mut() {
            entry.hits = (entry.hits as f64 * preserved).floor() as u64;
        }
    }

    /// Remove an entry
    pub fn remove(&self, key: &str) -> Option<IndexEntry> {
        self.entries.write().remove(key)
    }

    /// Copy of the entry for `key`
    pub fn get(&self, key: &str) -> Option<IndexEntry> {
        self.entries.read().get(key).cloned()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the index is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Remove all entries
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Sum of all entry sizes
    pub fn total_size(&self) -> u64 {
        self.entries.read().values().map(|e| e.size).sum()
    }

    /// All entries, sorted by key
    pub fn entries(&self) -> Vec<IndexEntry> {
        let mut entries: Vec<_> = self.entries.read().values().cloned().collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        entries
    }

    /// Independent snapshot of the index
    pub fn deep_copy(&self) -> Index {
        Index {
            entries: RwLock::new(self.entries.read().clone()),
        }
    }

    /// Entries ordered from most to least evictable.
    ///
    /// Equal priorities fall back to the older entry first; entries that are
    /// still tied are ordered by a hash seeded freshly on every call.
    pub fn priority_list(&self) -> Vec<IndexEntry> {
        let entries: Vec<IndexEntry> = self.entries.read().values().cloned().collect();
        let Some(bounds) = PriorityBounds::from_entries(&entries) else {
            return entries;
        };

        let tie_breaker = RandomState::new();
        let mut scored: Vec<(f64, u64, IndexEntry)> = entries
            .into_iter()
            .map(|entry| {
                (
                    calculate_priority(&entry, &bounds),
                    tie_breaker.hash_one(&entry.key),
                    entry,
                )
            })
            .collect();

        scored.sort_by(|a, b| {
            a.0.total_cmp(&b.0)
                .then_with(|| a.2.created_at.cmp(&b.2.created_at))
                .then_with(|| a.1.cmp(&b.1))
        });
        scored.into_iter().map(|(_, _, entry)| entry).collect()
    }
}
