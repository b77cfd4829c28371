//! Garbage collection
//!
//! A pass only starts once usage reaches the high threshold and then evicts
//! entries in priority order until usage is at or below the low threshold.
//! The whole pass holds the store lock exclusively, so reads wait for it.

use serde::Serialize;
use tracing::{debug, error, warn};

use crate::store::{size_delta, Inner};

/// Outcome of a garbage collection pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GcReport {
    /// Whether usage had reached the high threshold
    pub triggered: bool,
    /// Usage when the pass started
    pub usage_before: f64,
    /// Usage when the pass finished
    pub usage_after: f64,
    /// Keys removed, in eviction order
    pub evicted: Vec<String>,
    /// Keys whose deletion failed; their accounting is unchanged
    pub failed: Vec<String>,
    /// Bytes released
    pub freed_bytes: u64,
}

impl Inner {
    pub(crate) fn collect_garbage(&self) -> GcReport {
        let mut report = GcReport::default();
        // unbounded stores never collect
        if self.settings.capacity == 0 {
            return report;
        }

        let mut usage = self.usage.write();
        self.stats.record_gc_run();
        report.usage_before = usage.usage;
        report.usage_after = usage.usage;

        if usage.usage < self.settings.high_threshold {
            debug!("Run gc with {:.2}% usage", usage.usage * 100.0);
            return report;
        }
        report.triggered = true;

        let candidates = self.index.deep_copy().priority_list();
        let mut candidates = candidates.into_iter();
        while usage.usage > self.settings.low_threshold {
            let Some(item) = candidates.next() else {
                warn!(
                    "Garbage collection ran out of candidates at {:.2}% usage",
                    usage.usage * 100.0
                );
                break;
            };

            match self.fs.remove_dir_all(&self.entry_path(&item.key)) {
                // a directory that is already gone only needs its accounting dropped
                Err(e) if !e.is_not_found() => {
                    error!(key = %item.key, error = %e, "Unable to delete blueprint directory");
                    self.stats.record_eviction_failure();
                    report.failed.push(item.key);
                    continue;
                }
                _ => {}
            }

            self.index.remove(&item.key);
            self.update_usage(&mut usage, -size_delta(item.size));
            self.stats.record_eviction();
            debug!(key = %item.key, size = item.size, hits = item.hits, "Garbage collected");
            report.freed_bytes += item.size;
            report.evicted.push(item.key);
        }

        report.usage_after = usage.usage;
        report
    }
}
