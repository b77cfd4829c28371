//! Store configuration
//!
//! Field names follow the camelCase JSON form used in configuration files:
//! ```json
//! {
//!   "path": "/var/cache/blueprints",
//!   "disableCache": false,
//!   "indexMethod": "ComponentDescriptorIdentityMethod",
//!   "size": "10Gi",
//!   "gcHighThreshold": 0.85,
//!   "gcLowThreshold": 0.80,
//!   "resetInterval": "1h"
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::parser::{parse_duration, parse_quantity};

/// Default usage fraction that starts a garbage collection pass
pub const DEFAULT_GC_HIGH_THRESHOLD: f64 = 0.85;

/// Default usage fraction a garbage collection pass frees down to
pub const DEFAULT_GC_LOW_THRESHOLD: f64 = 0.80;

/// Default interval between hit counter resets
pub const DEFAULT_RESET_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// How cache keys are derived from a blueprint reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IndexMethod {
    /// Hash of the component identity and blueprint resource identity.
    /// Use when component versions are immutable.
    #[default]
    #[serde(rename = "ComponentDescriptorIdentityMethod")]
    ComponentDescriptorIdentity,

    /// Digest of the blueprint blob. Use when blueprints may change in place.
    #[serde(rename = "BlueprintDigestIndex")]
    BlueprintDigest,
}

/// Garbage collection options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GarbageCollectionConfig {
    /// Capacity as a size quantity; `"0"` means unbounded (no GC, no hit reset)
    pub size: String,

    /// Usage fraction that triggers garbage collection
    pub gc_high_threshold: f64,

    /// Usage fraction garbage collection frees down to
    pub gc_low_threshold: f64,

    /// Interval of the hit counter reset, e.g. `"1h"`
    pub reset_interval: String,

    /// Fraction of hits kept on each reset; 0 clears them
    pub preserved_hits_proportion: f64,
}

impl Default for GarbageCollectionConfig {
    fn default() -> Self {
        Self {
            size: "0".to_string(),
            gc_high_threshold: DEFAULT_GC_HIGH_THRESHOLD,
            gc_low_threshold: DEFAULT_GC_LOW_THRESHOLD,
            reset_interval: "1h".to_string(),
            preserved_hits_proportion: 0.0,
        }
    }
}

/// Resolved garbage collection settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GcSettings {
    /// Capacity in bytes; 0 is unbounded
    pub capacity: u64,
    /// Usage fraction that triggers garbage collection
    pub high_threshold: f64,
    /// Usage fraction garbage collection frees down to
    pub low_threshold: f64,
    /// Interval of the hit counter reset
    pub reset_interval: Duration,
    /// Fraction of hits kept on each reset
    pub preserved_hits_proportion: f64,
}

impl GcSettings {
    /// Settings of a store without capacity limit
    pub const fn unbounded() -> Self {
        Self {
            capacity: 0,
            high_threshold: DEFAULT_GC_HIGH_THRESHOLD,
            low_threshold: DEFAULT_GC_LOW_THRESHOLD,
            reset_interval: DEFAULT_RESET_INTERVAL,
            preserved_hits_proportion: 0.0,
        }
    }
}

impl GarbageCollectionConfig {
    /// Overlay every field of `overrides` that is set (non-empty, non-zero)
    pub fn merge(&mut self, overrides: &GarbageCollectionConfig) {
        if !overrides.size.is_empty() {
            self.size = overrides.size.clone();
        }
        if overrides.gc_high_threshold != 0.0 {
            self.gc_high_threshold = overrides.gc_high_threshold;
        }
        if overrides.gc_low_threshold != 0.0 {
            self.gc_low_threshold = overrides.gc_low_threshold;
        }
        if !overrides.reset_interval.is_empty() {
            self.reset_interval = overrides.reset_interval.clone();
        }
        if overrides.preserved_hits_proportion != 0.0 {
            self.preserved_hits_proportion = overrides.preserved_hits_proportion;
        }
    }

    /// Parse and validate. Zero thresholds and intervals fall back to the defaults.
    pub fn resolve(&self) -> Result<GcSettings> {
        let capacity = if self.size.trim().is_empty() {
            0
        } else {
            parse_quantity(&self.size)?
        };

        let high_threshold = if self.gc_high_threshold == 0.0 {
            DEFAULT_GC_HIGH_THRESHOLD
        } else {
            self.gc_high_threshold
        };
        let low_threshold = if self.gc_low_threshold == 0.0 {
            DEFAULT_GC_LOW_THRESHOLD
        } else {
            self.gc_low_threshold
        };
        if !(high_threshold.is_finite() && high_threshold > 0.0) {
            return Err(Error::Config(format!(
                "gcHighThreshold must be positive, got {}",
                high_threshold
            )));
        }
        if !(low_threshold.is_finite() && low_threshold > 0.0) {
            return Err(Error::Config(format!(
                "gcLowThreshold must be positive, got {}",
                low_threshold
            )));
        }
        if low_threshold > high_threshold {
            return Err(Error::Config(format!(
                "gcLowThreshold {} is above gcHighThreshold {}",
                low_threshold, high_threshold
            )));
        }

        let reset_interval = if self.reset_interval.trim().is_empty() {
            DEFAULT_RESET_INTERVAL
        } else {
            match parse_duration(&self.reset_interval)? {
                Duration::ZERO => DEFAULT_RESET_INTERVAL,
                interval => interval,
            }
        };

        if !(0.0..=1.0).contains(&self.preserved_hits_proportion) {
            return Err(Error::Config(format!(
                "preservedHitsProportion must be within [0, 1], got {}",
                self.preserved_hits_proportion
            )));
        }

        Ok(GcSettings {
            capacity,
            high_threshold,
            low_threshold,
            reset_interval,
            preserved_hits_proportion: self.preserved_hits_proportion,
        })
    }
}

/// Blueprint store configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreConfig {
    /// Root directory of the store; empty picks a fresh temporary directory
    pub path: PathBuf,

    /// Turn every lookup into a miss; content is still written
    pub disable_cache: bool,

    /// Key derivation method
    pub index_method: IndexMethod,

    /// Garbage collection options
    #[serde(flatten)]
    pub garbage_collection: GarbageCollectionConfig,
}

impl StoreConfig {
    /// Configuration for a store rooted at `path` with capacity `size`
    pub fn new(path: impl Into<PathBuf>, size: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            garbage_collection: GarbageCollectionConfig {
                size: size.into(),
                ..GarbageCollectionConfig::default()
            },
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_unbounded() {
        let settings = StoreConfig::default().garbage_collection.resolve().unwrap();
        assert_eq!(settings.capacity, 0);
        assert_eq!(settings.high_threshold, DEFAULT_GC_HIGH_THRESHOLD);
        assert_eq!(settings.low_threshold, DEFAULT_GC_LOW_THRESHOLD);
        assert_eq!(settings.reset_interval, DEFAULT_RESET_INTERVAL);
    }

    #[test]
    fn test_deserialize_camel_case() {
        let json = r#"{
            "path": "/cache",
            "disableCache": true,
            "indexMethod": "BlueprintDigestIndex",
            "size": "1Ki",
            "gcHighThreshold": 0.9,
            "resetInterval": "30m"
        }"#;
        let config: StoreConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.path, PathBuf::from("/cache"));
        assert!(config.disable_cache);
        assert_eq!(config.index_method, IndexMethod::BlueprintDigest);

        let settings = config.garbage_collection.resolve().unwrap();
        assert_eq!(settings.capacity, 1024);
        assert_eq!(settings.high_threshold, 0.9);
        assert_eq!(settings.low_threshold, DEFAULT_GC_LOW_THRESHOLD);
        assert_eq!(settings.reset_interval, Duration::from_secs(1800));
    }

    #[test]
    fn test_zero_values_fall_back_to_defaults() {
        let config = GarbageCollectionConfig {
            size: "1Mi".to_string(),
            gc_high_threshold: 0.0,
            gc_low_threshold: 0.0,
            reset_interval: "0".to_string(),
            preserved_hits_proportion: 0.0,
        };
        let settings = config.resolve().unwrap();
        assert_eq!(settings.high_threshold, DEFAULT_GC_HIGH_THRESHOLD);
        assert_eq!(settings.low_threshold, DEFAULT_GC_LOW_THRESHOLD);
        assert_eq!(settings.reset_interval, DEFAULT_RESET_INTERVAL);
    }

    #[test]
    fn test_low_above_high_is_rejected() {
        let config = GarbageCollectionConfig {
            gc_high_threshold: 0.5,
            gc_low_threshold: 0.7,
            ..GarbageCollectionConfig::default()
        };
        assert!(matches!(config.resolve(), Err(Error::Config(_))));
    }

    #[test]
    fn test_negative_threshold_is_rejected() {
        let config = GarbageCollectionConfig {
            gc_high_threshold: -1.0,
            gc_low_threshold: -2.0,
            ..GarbageCollectionConfig::default()
        };
        assert!(matches!(config.resolve(), Err(Error::Config(_))));
    }

    #[test]
    fn test_invalid_size_is_rejected() {
        let config = GarbageCollectionConfig {
            size: "lots".to_string(),
            ..GarbageCollectionConfig::default()
        };
        assert!(matches!(config.resolve(), Err(Error::Parse(_))));
    }

    #[test]
    fn test_merge_overlays_set_fields() {
        let mut base = GarbageCollectionConfig::default();
        base.merge(&GarbageCollectionConfig {
            size: "2Gi".to_string(),
            gc_high_threshold: 0.0,
            gc_low_threshold: 0.5,
            reset_interval: String::new(),
            preserved_hits_proportion: 0.25,
        });

        assert_eq!(base.size, "2Gi");
        assert_eq!(base.gc_high_threshold, DEFAULT_GC_HIGH_THRESHOLD);
        assert_eq!(base.gc_low_threshold, 0.5);
        assert_eq!(base.reset_interval, "1h");
        assert_eq!(base.preserved_hits_proportion, 0.25);
    }
}
