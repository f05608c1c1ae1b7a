//! Cache tuning configuration
//!
//! Limits are per call site. The defaults keep read and presence chains
//! small (two entries) and write chains monomorphic (one entry), which is
//! what the interpreter expects from its property access nodes.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Default maximum chain length for get sites
pub const DEFAULT_GET_CACHE_LIMIT: usize = 2;
/// Default maximum chain length for set sites
pub const DEFAULT_SET_CACHE_LIMIT: usize = 1;
/// Default maximum chain length for has sites
pub const DEFAULT_HAS_CACHE_LIMIT: usize = 2;
/// Default number of promoted hot keys per keyed site
pub const DEFAULT_HOT_KEY_SLOTS: usize = 4;
/// Samples collected before any promotion is considered
pub const MIN_SAMPLES: u32 = 100;
/// Samples after which a sampler stops unconditionally
pub const MAX_SAMPLES: u32 = 1000;
/// Own property count above which a receiver is treated as a dictionary
pub const DEFAULT_DICTIONARY_THRESHOLD: usize = 128;

/// Configuration shared by all caches created from one [`Context`](crate::ic::Context)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum entries in a get chain before it goes generic
    pub get_cache_limit: usize,
    /// Maximum entries in a set chain before it goes generic
    pub set_cache_limit: usize,
    /// Maximum entries in a has chain before it goes generic
    pub has_cache_limit: usize,
    /// Capacity of the promotion array of a keyed site
    pub hot_key_slots: usize,
    /// Minimum samples before promotion (and the abandonment check point)
    pub min_samples: u32,
    /// Sample ceiling
    pub max_samples: u32,
    /// Own property count above which receivers are not cached
    pub dictionary_threshold: usize,
    /// Fold a second layout into an existing single-layout entry when the
    /// key resolves identically in both
    pub merge_compatible_layouts: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            get_cache_limit: DEFAULT_GET_CACHE_LIMIT,
            set_cache_limit: DEFAULT_SET_CACHE_LIMIT,
            has_cache_limit: DEFAULT_HAS_CACHE_LIMIT,
            hot_key_slots: DEFAULT_HOT_KEY_SLOTS,
            min_samples: MIN_SAMPLES,
            max_samples: MAX_SAMPLES,
            dictionary_threshold: DEFAULT_DICTIONARY_THRESHOLD,
            merge_compatible_layouts: false,
        }
    }
}

impl CacheConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the get chain limit
    pub fn with_get_cache_limit(mut self, limit: usize) -> Self {
        self.get_cache_limit = limit;
        self
    }

    /// Set the set chain limit
    pub fn with_set_cache_limit(mut self, limit: usize) -> Self {
        self.set_cache_limit = limit;
        self
    }

    /// Set the has chain limit
    pub fn with_has_cache_limit(mut self, limit: usize) -> Self {
        self.has_cache_limit = limit;
        self
    }

    /// Set the number of hot-key slots
    pub fn with_hot_key_slots(mut self, slots: usize) -> Self {
        self.hot_key_slots = slots;
        self
    }

    /// Set the sampling window
    pub fn with_sampling(mut self, min_samples: u32, max_samples: u32) -> Self {
        self.min_samples = min_samples;
        self.max_samples = max_samples;
        self
    }

    /// Set the dictionary-mode threshold
    pub fn with_dictionary_threshold(mut self, threshold: usize) -> Self {
        self.dictionary_threshold = threshold;
        self
    }

    /// Enable or disable merging of compatible layouts
    pub fn with_merge_compatible_layouts(mut self, merge: bool) -> Self {
        self.merge_compatible_layouts = merge;
        self
    }

    /// Check that the limits are usable
    pub fn validate(&self) -> Result<()> {
        if self.min_samples == 0 {
            return Err(Error::ConfigError("min_samples must be at least 1".into()));
        }
        if self.max_samples < self.min_samples {
            return Err(Error::ConfigError(format!(
                "max_samples ({}) must not be below min_samples ({})",
                self.max_samples, self.min_samples
            )));
        }
        if self.dictionary_threshold == 0 {
            return Err(Error::ConfigError(
                "dictionary_threshold must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Parse a configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: CacheConfig = serde_json::from_str(json)
            .map_err(|e| Error::ConfigError(format!("invalid cache config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `SHAPESHIFT_*` environment overrides on top of the defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(v) = env_usize("SHAPESHIFT_GET_CACHE_LIMIT")? {
            config.get_cache_limit = v;
        }
        if let Some(v) = env_usize("SHAPESHIFT_SET_CACHE_LIMIT")? {
            config.set_cache_limit = v;
        }
        if let Some(v) = env_usize("SHAPESHIFT_HAS_CACHE_LIMIT")? {
            config.has_cache_limit = v;
        }
        if let Some(v) = env_usize("SHAPESHIFT_HOT_KEY_SLOTS")? {
            config.hot_key_slots = v;
        }
        if let Ok(v) = std::env::var("SHAPESHIFT_MERGE_LAYOUTS") {
            config.merge_compatible_layouts = matches!(v.as_str(), "1" | "true" | "yes");
        }
        config.validate()?;
        Ok(config)
    }
}

fn env_usize(name: &str) -> Result<Option<usize>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::ConfigError(format!("{} must be a non-negative integer, got '{}'", name, raw))),
        Err(_) => Ok(None),
    }
}
