//! Shared state for a family of caches

use super::stats::{CacheStats, StatsSnapshot};
use crate::config::CacheConfig;
use crate::error::Result;
use crate::object::ObjectRef;
use crate::runtime::PrimitiveKind;
use rustc_hash::FxHashMap as HashMap;
use std::sync::Arc;

struct ContextInner {
    config: CacheConfig,
    stats: CacheStats,
    prototypes: HashMap<PrimitiveKind, ObjectRef>,
}

/// Configuration, statistics and primitive prototypes shared by caches.
/// Cloning is cheap.
#[derive(Clone)]
pub struct Context(Arc<ContextInner>);

impl Context {
    /// Context with the default configuration and no primitive prototypes
    pub fn new() -> Self {
        Self::builder().assemble()
    }

    /// Context with the given configuration, once it validates
    pub fn with_config(config: CacheConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    pub fn builder() -> ContextBuilder {
        ContextBuilder {
            config: CacheConfig::default(),
            prototypes: HashMap::default(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.0.config
    }

    pub fn stats(&self) -> &CacheStats {
        &self.0.stats
    }

    /// Shorthand for `stats().snapshot()`
    pub fn snapshot(&self) -> StatsSnapshot {
        self.0.stats.snapshot()
    }

    /// Prototype used for property lookups on primitives of `kind`
    pub fn prototype_for(&self, kind: PrimitiveKind) -> Option<&ObjectRef> {
        self.0.prototypes.get(&kind)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`Context`]
pub struct ContextBuilder {
    config: CacheConfig,
    prototypes: HashMap<PrimitiveKind, ObjectRef>,
}

impl ContextBuilder {
    pub fn config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Register the prototype consulted for primitives of `kind`
    pub fn primitive_prototype(mut self, kind: PrimitiveKind, prototype: ObjectRef) -> Self {
        self.prototypes.insert(kind, prototype);
        self
    }

    /// Build after validating the configuration
    pub fn build(self) -> Result<Context> {
        self.config.validate()?;
        Ok(self.assemble())
    }

    fn assemble(self) -> Context {
        Context(Arc::new(ContextInner {
            config: self.config,
            stats: CacheStats::default(),
            prototypes: self.prototypes,
        }))
    }
}
