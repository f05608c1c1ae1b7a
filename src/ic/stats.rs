//! Cache statistics
//!
//! Counters are updated with relaxed ordering on slow paths only; the fast
//! path never touches them.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters shared by every cache of one context
#[derive(Debug, Default)]
pub struct CacheStats {
    entries_added: AtomicU64,
    polymorphic_inserts: AtomicU64,
    megamorphic_rewrites: AtomicU64,
    invalidation_restarts: AtomicU64,
    layout_merges: AtomicU64,
    hot_key_promotions: AtomicU64,
    samplers_abandoned: AtomicU64,
    samplers_saturated: AtomicU64,
}

/// Point-in-time copy of [`CacheStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Specializations installed
    pub entries_added: u64,
    /// Specializations that made a chain polymorphic
    pub polymorphic_inserts: u64,
    /// Chains replaced by the generic entry
    pub megamorphic_rewrites: u64,
    /// Specializations restarted after dropping invalid entries
    pub invalidation_restarts: u64,
    /// Layouts folded into an existing entry
    pub layout_merges: u64,
    /// Keys promoted to dedicated caches
    pub hot_key_promotions: u64,
    /// Samplers that gave up on an all-unique key stream
    pub samplers_abandoned: u64,
    /// Samplers that stopped at the sample ceiling
    pub samplers_saturated: u64,
}

macro_rules! counter {
    ($record:ident, $field:ident) => {
        #[inline]
        pub(crate) fn $record(&self) {
            self.$field.fetch_add(1, Ordering::Relaxed);
        }
    };
}

impl CacheStats {
    counter!(record_entry, entries_added);
    counter!(record_polymorphic, polymorphic_inserts);
    counter!(record_megamorphic, megamorphic_rewrites);
    counter!(record_invalidation, invalidation_restarts);
    counter!(record_merge, layout_merges);
    counter!(record_promotion, hot_key_promotions);
    counter!(record_abandoned, samplers_abandoned);
    counter!(record_saturated, samplers_saturated);

    /// Copy the current counter values
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            entries_added: self.entries_added.load(Ordering::Relaxed),
            polymorphic_inserts: self.polymorphic_inserts.load(Ordering::Relaxed),
            megamorphic_rewrites: self.megamorphic_rewrites.load(Ordering::Relaxed),
            invalidation_restarts: self.invalidation_restarts.load(Ordering::Relaxed),
            layout_merges: self.layout_merges.load(Ordering::Relaxed),
            hot_key_promotions: self.hot_key_promotions.load(Ordering::Relaxed),
            samplers_abandoned: self.samplers_abandoned.load(Ordering::Relaxed),
            samplers_saturated: self.samplers_saturated.load(Ordering::Relaxed),
        }
    }
}
