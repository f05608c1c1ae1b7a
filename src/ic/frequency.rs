//! Frequency-based hot-key promotion
//!
//! A megamorphic keyed site records which keys it sees. A key whose share of
//! the samples exceeds `1 / (N + 1)` is promoted to one of `N` dedicated
//! single-key caches, which later accesses find with a linear scan before
//! falling back to the generic path. Sampling stops for good once every slot
//! is filled, once the sample ceiling is reached, or after `min_samples`
//! accesses that never repeated a key.

use crate::config::CacheConfig;
use crate::runtime::PropertyKey;
use parking_lot::Mutex;
use rustc_hash::FxHashMap as HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

/// What a call to [`FrequencySampler::record`] did
#[derive(Debug)]
pub enum SampleOutcome<'a, C> {
    /// Sampling has stopped
    Skipped,
    /// Counted, nothing else happened
    Recorded,
    /// The key was promoted to this cache
    Promoted(&'a C),
    /// Every sample so far was a distinct key; sampling gave up
    Abandoned,
    /// The sample ceiling was reached
    Saturated,
}

struct SamplerState {
    counts: HashMap<PropertyKey, u32>,
    total: u32,
    max: u32,
    filled: usize,
}

/// Key sampler with a fixed array of promoted caches
pub struct FrequencySampler<C> {
    promoted: Box<[OnceLock<(PropertyKey, C)>]>,
    min_samples: u32,
    max_samples: u32,
    sampling: AtomicBool,
    state: Mutex<Option<SamplerState>>,
}

impl<C> FrequencySampler<C> {
    pub fn new(config: &CacheConfig) -> Self {
        let slots = config.hot_key_slots;
        Self {
            promoted: (0..slots).map(|_| OnceLock::new()).collect(),
            min_samples: config.min_samples,
            max_samples: config.max_samples,
            sampling: AtomicBool::new(slots > 0),
            state: Mutex::new(Some(SamplerState {
                counts: HashMap::default(),
                total: 0,
                max: 0,
                filled: 0,
            })),
        }
    }

    /// Number of promotion slots
    pub fn capacity(&self) -> usize {
        self.promoted.len()
    }

    /// The dedicated cache for `key`, if it was promoted
    #[inline]
    pub fn lookup(&self, key: &PropertyKey) -> Option<&C> {
        for slot in self.promoted.iter() {
            match slot.get() {
                Some((k, cache)) if k == key => return Some(cache),
                Some(_) => continue,
                None => break,
            }
        }
        None
    }

    /// Whether samples are still being taken
    pub fn is_sampling(&self) -> bool {
        self.sampling.load(Ordering::Acquire)
    }

    /// Keys promoted so far, in promotion order
    pub fn promoted_keys(&self) -> Vec<PropertyKey> {
        self.promoted
            .iter()
            .filter_map(|slot| slot.get().map(|(k, _)| k.clone()))
            .collect()
    }

    /// Samples taken so far (0 once sampling stopped and the counts were released)
    pub fn total(&self) -> u32 {
        self.state.lock().as_ref().map(|s| s.total).unwrap_or(0)
    }

    /// Record one access to `key`; `make` builds the dedicated cache if the
    /// key is promoted
    pub fn record<F>(&self, key: &PropertyKey, make: F) -> SampleOutcome<'_, C>
    where
        F: FnOnce() -> C,
    {
        if !self.is_sampling() {
            return SampleOutcome::Skipped;
        }
        let mut guard = self.state.lock();
        let state = match guard.as_mut() {
            Some(state) => state,
            None => return SampleOutcome::Skipped,
        };

        state.total += 1;
        let count = {
            let c = state.counts.entry(key.clone()).or_insert(0);
            *c += 1;
            *c
        };
        state.max = state.max.max(count);
        let total = state.total;

        if total >= self.max_samples {
            tracing::trace!(total, "key sampler saturated");
            self.stop(&mut guard);
            return SampleOutcome::Saturated;
        }
        if total < self.min_samples {
            return SampleOutcome::Recorded;
        }
        if total == self.min_samples && state.max <= 1 {
            tracing::trace!(total, "key stream never repeats, abandoning sampler");
            self.stop(&mut guard);
            return SampleOutcome::Abandoned;
        }

        let slots = self.promoted.len() as u64;
        let filled = state.filled;
        if (count as u64) * (slots + 1) <= total as u64 || filled >= self.promoted.len() {
            return SampleOutcome::Recorded;
        }
        if self.promoted[..filled].iter().any(|s| matches!(s.get(), Some((k, _)) if k == key)) {
            return SampleOutcome::Recorded;
        }
        if self.promoted[filled].set((key.clone(), make())).is_err() {
            return SampleOutcome::Recorded;
        }
        state.filled += 1;
        tracing::trace!(key = %key, count, total, slot = filled, "promoted hot key");
        if state.filled == self.promoted.len() {
            self.stop(&mut guard);
        }
        match self.promoted[filled].get() {
            Some((_, cache)) => SampleOutcome::Promoted(cache),
            None => SampleOutcome::Recorded,
        }
    }

    /// Stop sampling and release the counts
    fn stop(&self, state: &mut Option<SamplerState>) {
        self.sampling.store(false, Ordering::Release);
        *state = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sampler() -> FrequencySampler<u32> {
        FrequencySampler::new(&CacheConfig::default())
    }

    fn key(i: usize) -> PropertyKey {
        PropertyKey::name(&format!("k{}", i))
    }

    #[test]
    fn test_unique_stream_abandons_at_min_samples() {
        let s = sampler();
        for i in 0..99 {
            assert!(matches!(s.record(&key(i), || 0), SampleOutcome::Recorded));
        }
        assert!(matches!(s.record(&key(99), || 0), SampleOutcome::Abandoned));
        assert!(!s.is_sampling());
        assert!(matches!(s.record(&key(0), || 0), SampleOutcome::Skipped));
        assert!(s.promoted_keys().is_empty());
        assert_eq!(s.total(), 0);
    }

    #[test]
    fn test_dominant_key_promoted_at_min_samples() {
        let s = sampler();
        let hot = PropertyKey::name("hot");
        let mut promoted_at = None;
        for i in 0..100 {
            let k = if i % 2 == 1 { hot.clone() } else { key(i) };
            if let SampleOutcome::Promoted(c) = s.record(&k, || 7) {
                assert_eq!(*c, 7);
                promoted_at = Some(i + 1);
            }
        }
        // 50 hits out of 100: 50 * 5 > 100
        assert_eq!(promoted_at, Some(100));
        assert_eq!(s.lookup(&hot), Some(&7));
        assert_eq!(s.promoted_keys(), vec![hot]);
    }

    #[test]
    fn test_share_at_threshold_is_not_promoted() {
        let s = sampler();
        let warm = PropertyKey::name("warm");
        // 20 of 100 samples: 20 * 5 == 100, not greater
        for i in 0..100 {
            let k = if i % 5 == 4 { warm.clone() } else { key(i) };
            s.record(&k, || 0);
        }
        assert!(s.lookup(&warm).is_none());
        assert!(s.is_sampling());
    }

    #[test]
    fn test_filling_last_slot_stops_sampling() {
        let config = CacheConfig::default().with_hot_key_slots(1);
        let s: FrequencySampler<u32> = FrequencySampler::new(&config);
        let hot = PropertyKey::name("only");
        assert_eq!(s.capacity(), 1);
        for _ in 0..100 {
            s.record(&hot, || 1);
        }
        assert!(!s.is_sampling());
        assert_eq!(s.promoted_keys(), vec![hot]);
    }

    #[test]
    fn test_ceiling_stops_before_promotion() {
        let config = CacheConfig::default().with_sampling(10, 20);
        let s: FrequencySampler<u32> = FrequencySampler::new(&config);
        let late = PropertyKey::name("late");
        for i in 0..19 {
            // Seven keys repeat, none above a fifth of the total
            s.record(&key(i % 7), || 0);
        }
        assert!(matches!(s.record(&late, || 0), SampleOutcome::Saturated));
        assert!(!s.is_sampling());
    }
}
