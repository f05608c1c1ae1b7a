//! Cache chains
//!
//! A [`CacheSite`] owns the chain of one property access site. The chain is
//! an immutable vector of entries published behind an `Arc`; readers clone
//! the `Arc` and walk a stable snapshot. All rewrites happen under the
//! site's slow-path lock: the new chain is built aside and swapped in.
//!
//! Once a chain would exceed its limit it is replaced by the generic entry.
//! That transition happens once and is never undone.

use super::check::ReceiverCheck;
use super::context::Context;
use crate::error::Result;
use crate::runtime::{PropertyKey, Value};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Layouts one combined-shape entry may absorb
const MAX_COMBINED_SHAPES: usize = 12;

/// Per-strategy hooks used by the chain machinery
pub(crate) trait Strategy: Clone {
    /// Extra validity beyond the receiver check (e.g. a transition target shape)
    fn is_valid(&self) -> bool {
        true
    }

    /// Whether an entry with this strategy may absorb another layout that
    /// produced `other`
    fn mergeable_with(&self, _other: &Self) -> bool {
        false
    }
}

/// One specialization: guard plus strategy
#[derive(Clone)]
pub(crate) struct CacheEntry<S> {
    pub(crate) check: ReceiverCheck,
    pub(crate) strategy: S,
}

impl<S: Strategy> CacheEntry<S> {
    pub(crate) fn new(check: ReceiverCheck, strategy: S) -> Self {
        Self { check, strategy }
    }

    #[inline]
    fn is_valid(&self) -> bool {
        self.check.is_valid() && self.strategy.is_valid()
    }
}

/// Published chain contents
pub(crate) struct Chain<S> {
    entries: Vec<CacheEntry<S>>,
    generic: bool,
}

impl<S> Chain<S> {
    fn empty() -> Self {
        Self {
            entries: Vec::new(),
            generic: false,
        }
    }

    fn generic() -> Self {
        Self {
            entries: Vec::new(),
            generic: true,
        }
    }
}

/// Observable state of a site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CacheState {
    /// Never executed
    Uninitialized,
    /// One specialization
    Monomorphic,
    /// Several specializations
    Polymorphic,
    /// Overflowed into the generic entry
    Megamorphic,
}

impl fmt::Display for CacheState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheState::Uninitialized => write!(f, "uninitialized"),
            CacheState::Monomorphic => write!(f, "monomorphic"),
            CacheState::Polymorphic => write!(f, "polymorphic"),
            CacheState::Megamorphic => write!(f, "megamorphic"),
        }
    }
}

/// The entry chosen for a receiver
pub(crate) struct Selected<S> {
    chain: Arc<Chain<S>>,
    index: Option<usize>,
}

impl<S> Selected<S> {
    /// The specialized entry, or `None` for the generic path
    #[inline]
    pub(crate) fn entry(&self) -> Option<&CacheEntry<S>> {
        self.index.map(|i| &self.chain.entries[i])
    }
}

/// Result of building a specialization for a receiver
pub(crate) enum Specialization<S> {
    /// Install this entry
    Entry(CacheEntry<S>),
    /// The receiver cannot be cached; go generic
    Uncacheable,
}

/// Chain owner of one call site
pub(crate) struct CacheSite<S> {
    ctx: Context,
    key: PropertyKey,
    limit: usize,
    operation: &'static str,
    chain: RwLock<Arc<Chain<S>>>,
    slow_path: Mutex<()>,
}

impl<S: Strategy> CacheSite<S> {
    pub(crate) fn new(ctx: &Context, key: PropertyKey, limit: usize, operation: &'static str) -> Self {
        Self {
            ctx: ctx.clone(),
            key,
            limit,
            operation,
            chain: RwLock::new(Arc::new(Chain::empty())),
            slow_path: Mutex::new(()),
        }
    }

    pub(crate) fn ctx(&self) -> &Context {
        &self.ctx
    }

    pub(crate) fn key(&self) -> &PropertyKey {
        &self.key
    }

    #[inline]
    fn current(&self) -> Arc<Chain<S>> {
        self.chain.read().clone()
    }

    fn publish(&self, chain: Chain<S>) -> Arc<Chain<S>> {
        let chain = Arc::new(chain);
        *self.chain.write() = chain.clone();
        chain
    }

    /// Number of specialized entries
    pub(crate) fn len(&self) -> usize {
        self.current().entries.len()
    }

    pub(crate) fn state(&self) -> CacheState {
        let chain = self.current();
        if chain.generic {
            CacheState::Megamorphic
        } else {
            match chain.entries.len() {
                0 => CacheState::Uninitialized,
                1 => CacheState::Monomorphic,
                _ => CacheState::Polymorphic,
            }
        }
    }

    /// Select the entry for `receiver`, specializing on a miss
    #[inline]
    pub(crate) fn select<F>(&self, receiver: &Value, build: F) -> Result<Selected<S>>
    where
        F: FnOnce(&Value) -> Result<Specialization<S>>,
    {
        let chain = self.current();
        if chain.generic {
            return Ok(Selected { chain, index: None });
        }
        for (i, entry) in chain.entries.iter().enumerate() {
            if entry.check.accepts(receiver) {
                if entry.is_valid() {
                    return Ok(Selected { chain, index: Some(i) });
                }
                break;
            }
        }
        self.specialize(receiver, build)
    }

    #[cold]
    fn specialize<F>(&self, receiver: &Value, build: F) -> Result<Selected<S>>
    where
        F: FnOnce(&Value) -> Result<Specialization<S>>,
    {
        let _guard = self.slow_path.lock();
        let chain = loop {
            let chain = self.current();
            if chain.generic {
                return Ok(Selected { chain, index: None });
            }
            if chain.entries.iter().any(|e| !e.is_valid()) {
                let kept: Vec<_> = chain.entries.iter().filter(|e| e.is_valid()).cloned().collect();
                tracing::debug!(
                    op = self.operation,
                    key = %self.key,
                    dropped = chain.entries.len() - kept.len(),
                    "dropping invalid cache entries"
                );
                self.ctx.stats().record_invalidation();
                self.publish(Chain { entries: kept, generic: false });
                continue;
            }
            if let Some(i) = chain.entries.iter().position(|e| e.check.accepts(receiver)) {
                return Ok(Selected { chain, index: Some(i) });
            }
            break chain;
        };

        let entry = match build(receiver)? {
            Specialization::Entry(entry) => entry,
            Specialization::Uncacheable => {
                tracing::debug!(op = self.operation, key = %self.key, "uncacheable receiver, going generic");
                self.ctx.stats().record_megamorphic();
                let chain = self.publish(Chain::generic());
                return Ok(Selected { chain, index: None });
            }
        };

        if self.ctx.config().merge_compatible_layouts {
            if let Some(merged) = self.try_merge(&chain, &entry) {
                self.ctx.stats().record_merge();
                let chain = self.publish(merged);
                return Ok(Selected { chain, index: Some(0) });
            }
        }

        let mut entries = chain.entries.clone();
        entries.push(entry);
        if entries.len() > self.limit {
            tracing::debug!(
                op = self.operation,
                key = %self.key,
                limit = self.limit,
                "cache chain overflow, rewriting to generic"
            );
            self.ctx.stats().record_megamorphic();
            let chain = self.publish(Chain::generic());
            return Ok(Selected { chain, index: None });
        }

        self.ctx.stats().record_entry();
        if entries.len() > 1 {
            tracing::debug!(op = self.operation, key = %self.key, entries = entries.len(), "cache site polymorphic");
            self.ctx.stats().record_polymorphic();
        }
        let index = entries.len() - 1;
        let chain = self.publish(Chain { entries, generic: false });
        Ok(Selected { chain, index: Some(index) })
    }

    /// Fold `entry` into a lone shape or combined-shape entry when every
    /// layout resolves the key the same way
    fn try_merge(&self, chain: &Chain<S>, entry: &CacheEntry<S>) -> Option<Chain<S>> {
        let existing = match chain.entries.as_slice() {
            [only] => only,
            _ => return None,
        };
        let (shapes, new_shape) = match (existing.check.layout_shapes(), entry.check.single_shape()) {
            (Some(shapes), Some(b)) if shapes.len() < MAX_COMBINED_SHAPES => (shapes, b),
            _ => return None,
        };
        if !existing.strategy.mergeable_with(&entry.strategy) {
            return None;
        }
        let meta = new_shape.lookup(&self.key)?;
        if shapes.iter().any(|s| s.lookup(&self.key) != Some(meta)) {
            return None;
        }
        tracing::debug!(op = self.operation, key = %self.key, layouts = shapes.len() + 1, "merging compatible layouts");
        let mut combined = shapes.to_vec();
        combined.push(new_shape.clone());
        Some(Chain {
            entries: vec![CacheEntry::new(
                ReceiverCheck::CombinedShape(combined),
                existing.strategy.clone(),
            )],
            generic: false,
        })
    }
}
