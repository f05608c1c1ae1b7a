//! Keyed access sites (`receiver[key]`)
//!
//! The first key seen binds a dedicated single-key cache. A second distinct
//! key turns the site generic for good; from then on a [`FrequencySampler`]
//! watches the key stream and promotes hot keys to their own caches.

use super::context::Context;
use super::frequency::{FrequencySampler, SampleOutcome};
use super::get::{generic_get, GetCache, GetOptions};
use super::has::{generic_has, HasCache};
use super::set::{generic_set, SetCache, SetOptions};
use crate::error::{messages, Error, Result};
use crate::runtime::{PropertyKey, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

enum Route<'a, C> {
    Cache(&'a C),
    Generic,
}

struct KeyedSite<C> {
    ctx: Context,
    operation: &'static str,
    bound: OnceLock<(PropertyKey, C)>,
    generic: AtomicBool,
    sampler: FrequencySampler<C>,
}

impl<C> KeyedSite<C> {
    fn new(ctx: &Context, operation: &'static str) -> Self {
        Self {
            ctx: ctx.clone(),
            operation,
            bound: OnceLock::new(),
            generic: AtomicBool::new(false),
            sampler: FrequencySampler::new(ctx.config()),
        }
    }

    fn route<F>(&self, key: &PropertyKey, make: F) -> Route<'_, C>
    where
        F: Fn(&PropertyKey) -> C,
    {
        if !self.generic.load(Ordering::Acquire) {
            let (bound_key, cache) = self.bound.get_or_init(|| (key.clone(), make(key)));
            if bound_key == key {
                return Route::Cache(cache);
            }
            if !self.generic.swap(true, Ordering::AcqRel) {
                tracing::debug!(op = self.operation, first = %bound_key, second = %key, "keyed site saw a second key, going generic");
                self.ctx.stats().record_megamorphic();
            }
        }

        if let Some(cache) = self.sampler.lookup(key) {
            return Route::Cache(cache);
        }
        match self.sampler.record(key, || make(key)) {
            SampleOutcome::Promoted(cache) => {
                self.ctx.stats().record_promotion();
                Route::Cache(cache)
            }
            SampleOutcome::Abandoned => {
                self.ctx.stats().record_abandoned();
                Route::Generic
            }
            SampleOutcome::Saturated => {
                self.ctx.stats().record_saturated();
                Route::Generic
            }
            SampleOutcome::Recorded | SampleOutcome::Skipped => Route::Generic,
        }
    }

    fn is_generic(&self) -> bool {
        self.generic.load(Ordering::Acquire)
    }
}

/// Cache for `receiver[key]` reads
pub struct KeyedGetCache {
    site: KeyedSite<GetCache>,
}

impl KeyedGetCache {
    pub fn new(ctx: &Context) -> Self {
        Self {
            site: KeyedSite::new(ctx, "keyed get"),
        }
    }

    pub fn get(&self, receiver: &Value, key: &PropertyKey) -> Result<Value> {
        let ctx = &self.site.ctx;
        match self.site.route(key, |k| GetCache::new(ctx, k.clone(), GetOptions::default())) {
            Route::Cache(cache) => cache.get(receiver),
            Route::Generic => Ok(generic_get(ctx, key, receiver, receiver)?.unwrap_or(Value::Undefined)),
        }
    }

    /// Whether the site has seen more than one key
    pub fn is_generic(&self) -> bool {
        self.site.is_generic()
    }

    pub fn is_sampling(&self) -> bool {
        self.site.sampler.is_sampling()
    }

    /// Keys promoted to dedicated caches
    pub fn promoted_keys(&self) -> Vec<PropertyKey> {
        self.site.sampler.promoted_keys()
    }

    /// The dedicated cache for a promoted key
    pub fn promoted_cache(&self, key: &PropertyKey) -> Option<&GetCache> {
        self.site.sampler.lookup(key)
    }
}

/// Cache for `receiver[key] = value`
pub struct KeyedSetCache {
    site: KeyedSite<SetCache>,
    options: SetOptions,
}

impl KeyedSetCache {
    pub fn new(ctx: &Context, options: SetOptions) -> Self {
        Self {
            site: KeyedSite::new(ctx, "keyed set"),
            options,
        }
    }

    pub fn set(&self, receiver: &Value, key: &PropertyKey, value: Value) -> Result<()> {
        if self.try_set(receiver, key, value)? || !self.options.strict {
            return Ok(());
        }
        Err(Error::type_error(messages::read_only(&key.to_string(), &receiver.describe())))
    }

    pub fn try_set(&self, receiver: &Value, key: &PropertyKey, value: Value) -> Result<bool> {
        let ctx = &self.site.ctx;
        let options = self.options;
        match self.site.route(key, |k| SetCache::new(ctx, k.clone(), options)) {
            Route::Cache(cache) => cache.try_set(receiver, value),
            Route::Generic => generic_set(ctx, key, &self.options, receiver, receiver, value),
        }
    }

    pub fn is_generic(&self) -> bool {
        self.site.is_generic()
    }

    pub fn promoted_keys(&self) -> Vec<PropertyKey> {
        self.site.sampler.promoted_keys()
    }
}

/// Cache for `key in receiver` with a dynamic key
pub struct KeyedHasCache {
    site: KeyedSite<HasCache>,
    own_only: bool,
}

impl KeyedHasCache {
    pub fn new(ctx: &Context, own_only: bool) -> Self {
        Self {
            site: KeyedSite::new(ctx, "keyed has"),
            own_only,
        }
    }

    pub fn has(&self, receiver: &Value, key: &PropertyKey) -> Result<bool> {
        let ctx = &self.site.ctx;
        let own_only = self.own_only;
        match self.site.route(key, |k| HasCache::new(ctx, k.clone(), own_only)) {
            Route::Cache(cache) => cache.has(receiver),
            Route::Generic => generic_has(key, self.own_only, receiver),
        }
    }

    pub fn is_generic(&self) -> bool {
        self.site.is_generic()
    }

    pub fn promoted_keys(&self) -> Vec<PropertyKey> {
        self.site.sampler.promoted_keys()
    }
}
