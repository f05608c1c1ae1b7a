//! Property presence caches (`key in receiver`, own-property checks)

use super::chain::{CacheEntry, CacheSite, CacheState, Specialization, Strategy};
use super::check::{resolve, ReceiverCheck};
use super::context::Context;
use crate::error::{messages, Error, Result};
use crate::object::ObjectClass;
use crate::runtime::{PropertyKey, Value};

#[derive(Clone)]
pub(crate) enum HasStrategy {
    Present,
    Absent,
    /// Proxy `has` trap
    Proxy,
    /// Full export binding resolution
    ModuleNamespace,
    Foreign,
    /// Own-property check on a primitive
    PrimitiveOwn,
    /// `in` on a non-object
    NotAnObject,
}

impl Strategy for HasStrategy {
    fn mergeable_with(&self, other: &Self) -> bool {
        matches!(
            (self, other),
            (HasStrategy::Present, HasStrategy::Present) | (HasStrategy::Absent, HasStrategy::Absent)
        )
    }
}

/// Own properties of a primitive: a string has `length` and its indices
fn primitive_has_own(key: &PropertyKey, receiver: &Value) -> bool {
    let s = match receiver {
        Value::String(s) => s,
        _ => return false,
    };
    if key.is_name("length") {
        return true;
    }
    let atom = match key.as_atom() {
        Some(atom) => atom,
        None => return false,
    };
    let name = atom.as_str();
    match name.parse::<usize>() {
        Ok(index) => index.to_string() == *name && index < s.encode_utf16().count(),
        Err(_) => false,
    }
}

fn not_an_object(key: &PropertyKey, receiver: &Value) -> Error {
    Error::type_error(messages::cannot_use_in(&key.to_string(), &receiver.describe()))
}

/// Uncached presence check
pub(crate) fn generic_has(key: &PropertyKey, own_only: bool, receiver: &Value) -> Result<bool> {
    match receiver {
        Value::Object(obj) if own_only => obj.has_own_property(key),
        Value::Object(obj) => obj.has_property(key),
        Value::Foreign(f) => f.has_member(key),
        Value::Undefined | Value::Null => Err(not_an_object(key, receiver)),
        other if own_only => Ok(primitive_has_own(key, other)),
        other => Err(not_an_object(key, other)),
    }
}

/// Inline cache for `key in receiver`, or an own-property check
pub struct HasCache {
    site: CacheSite<HasStrategy>,
    own_only: bool,
}

impl HasCache {
    pub fn new(ctx: &Context, key: impl Into<PropertyKey>, own_only: bool) -> Self {
        Self {
            site: CacheSite::new(ctx, key.into(), ctx.config().has_cache_limit, "has"),
            own_only,
        }
    }

    pub fn key(&self) -> &PropertyKey {
        self.site.key()
    }

    pub fn state(&self) -> CacheState {
        self.site.state()
    }

    pub fn len(&self) -> usize {
        self.site.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has(&self, receiver: &Value) -> Result<bool> {
        let selected = self.site.select(receiver, |r| self.specialize(r))?;
        let entry = match selected.entry() {
            Some(entry) => entry,
            None => return generic_has(self.key(), self.own_only, receiver),
        };
        match entry.strategy {
            HasStrategy::Present => Ok(true),
            HasStrategy::Absent => Ok(false),
            HasStrategy::PrimitiveOwn => Ok(primitive_has_own(self.key(), receiver)),
            HasStrategy::NotAnObject => Err(not_an_object(self.key(), receiver)),
            HasStrategy::Proxy | HasStrategy::ModuleNamespace | HasStrategy::Foreign => {
                generic_has(self.key(), self.own_only, receiver)
            }
        }
    }

    fn specialize(&self, receiver: &Value) -> Result<Specialization<HasStrategy>> {
        let entry = match receiver {
            Value::Undefined | Value::Null => CacheEntry::new(ReceiverCheck::Nullish, HasStrategy::NotAnObject),
            Value::Foreign(_) => CacheEntry::new(ReceiverCheck::Foreign, HasStrategy::Foreign),
            Value::Object(obj) => match obj.class() {
                ObjectClass::Proxy => CacheEntry::new(ReceiverCheck::Class(ObjectClass::Proxy), HasStrategy::Proxy),
                ObjectClass::ModuleNamespace => CacheEntry::new(
                    ReceiverCheck::Class(ObjectClass::ModuleNamespace),
                    HasStrategy::ModuleNamespace,
                ),
                ObjectClass::Ordinary | ObjectClass::Function => {
                    let threshold = self.site.ctx().config().dictionary_threshold;
                    let resolution = match resolve(obj, true, self.key(), self.own_only, threshold) {
                        Some(r) => r,
                        None => return Ok(Specialization::Uncacheable),
                    };
                    let check = match resolution.object_check() {
                        Some(check) => check,
                        None => return Ok(Specialization::Uncacheable),
                    };
                    let strategy = if resolution.found.is_some() {
                        HasStrategy::Present
                    } else {
                        HasStrategy::Absent
                    };
                    CacheEntry::new(check, strategy)
                }
            },
            primitive => {
                let kind = primitive
                    .primitive_kind()
                    .ok_or_else(|| Error::InternalError(format!("unclassified receiver {:?}", primitive)))?;
                let strategy = if self.own_only {
                    HasStrategy::PrimitiveOwn
                } else {
                    HasStrategy::NotAnObject
                };
                CacheEntry::new(
                    ReceiverCheck::Primitive {
                        kind,
                        prototypes: Vec::new(),
                    },
                    strategy,
                )
            }
        };
        Ok(Specialization::Entry(entry))
    }
}
