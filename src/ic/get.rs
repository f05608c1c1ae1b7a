//! Property read caches

use super::chain::{CacheEntry, CacheSite, CacheState, Specialization, Strategy};
use super::check::{resolve, Holder, ReceiverCheck};
use super::context::Context;
use crate::error::{messages, Error, Result};
use crate::object::{ObjectClass, PropertyMeta};
use crate::runtime::{PrimitiveKind, PropertyKey, Value};

/// Behavior of a read site
#[derive(Debug, Clone, Copy, Default)]
pub struct GetOptions {
    /// An absent property is a ReferenceError (global variable reads)
    pub required: bool,
}

impl GetOptions {
    /// Options for a read that must resolve
    pub fn required() -> Self {
        Self { required: true }
    }
}

#[derive(Clone)]
pub(crate) enum GetStrategy {
    /// Plain data slot
    Data { holder: Holder, slot: usize },
    /// Getter call with the actual receiver
    Accessor { holder: Holder, slot: usize },
    /// Property hook
    Hooked { holder: Holder, slot: usize },
    /// Not on the guarded chain
    Absent,
    /// Proxy `get` trap
    Proxy,
    /// Export binding resolution
    ModuleNamespace,
    /// Foreign member read
    Foreign,
    /// `length` of a string primitive
    StringLength,
    /// Read from undefined or null
    Nullish,
}

impl Strategy for GetStrategy {
    fn mergeable_with(&self, other: &Self) -> bool {
        match (self, other) {
            (
                GetStrategy::Data { holder: Holder::Receiver, slot: a },
                GetStrategy::Data { holder: Holder::Receiver, slot: b },
            )
            | (
                GetStrategy::Accessor { holder: Holder::Receiver, slot: a },
                GetStrategy::Accessor { holder: Holder::Receiver, slot: b },
            ) => a == b,
            _ => false,
        }
    }
}

fn present(holder: Holder, meta: PropertyMeta) -> GetStrategy {
    if meta.is_accessor() {
        GetStrategy::Accessor { holder, slot: meta.slot }
    } else if meta.is_hooked() {
        GetStrategy::Hooked { holder, slot: meta.slot }
    } else {
        GetStrategy::Data { holder, slot: meta.slot }
    }
}

/// UTF-16 length of a string, as the language reports it
pub(crate) fn string_length(s: &str) -> Value {
    Value::Int(s.encode_utf16().count() as i32)
}

/// Uncached `[[Get]]` from `target` as seen by `receiver`
pub(crate) fn generic_get(ctx: &Context, key: &PropertyKey, target: &Value, receiver: &Value) -> Result<Option<Value>> {
    match target {
        Value::Undefined | Value::Null => Err(Error::type_error(messages::cannot_read_property(
            &key.to_string(),
            &target.describe(),
        ))),
        Value::Object(obj) => obj.get_property(key, receiver),
        Value::Foreign(f) => f.read_member(key),
        Value::String(s) if key.is_name("length") => Ok(Some(string_length(s))),
        other => match other.primitive_kind().and_then(|kind| ctx.prototype_for(kind)) {
            Some(proto) => proto.get_property(key, receiver),
            None => Ok(None),
        },
    }
}

/// Inline cache for `receiver.key`
pub struct GetCache {
    site: CacheSite<GetStrategy>,
    options: GetOptions,
}

impl GetCache {
    pub fn new(ctx: &Context, key: impl Into<PropertyKey>, options: GetOptions) -> Self {
        Self {
            site: CacheSite::new(ctx, key.into(), ctx.config().get_cache_limit, "get"),
            options,
        }
    }

    pub fn key(&self) -> &PropertyKey {
        self.site.key()
    }

    pub fn state(&self) -> CacheState {
        self.site.state()
    }

    /// Number of specialized entries
    pub fn len(&self) -> usize {
        self.site.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read the property, undefined if absent
    pub fn get(&self, receiver: &Value) -> Result<Value> {
        self.get_or_default(receiver, Value::Undefined)
    }

    /// Read the property, `default` if absent
    pub fn get_or_default(&self, receiver: &Value, default: Value) -> Result<Value> {
        self.get_with_receiver(receiver, receiver, default)
    }

    /// Look the property up on `target` but run getters and traps against
    /// `receiver` (super property reads)
    pub fn get_with_receiver(&self, target: &Value, receiver: &Value, default: Value) -> Result<Value> {
        match self.lookup(target, receiver)? {
            Some(value) => Ok(value),
            None if self.options.required => {
                Err(Error::reference_error(messages::not_defined(&self.key().to_string())))
            }
            None => Ok(default),
        }
    }

    /// Read as a 32-bit integer
    pub fn get_int(&self, receiver: &Value) -> Result<i32> {
        match self.get(receiver)? {
            Value::Int(n) => Ok(n),
            other => Err(Error::unexpected(other)),
        }
    }

    /// Read as a 64-bit integer; 32-bit integers widen
    pub fn get_long(&self, receiver: &Value) -> Result<i64> {
        match self.get(receiver)? {
            Value::Int(n) => Ok(n as i64),
            Value::Long(n) => Ok(n),
            other => Err(Error::unexpected(other)),
        }
    }

    /// Read as a double; integer representations widen
    pub fn get_double(&self, receiver: &Value) -> Result<f64> {
        match self.get(receiver)? {
            Value::Int(n) => Ok(n as f64),
            Value::Long(n) => Ok(n as f64),
            Value::Number(n) => Ok(n),
            other => Err(Error::unexpected(other)),
        }
    }

    /// Read as a boolean
    pub fn get_boolean(&self, receiver: &Value) -> Result<bool> {
        match self.get(receiver)? {
            Value::Boolean(b) => Ok(b),
            other => Err(Error::unexpected(other)),
        }
    }

    fn lookup(&self, target: &Value, receiver: &Value) -> Result<Option<Value>> {
        let selected = self.site.select(target, |t| self.specialize(t))?;
        let entry = match selected.entry() {
            Some(entry) => entry,
            None => return generic_get(self.site.ctx(), self.key(), target, receiver),
        };
        match &entry.strategy {
            GetStrategy::Data { holder, slot }
            | GetStrategy::Accessor { holder, slot }
            | GetStrategy::Hooked { holder, slot } => match holder.read(&entry.check, target, *slot) {
                Some(pv) => pv.read(receiver).map(Some),
                None => generic_get(self.site.ctx(), self.key(), target, receiver),
            },
            GetStrategy::Absent => Ok(None),
            GetStrategy::Proxy | GetStrategy::ModuleNamespace => match target {
                Value::Object(obj) => obj.get_property(self.key(), receiver),
                _ => generic_get(self.site.ctx(), self.key(), target, receiver),
            },
            GetStrategy::Foreign => match target {
                Value::Foreign(f) => f.read_member(self.key()),
                _ => generic_get(self.site.ctx(), self.key(), target, receiver),
            },
            GetStrategy::StringLength => match target {
                Value::String(s) => Ok(Some(string_length(s))),
                _ => generic_get(self.site.ctx(), self.key(), target, receiver),
            },
            GetStrategy::Nullish => Err(Error::type_error(messages::cannot_read_property(
                &self.key().to_string(),
                &target.describe(),
            ))),
        }
    }

    fn specialize(&self, target: &Value) -> Result<Specialization<GetStrategy>> {
        let ctx = self.site.ctx();
        let key = self.key();
        let threshold = ctx.config().dictionary_threshold;
        let entry = match target {
            Value::Undefined | Value::Null => CacheEntry::new(ReceiverCheck::Nullish, GetStrategy::Nullish),
            Value::Foreign(_) => CacheEntry::new(ReceiverCheck::Foreign, GetStrategy::Foreign),
            Value::Object(obj) => match obj.class() {
                ObjectClass::Proxy => CacheEntry::new(ReceiverCheck::Class(ObjectClass::Proxy), GetStrategy::Proxy),
                ObjectClass::ModuleNamespace => CacheEntry::new(
                    ReceiverCheck::Class(ObjectClass::ModuleNamespace),
                    GetStrategy::ModuleNamespace,
                ),
                ObjectClass::Ordinary | ObjectClass::Function => {
                    let resolution = match resolve(obj, true, key, false, threshold) {
                        Some(r) => r,
                        None => return Ok(Specialization::Uncacheable),
                    };
                    let check = match resolution.object_check() {
                        Some(check) => check,
                        None => return Ok(Specialization::Uncacheable),
                    };
                    let strategy = match resolution.found {
                        Some((holder, meta)) => present(holder, meta),
                        None => GetStrategy::Absent,
                    };
                    CacheEntry::new(check, strategy)
                }
            },
            Value::String(_) if key.is_name("length") => CacheEntry::new(
                ReceiverCheck::Primitive {
                    kind: PrimitiveKind::String,
                    prototypes: Vec::new(),
                },
                GetStrategy::StringLength,
            ),
            primitive => {
                let kind = primitive
                    .primitive_kind()
                    .ok_or_else(|| Error::InternalError(format!("unclassified receiver {:?}", primitive)))?;
                match ctx.prototype_for(kind) {
                    None => CacheEntry::new(
                        ReceiverCheck::Primitive {
                            kind,
                            prototypes: Vec::new(),
                        },
                        GetStrategy::Absent,
                    ),
                    Some(proto) => {
                        let resolution = match resolve(proto, false, key, false, threshold) {
                            Some(r) => r,
                            None => return Ok(Specialization::Uncacheable),
                        };
                        let check = resolution.primitive_check(kind);
                        let strategy = match resolution.found {
                            Some((holder, meta)) => present(holder, meta),
                            None => GetStrategy::Absent,
                        };
                        CacheEntry::new(check, strategy)
                    }
                }
            }
        };
        Ok(Specialization::Entry(entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::object::JsObject;

    #[test]
    fn test_monomorphic_hit() {
        let ctx = Context::new();
        let cache = GetCache::new(&ctx, "get_mono", GetOptions::default());
        let obj = Value::Object(JsObject::with_properties(None, &[("get_mono", Value::Int(7))]));
        for _ in 0..3 {
            assert_eq!(cache.get(&obj).unwrap(), Value::Int(7));
        }
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.state(), CacheState::Monomorphic);
    }

    #[test]
    fn test_required_absent_is_reference_error() {
        let ctx = Context::new();
        let cache = GetCache::new(&ctx, "undeclared", GetOptions::required());
        let global = Value::Object(JsObject::new(None));
        let err = cache.get(&global).unwrap_err();
        assert!(err.is(ErrorKind::ReferenceError));
        assert_eq!(err.to_string(), "ReferenceError: undeclared is not defined");
    }

    #[test]
    fn test_nullish_receiver_is_type_error() {
        let ctx = Context::new();
        let cache = GetCache::new(&ctx, "x", GetOptions::default());
        let err = cache.get(&Value::Undefined).unwrap_err();
        assert!(err.is(ErrorKind::TypeError));
        assert_eq!(cache.state(), CacheState::Monomorphic);
    }

    #[test]
    fn test_narrow_reads() {
        let ctx = Context::new();
        let cache = GetCache::new(&ctx, "n", GetOptions::default());
        let int_obj = Value::Object(JsObject::with_properties(None, &[("n", Value::Int(3))]));
        let dbl_obj = Value::Object(JsObject::with_properties(None, &[("n", Value::Number(2.5))]));
        assert_eq!(cache.get_int(&int_obj).unwrap(), 3);
        assert_eq!(cache.get_double(&int_obj).unwrap(), 3.0);
        let err = cache.get_int(&dbl_obj).unwrap_err();
        assert_eq!(err.into_unexpected_value(), Some(Value::Number(2.5)));
        assert!(cache.get_boolean(&int_obj).is_err());
    }

    #[test]
    fn test_string_length() {
        let ctx = Context::new();
        let cache = GetCache::new(&ctx, "length", GetOptions::default());
        assert_eq!(cache.get(&Value::string("héllo")).unwrap(), Value::Int(5));
        assert_eq!(cache.get(&Value::string("")).unwrap(), Value::Int(0));
        assert_eq!(cache.len(), 1);
    }
}
