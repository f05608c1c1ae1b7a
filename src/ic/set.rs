//! Property write caches

use super::chain::{CacheEntry, CacheSite, CacheState, Specialization, Strategy};
use super::check::{resolve, Holder, ReceiverCheck, Resolution};
use super::context::Context;
use crate::error::{messages, Error, Result};
use crate::object::{set_on_receiver, ObjectClass, ObjectRef, PropertyFlags, PropertyValue, Shape};
use crate::runtime::{call, PropertyKey, Value};
use std::sync::Arc;

/// Behavior of a write site
#[derive(Debug, Clone, Copy)]
pub struct SetOptions {
    /// A rejected assignment raises TypeError
    pub strict: bool,
    /// Define an own data property, bypassing setters and prototypes
    pub define_own: bool,
    /// The site writes `super.key`: lookup starts at the home prototype,
    /// the property lands on the receiver
    pub super_property: bool,
    /// The site assigns a global variable: in strict mode an unresolvable
    /// name is a ReferenceError
    pub global_binding: bool,
    /// Attributes for properties created by `define_own`
    pub attributes: PropertyFlags,
}

impl Default for SetOptions {
    fn default() -> Self {
        Self {
            strict: false,
            define_own: false,
            super_property: false,
            global_binding: false,
            attributes: PropertyFlags::default(),
        }
    }
}

impl SetOptions {
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }

    /// Own-property definition with the given attributes
    pub fn define_own(attributes: PropertyFlags) -> Self {
        Self {
            define_own: true,
            attributes: attributes.attributes(),
            ..Self::default()
        }
    }

    pub fn super_property(mut self) -> Self {
        self.super_property = true;
        self
    }

    pub fn global_binding(mut self) -> Self {
        self.global_binding = true;
        self
    }
}

#[derive(Clone)]
pub(crate) enum SetStrategy {
    /// Overwrite an own writable data slot
    Data { slot: usize },
    /// Route the write through a property hook
    Hooked { holder: Holder, slot: usize },
    /// Call the setter found on the chain
    Accessor { holder: Holder, slot: usize },
    /// Append the property, moving the receiver from `from` to `to`
    Transition { from: Shape, to: Shape },
    /// Read-only property or non-extensible receiver
    ReadOnly,
    /// Proxy `set` trap
    Proxy,
    /// Namespaces reject writes
    ModuleNamespace,
    /// Foreign member write
    Foreign,
    /// Ordinary set on the effective receiver
    ReceiverDefine,
    /// Own-property definition through the object model
    DefineSlow,
    /// Strict assignment to an undeclared global
    Unresolvable,
    /// Write to undefined or null
    Nullish,
}

impl Strategy for SetStrategy {
    fn is_valid(&self) -> bool {
        match self {
            SetStrategy::Transition { to, .. } => to.is_valid(),
            _ => true,
        }
    }

    fn mergeable_with(&self, other: &Self) -> bool {
        matches!(
            (self, other),
            (SetStrategy::Data { slot: a }, SetStrategy::Data { slot: b }) if a == b
        )
    }
}

fn same_object(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Object(x), Value::Object(y)) => Arc::ptr_eq(x, y),
        _ => false,
    }
}

/// Uncached `[[Set]]` (or own-property definition) on `target` with `receiver`
pub(crate) fn generic_set(
    ctx: &Context,
    key: &PropertyKey,
    options: &SetOptions,
    target: &Value,
    receiver: &Value,
    value: Value,
) -> Result<bool> {
    match target {
        Value::Undefined | Value::Null => Err(Error::type_error(messages::cannot_set_property(
            &key.to_string(),
            &target.describe(),
        ))),
        Value::Object(obj) if options.define_own => {
            obj.define_own_property(key, PropertyValue::Data(value), options.attributes)
        }
        Value::Object(obj) => {
            if options.global_binding && options.strict && !obj.has_property(key)? {
                return Err(Error::reference_error(messages::not_defined(&key.to_string())));
            }
            obj.set(key, value, receiver)
        }
        Value::Foreign(f) => f.write_member(key, value),
        other => match other.primitive_kind().and_then(|kind| ctx.prototype_for(kind)) {
            Some(proto) => proto.set(key, value, receiver),
            None => Ok(false),
        },
    }
}

/// Inline cache for `receiver.key = value`
pub struct SetCache {
    site: CacheSite<SetStrategy>,
    options: SetOptions,
}

impl SetCache {
    pub fn new(ctx: &Context, key: impl Into<PropertyKey>, options: SetOptions) -> Self {
        Self {
            site: CacheSite::new(ctx, key.into(), ctx.config().set_cache_limit, "set"),
            options,
        }
    }

    pub fn key(&self) -> &PropertyKey {
        self.site.key()
    }

    pub fn options(&self) -> &SetOptions {
        &self.options
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

    /// Assign; a rejected assignment raises TypeError in strict mode and is
    /// ignored otherwise
    pub fn set(&self, receiver: &Value, value: Value) -> Result<()> {
        self.set_with_receiver(receiver, receiver, value)
    }

    /// Assign starting the lookup at `target`, with `receiver` as the
    /// effective receiver
    pub fn set_with_receiver(&self, target: &Value, receiver: &Value, value: Value) -> Result<()> {
        if self.try_set_with_receiver(target, receiver, value)? || !self.options.strict {
            return Ok(());
        }
        let key = self.key().to_string();
        let message = match target {
            Value::Object(_) | Value::Foreign(_) => messages::read_only(&key, &target.describe()),
            _ => messages::cannot_set_property(&key, &target.describe()),
        };
        Err(Error::type_error(message))
    }

    /// Assign and report whether the assignment took effect
    pub fn try_set(&self, receiver: &Value, value: Value) -> Result<bool> {
        self.try_set_with_receiver(receiver, receiver, value)
    }

    pub fn try_set_with_receiver(&self, target: &Value, receiver: &Value, value: Value) -> Result<bool> {
        let selected = self.site.select(target, |t| self.specialize(t))?;
        let entry = match selected.entry() {
            Some(entry) => entry,
            None => return self.generic(target, receiver, value),
        };
        match &entry.strategy {
            SetStrategy::Data { slot } => {
                if !same_object(target, receiver) {
                    return set_on_receiver(self.key(), value, receiver);
                }
                match target.as_object() {
                    Some(obj) => match obj.write_slot_where(*slot, value, |shape| entry.check.accepts_shape(shape)) {
                        Ok(()) => Ok(true),
                        Err(value) => self.generic(target, receiver, value),
                    },
                    None => self.generic(target, receiver, value),
                }
            }
            SetStrategy::Transition { from, to } => {
                if !same_object(target, receiver) {
                    return set_on_receiver(self.key(), value, receiver);
                }
                match target.as_object() {
                    Some(obj) => match obj.transition_if(from, to, value) {
                        Ok(()) => Ok(true),
                        Err(value) => self.generic(target, receiver, value),
                    },
                    None => self.generic(target, receiver, value),
                }
            }
            SetStrategy::Accessor { holder, slot } | SetStrategy::Hooked { holder, slot } => {
                match holder.read(&entry.check, target, *slot) {
                    Some(PropertyValue::Accessor { setter: Some(setter), .. }) => {
                        call(&setter, receiver, &[value])?;
                        Ok(true)
                    }
                    Some(PropertyValue::Accessor { setter: None, .. }) => Ok(false),
                    Some(PropertyValue::Hooked(hook)) => hook.set(receiver, value),
                    _ => self.generic(target, receiver, value),
                }
            }
            SetStrategy::ReadOnly | SetStrategy::ModuleNamespace => Ok(false),
            SetStrategy::Proxy => match target {
                Value::Object(obj) if self.options.define_own => {
                    obj.define_own_property(self.key(), PropertyValue::Data(value), self.options.attributes)
                }
                Value::Object(obj) => obj.set(self.key(), value, receiver),
                _ => self.generic(target, receiver, value),
            },
            SetStrategy::Foreign => match target {
                Value::Foreign(f) => f.write_member(self.key(), value),
                _ => self.generic(target, receiver, value),
            },
            SetStrategy::ReceiverDefine => set_on_receiver(self.key(), value, receiver),
            SetStrategy::DefineSlow => match target {
                Value::Object(obj) => {
                    obj.define_own_property(self.key(), PropertyValue::Data(value), self.options.attributes)
                }
                _ => self.generic(target, receiver, value),
            },
            SetStrategy::Unresolvable => Err(Error::reference_error(messages::not_defined(&self.key().to_string()))),
            SetStrategy::Nullish => Err(Error::type_error(messages::cannot_set_property(
                &self.key().to_string(),
                &target.describe(),
            ))),
        }
    }

    fn generic(&self, target: &Value, receiver: &Value, value: Value) -> Result<bool> {
        generic_set(self.site.ctx(), self.key(), &self.options, target, receiver, value)
    }

    fn specialize(&self, target: &Value) -> Result<Specialization<SetStrategy>> {
        let ctx = self.site.ctx();
        let key = self.key();
        let threshold = ctx.config().dictionary_threshold;
        let entry = match target {
            Value::Undefined | Value::Null => CacheEntry::new(ReceiverCheck::Nullish, SetStrategy::Nullish),
            Value::Foreign(_) => CacheEntry::new(ReceiverCheck::Foreign, SetStrategy::Foreign),
            Value::Object(obj) => match obj.class() {
                ObjectClass::Proxy => CacheEntry::new(ReceiverCheck::Class(ObjectClass::Proxy), SetStrategy::Proxy),
                ObjectClass::ModuleNamespace => CacheEntry::new(
                    ReceiverCheck::Class(ObjectClass::ModuleNamespace),
                    SetStrategy::ModuleNamespace,
                ),
                ObjectClass::Ordinary | ObjectClass::Function => {
                    let resolution = match resolve(obj, true, key, self.options.define_own, threshold) {
                        Some(r) => r,
                        None => return Ok(Specialization::Uncacheable),
                    };
                    let check = match resolution.object_check() {
                        Some(check) => check,
                        None => return Ok(Specialization::Uncacheable),
                    };
                    let strategy = if self.options.define_own {
                        self.define_strategy(&resolution)
                    } else {
                        self.assign_strategy(obj, resolution)
                    };
                    CacheEntry::new(check, strategy)
                }
            },
            primitive => {
                let kind = primitive
                    .primitive_kind()
                    .ok_or_else(|| Error::InternalError(format!("unclassified receiver {:?}", primitive)))?;
                let resolution = match ctx.prototype_for(kind) {
                    Some(proto) => match resolve(proto, false, key, false, threshold) {
                        Some(r) => r,
                        None => return Ok(Specialization::Uncacheable),
                    },
                    None => Resolution {
                        receiver: None,
                        prototypes: Vec::new(),
                        found: None,
                    },
                };
                // Primitives have no own properties: only an inherited setter or hook can accept the write.
                let strategy = match &resolution.found {
                    Some((holder, meta)) if meta.is_accessor() => SetStrategy::Accessor {
                        holder: holder.clone(),
                        slot: meta.slot,
                    },
                    Some((holder, meta)) if meta.is_hooked() => SetStrategy::Hooked {
                        holder: holder.clone(),
                        slot: meta.slot,
                    },
                    _ => SetStrategy::ReadOnly,
                };
                CacheEntry::new(resolution.primitive_check(kind), strategy)
            }
        };
        Ok(Specialization::Entry(entry))
    }

    fn define_strategy(&self, resolution: &Resolution) -> SetStrategy {
        let attributes = self.options.attributes;
        match (&resolution.found, &resolution.receiver) {
            (Some((_, meta)), _) if meta.is_data() && meta.flags.attributes() == attributes => {
                SetStrategy::Data { slot: meta.slot }
            }
            (Some(_), _) => SetStrategy::DefineSlow,
            (None, Some(shape)) if shape.is_extensible() => SetStrategy::Transition {
                from: shape.clone(),
                to: shape.child_shape_for(self.key(), attributes),
            },
            (None, _) => SetStrategy::ReadOnly,
        }
    }

    fn assign_strategy(&self, obj: &ObjectRef, resolution: Resolution) -> SetStrategy {
        let receiver_shape = resolution.receiver.clone();
        let add_property = || match &receiver_shape {
            Some(shape) if shape.is_extensible() && !self.options.super_property => SetStrategy::Transition {
                from: shape.clone(),
                to: shape.child_shape_for(self.key(), PropertyFlags::default()),
            },
            Some(shape) if !shape.is_extensible() => SetStrategy::ReadOnly,
            _ => SetStrategy::ReceiverDefine,
        };
        match resolution.found {
            Some((holder, meta)) if meta.is_accessor() => SetStrategy::Accessor { holder, slot: meta.slot },
            Some((holder, meta)) if meta.is_hooked() => SetStrategy::Hooked { holder, slot: meta.slot },
            Some((_, meta)) if !meta.is_writable() => SetStrategy::ReadOnly,
            Some((_, _)) if self.options.super_property => SetStrategy::ReceiverDefine,
            Some((Holder::Receiver, meta)) => SetStrategy::Data { slot: meta.slot },
            Some((Holder::Prototype(..), _)) => add_property(),
            None if self.options.global_binding && self.options.strict => {
                tracing::trace!(key = %self.key(), global = obj.id(), "unresolvable strict global assignment");
                SetStrategy::Unresolvable
            }
            None if self.options.super_property => SetStrategy::ReceiverDefine,
            None => add_property(),
        }
    }
}
