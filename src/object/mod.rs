//! Object layout model
//!
//! A small, thread-safe object model that the inline caches consume. Every
//! object carries a [`Shape`] describing its property layout and a slot vector
//! holding the property contents. The module also provides the full,
//! uncached property semantics (`get_property`, `set`, `has_property`,
//! `define_own_property`, `delete`) used by the generic cache strategy.
//!
//! Locking: an object's state lock is never held while user code runs
//! (getters, setters, traps, hooks, deferred module evaluation).

pub mod foreign;
pub mod hook;
pub mod namespace;
pub mod proxy;
pub mod shape;

pub use foreign::{ForeignObject, ForeignRef, HostObject};
pub use hook::{LazyValueHook, PropertyHook};
pub use namespace::{ModuleNamespace, NamespaceBuilder};
pub use proxy::ProxyData;
pub use shape::{PropertyFlags, PropertyMeta, Shape};

use crate::error::{Error, Result};
use crate::runtime::{call, NativeFn, PropertyKey, Value};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shared handle to an object
pub type ObjectRef = Arc<JsObject>;

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Object class, used by class guards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectClass {
    Ordinary,
    Function,
    Proxy,
    ModuleNamespace,
}

/// Contents of a property slot
#[derive(Clone)]
pub enum PropertyValue {
    /// Plain data
    Data(Value),
    /// Getter/setter pair
    Accessor {
        getter: Option<Value>,
        setter: Option<Value>,
    },
    /// Computed through a hook
    Hooked(Arc<dyn PropertyHook>),
}

impl PropertyValue {
    /// Storage-kind bits for this slot content
    fn storage_flags(&self) -> PropertyFlags {
        match self {
            PropertyValue::Data(_) => PropertyFlags::empty(),
            PropertyValue::Accessor { .. } => PropertyFlags::ACCESSOR,
            PropertyValue::Hooked(_) => PropertyFlags::HOOKED,
        }
    }

    /// Read the property as seen from `receiver`
    pub fn read(&self, receiver: &Value) -> Result<Value> {
        match self {
            PropertyValue::Data(v) => Ok(v.clone()),
            PropertyValue::Accessor { getter: Some(g), .. } => call(g, receiver, &[]),
            PropertyValue::Accessor { getter: None, .. } => Ok(Value::Undefined),
            PropertyValue::Hooked(hook) => hook.get(receiver),
        }
    }
}

pub(crate) enum ObjectKind {
    Ordinary,
    Function { name: Arc<str>, func: NativeFn },
    Proxy(ProxyData),
    Namespace(ModuleNamespace),
}

struct ObjectState {
    shape: Shape,
    slots: Vec<PropertyValue>,
    prototype: Option<ObjectRef>,
}

/// A heap object
pub struct JsObject {
    id: u64,
    kind: ObjectKind,
    state: RwLock<ObjectState>,
}

impl JsObject {
    pub(crate) fn with_kind(kind: ObjectKind, prototype: Option<ObjectRef>) -> ObjectRef {
        let class = match &kind {
            ObjectKind::Ordinary => ObjectClass::Ordinary,
            ObjectKind::Function { .. } => ObjectClass::Function,
            ObjectKind::Proxy(_) => ObjectClass::Proxy,
            ObjectKind::Namespace(_) => ObjectClass::ModuleNamespace,
        };
        let shape = Shape::root(class, prototype.as_ref().map(|p| p.id));
        Arc::new(JsObject {
            id: NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed),
            kind,
            state: RwLock::new(ObjectState {
                shape,
                slots: Vec::new(),
                prototype,
            }),
        })
    }

    /// Create an empty ordinary object
    pub fn new(prototype: Option<ObjectRef>) -> ObjectRef {
        Self::with_kind(ObjectKind::Ordinary, prototype)
    }

    /// Create an ordinary object with writable, enumerable, configurable data properties
    pub fn with_properties(prototype: Option<ObjectRef>, properties: &[(&str, Value)]) -> ObjectRef {
        let obj = Self::new(prototype);
        for (name, value) in properties {
            obj.define_ordinary(
                &PropertyKey::name(name),
                PropertyValue::Data(value.clone()),
                PropertyFlags::default(),
            );
        }
        obj
    }

    /// Create a native function object
    pub fn function(name: &str, func: NativeFn) -> ObjectRef {
        Self::with_kind(
            ObjectKind::Function {
                name: Arc::from(name),
                func,
            },
            None,
        )
    }

    /// Unique object ID
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn class(&self) -> ObjectClass {
        match &self.kind {
            ObjectKind::Ordinary => ObjectClass::Ordinary,
            ObjectKind::Function { .. } => ObjectClass::Function,
            ObjectKind::Proxy(_) => ObjectClass::Proxy,
            ObjectKind::Namespace(_) => ObjectClass::ModuleNamespace,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.kind, ObjectKind::Function { .. })
    }

    /// The native function behind a function object
    pub fn callable(&self) -> Option<&NativeFn> {
        match &self.kind {
            ObjectKind::Function { func, .. } => Some(func),
            _ => None,
        }
    }

    /// Name a function object was created with
    pub fn function_name(&self) -> Option<&str> {
        match &self.kind {
            ObjectKind::Function { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn as_proxy(&self) -> Option<&ProxyData> {
        match &self.kind {
            ObjectKind::Proxy(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_namespace(&self) -> Option<&ModuleNamespace> {
        match &self.kind {
            ObjectKind::Namespace(ns) => Some(ns),
            _ => None,
        }
    }

    /// Shape-based objects (ordinary and function objects) can be cached by shape
    pub fn is_shaped(&self) -> bool {
        matches!(self.kind, ObjectKind::Ordinary | ObjectKind::Function { .. })
    }

    /// Current shape
    pub fn shape(&self) -> Shape {
        self.state.read().shape.clone()
    }

    /// Current prototype
    pub fn prototype(&self) -> Option<ObjectRef> {
        self.state.read().prototype.clone()
    }

    /// Shape and prototype read under one lock
    pub(crate) fn snapshot(&self) -> (Shape, Option<ObjectRef>) {
        let state = self.state.read();
        (state.shape.clone(), state.prototype.clone())
    }

    pub fn is_extensible(&self) -> bool {
        match &self.kind {
            ObjectKind::Proxy(p) => p.target().map(|t| t.is_extensible()).unwrap_or(false),
            ObjectKind::Namespace(_) => false,
            _ => self.state.read().shape.is_extensible(),
        }
    }

    /// Move off an invalid shape. Returns true if the shape changed.
    pub fn migrate_if_obsolete(&self) -> bool {
        if self.state.read().shape.is_valid() {
            return false;
        }
        let mut state = self.state.write();
        if state.shape.is_valid() {
            return false;
        }
        state.shape = state.shape.migrated();
        true
    }

    /// Slot contents, provided the current shape satisfies `expected`
    #[inline]
    pub(crate) fn read_slot_where<F>(&self, slot: usize, expected: F) -> Option<PropertyValue>
    where
        F: FnOnce(&Shape) -> bool,
    {
        let state = self.state.read();
        if expected(&state.shape) {
            state.slots.get(slot).cloned()
        } else {
            None
        }
    }

    /// Overwrite a data slot, provided the current shape satisfies
    /// `expected`. Hands the value back otherwise.
    #[inline]
    pub(crate) fn write_slot_where<F>(&self, slot: usize, value: Value, expected: F) -> std::result::Result<(), Value>
    where
        F: FnOnce(&Shape) -> bool,
    {
        let mut state = self.state.write();
        if !expected(&state.shape) {
            return Err(value);
        }
        match state.slots.get_mut(slot) {
            Some(entry) => {
                *entry = PropertyValue::Data(value);
                Ok(())
            }
            None => Err(value),
        }
    }

    /// Append a data slot and move from `from` to `to`, provided the object
    /// still has `from`. Hands the value back otherwise.
    pub(crate) fn transition_if(&self, from: &Shape, to: &Shape, value: Value) -> std::result::Result<(), Value> {
        let mut state = self.state.write();
        if !Shape::ptr_eq(&state.shape, from) || to.len() != state.slots.len() + 1 {
            return Err(value);
        }
        state.slots.push(PropertyValue::Data(value));
        state.shape = to.clone();
        Ok(())
    }

    /// Own property lookup
    pub fn get_own_property(&self, key: &PropertyKey) -> Result<Option<(PropertyMeta, PropertyValue)>> {
        match &self.kind {
            ObjectKind::Proxy(p) => p.checked_target()?.get_own_property(key),
            ObjectKind::Namespace(ns) => ns.get_own_property(key),
            _ => {
                self.migrate_if_obsolete();
                let state = self.state.read();
                Ok(state
                    .shape
                    .lookup(key)
                    .and_then(|meta| state.slots.get(meta.slot).map(|pv| (meta, pv.clone()))))
            }
        }
    }

    /// `[[Get]]`, distinguishing an absent property (`None`) from one holding undefined
    pub fn get_property(&self, key: &PropertyKey, receiver: &Value) -> Result<Option<Value>> {
        match &self.kind {
            ObjectKind::Proxy(p) => return proxy::get(p, key, receiver).map(Some),
            ObjectKind::Namespace(ns) => return ns.get(key),
            _ => {}
        }
        self.migrate_if_obsolete();
        let (own, proto) = {
            let state = self.state.read();
            let own = state
                .shape
                .lookup(key)
                .and_then(|meta| state.slots.get(meta.slot).cloned());
            (own, state.prototype.clone())
        };
        match own {
            Some(pv) => pv.read(receiver).map(Some),
            None => match proto {
                Some(p) => p.get_property(key, receiver),
                None => Ok(None),
            },
        }
    }

    /// `[[Get]]` with undefined for absent properties
    pub fn get(&self, key: &PropertyKey, receiver: &Value) -> Result<Value> {
        Ok(self.get_property(key, receiver)?.unwrap_or(Value::Undefined))
    }

    /// `[[Set]]`: returns false when the assignment is rejected
    pub fn set(&self, key: &PropertyKey, value: Value, receiver: &Value) -> Result<bool> {
        match &self.kind {
            ObjectKind::Proxy(p) => return proxy::set(p, key, value, receiver),
            ObjectKind::Namespace(_) => return Ok(false),
            _ => {}
        }
        self.migrate_if_obsolete();
        let (own, proto) = {
            let state = self.state.read();
            let own = state
                .shape
                .lookup(key)
                .and_then(|meta| state.slots.get(meta.slot).map(|pv| (meta, pv.clone())));
            (own, state.prototype.clone())
        };
        match own {
            Some((meta, pv)) => set_found(key, meta, pv, value, receiver),
            None => match proto {
                Some(p) => p.set(key, value, receiver),
                None => set_on_receiver(key, value, receiver),
            },
        }
    }

    /// `[[HasProperty]]`
    pub fn has_property(&self, key: &PropertyKey) -> Result<bool> {
        match &self.kind {
            ObjectKind::Proxy(p) => return proxy::has(p, key),
            ObjectKind::Namespace(ns) => return ns.has(key),
            _ => {}
        }
        self.migrate_if_obsolete();
        let (found, proto) = {
            let state = self.state.read();
            (state.shape.lookup(key).is_some(), state.prototype.clone())
        };
        if found {
            return Ok(true);
        }
        match proto {
            Some(p) => p.has_property(key),
            None => Ok(false),
        }
    }

    /// Own-property presence
    pub fn has_own_property(&self, key: &PropertyKey) -> Result<bool> {
        match &self.kind {
            ObjectKind::Namespace(ns) => ns.has(key),
            _ => Ok(self.get_own_property(key)?.is_some()),
        }
    }

    /// `[[DefineOwnProperty]]` with the given attributes
    pub fn define_own_property(
        &self,
        key: &PropertyKey,
        value: PropertyValue,
        attributes: PropertyFlags,
    ) -> Result<bool> {
        match &self.kind {
            ObjectKind::Proxy(p) => p.checked_target()?.define_own_property(key, value, attributes),
            ObjectKind::Namespace(_) => Ok(false),
            _ => Ok(self.define_ordinary(key, value, attributes)),
        }
    }

    /// Define a data property
    pub fn define_data(&self, key: &PropertyKey, value: Value, attributes: PropertyFlags) -> Result<bool> {
        self.define_own_property(key, PropertyValue::Data(value), attributes)
    }

    /// Define an accessor property
    pub fn define_accessor(
        &self,
        key: &PropertyKey,
        getter: Option<Value>,
        setter: Option<Value>,
        attributes: PropertyFlags,
    ) -> Result<bool> {
        self.define_own_property(key, PropertyValue::Accessor { getter, setter }, attributes)
    }

    /// Define a hooked property
    pub fn define_hooked(
        &self,
        key: &PropertyKey,
        hook: Arc<dyn PropertyHook>,
        attributes: PropertyFlags,
    ) -> Result<bool> {
        self.define_own_property(key, PropertyValue::Hooked(hook), attributes)
    }

    fn define_ordinary(&self, key: &PropertyKey, value: PropertyValue, attributes: PropertyFlags) -> bool {
        let mut attributes = attributes.attributes();
        if !matches!(value, PropertyValue::Data(_)) {
            attributes.remove(PropertyFlags::WRITABLE);
        }
        let flags = attributes | value.storage_flags();

        let mut state = self.state.write();
        if !state.shape.is_valid() {
            state.shape = state.shape.migrated();
        }
        match state.shape.lookup(key) {
            None => {
                if !state.shape.is_extensible() {
                    return false;
                }
                let next = state.shape.child_shape_for(key, flags);
                state.slots.push(value);
                state.shape = next;
                true
            }
            Some(meta) => {
                if !meta.is_configurable() && !redefinition_allowed(&meta, flags, &state.slots[meta.slot], &value) {
                    return false;
                }
                state.slots[meta.slot] = value;
                if meta.flags != flags {
                    let old = state.shape.clone();
                    let properties: Vec<_> = old
                        .properties()
                        .map(|(k, f)| if &k == key { (k, flags) } else { (k, f) })
                        .collect();
                    state.shape = Shape::replay(old.class(), old.prototype_id(), properties, old.is_extensible());
                    old.invalidate();
                    tracing::debug!(shape = old.id(), key = %key, "property reconfigured, shape invalidated");
                }
                true
            }
        }
    }

    /// `[[Delete]]`
    pub fn delete(&self, key: &PropertyKey) -> Result<bool> {
        match &self.kind {
            ObjectKind::Proxy(p) => return p.checked_target()?.delete(key),
            ObjectKind::Namespace(ns) => return Ok(!ns.is_export(key)),
            _ => {}
        }
        let mut state = self.state.write();
        if !state.shape.is_valid() {
            state.shape = state.shape.migrated();
        }
        let meta = match state.shape.lookup(key) {
            Some(meta) => meta,
            None => return Ok(true),
        };
        if !meta.is_configurable() {
            return Ok(false);
        }
        let old = state.shape.clone();
        state.slots.remove(meta.slot);
        let properties: Vec<_> = old.properties().filter(|(k, _)| k != key).collect();
        state.shape = Shape::replay(old.class(), old.prototype_id(), properties, old.is_extensible());
        old.invalidate();
        tracing::debug!(shape = old.id(), key = %key, "property deleted, shape invalidated");
        Ok(true)
    }

    /// `[[PreventExtensions]]`
    pub fn prevent_extensions(&self) -> Result<bool> {
        match &self.kind {
            ObjectKind::Proxy(p) => return p.checked_target()?.prevent_extensions(),
            ObjectKind::Namespace(_) => return Ok(true),
            _ => {}
        }
        let mut state = self.state.write();
        if state.shape.is_extensible() || !state.shape.is_valid() {
            let shape = state.shape.clone();
            state.shape = Shape::replay(shape.class(), shape.prototype_id(), shape.properties(), false);
        }
        Ok(true)
    }

    /// Freeze: every property becomes non-configurable (and non-writable
    /// for data), then extensions are prevented
    pub fn freeze(&self) -> Result<bool> {
        for key in self.own_keys()? {
            if let Some((meta, pv)) = self.get_own_property(&key)? {
                let mut attributes = meta.flags.attributes();
                attributes.remove(PropertyFlags::CONFIGURABLE | PropertyFlags::WRITABLE);
                if !self.define_own_property(&key, pv, attributes)? {
                    return Ok(false);
                }
            }
        }
        self.prevent_extensions()
    }

    /// `[[SetPrototypeOf]]`
    pub fn set_prototype(&self, prototype: Option<ObjectRef>) -> Result<bool> {
        match &self.kind {
            ObjectKind::Proxy(p) => return p.checked_target()?.set_prototype(prototype),
            ObjectKind::Namespace(_) => return Ok(prototype.is_none()),
            _ => {}
        }
        let mut cursor = prototype.clone();
        while let Some(p) = cursor {
            if p.id == self.id {
                return Ok(false);
            }
            if !p.is_shaped() {
                break;
            }
            cursor = p.prototype();
        }

        let mut state = self.state.write();
        let same = match (&state.prototype, &prototype) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        if same {
            return Ok(true);
        }
        if !state.shape.is_extensible() {
            return Ok(false);
        }
        let shape = state.shape.clone();
        state.shape = Shape::replay(shape.class(), prototype.as_ref().map(|p| p.id), shape.properties(), true);
        state.prototype = prototype;
        Ok(true)
    }

    /// Own property keys in insertion order
    pub fn own_keys(&self) -> Result<Vec<PropertyKey>> {
        match &self.kind {
            ObjectKind::Proxy(p) => p.checked_target()?.own_keys(),
            ObjectKind::Namespace(ns) => Ok(ns.export_keys()),
            _ => Ok(self.state.read().shape.keys().to_vec()),
        }
    }
}

/// A non-configurable property may only be redefined as the same kind with
/// the same attributes, or a writable data property made read-only. A
/// read-only one keeps its value.
fn redefinition_allowed(meta: &PropertyMeta, flags: PropertyFlags, old: &PropertyValue, new: &PropertyValue) -> bool {
    if flags.contains(PropertyFlags::CONFIGURABLE) {
        return false;
    }
    match (old, new) {
        (PropertyValue::Data(a), PropertyValue::Data(b)) => {
            let same_attrs = flags == meta.flags;
            let drops_writable = meta.is_writable() && flags == (meta.flags - PropertyFlags::WRITABLE);
            if meta.is_writable() {
                same_attrs || drops_writable
            } else {
                same_attrs && a.same_value(b)
            }
        }
        (
            PropertyValue::Accessor { getter: g1, setter: s1 },
            PropertyValue::Accessor { getter: g2, setter: s2 },
        ) => flags == meta.flags && same_function(g1, g2) && same_function(s1, s2),
        _ => false,
    }
}

fn same_function(a: &Option<Value>, b: &Option<Value>) -> bool {
    match (a, b) {
        (Some(x), Some(y)) => x.same_value(y),
        (None, None) => true,
        _ => false,
    }
}

/// Assignment to a property found on `holder` (the receiver or a prototype)
pub(crate) fn set_found(
    key: &PropertyKey,
    meta: PropertyMeta,
    pv: PropertyValue,
    value: Value,
    receiver: &Value,
) -> Result<bool> {
    match pv {
        PropertyValue::Accessor { setter: Some(s), .. } => {
            call(&s, receiver, &[value])?;
            Ok(true)
        }
        PropertyValue::Accessor { setter: None, .. } => Ok(false),
        PropertyValue::Hooked(hook) => hook.set(receiver, value),
        PropertyValue::Data(_) => {
            if !meta.is_writable() {
                return Ok(false);
            }
            set_on_receiver(key, value, receiver)
        }
    }
}

/// Final step of ordinary assignment: update or create the receiver's own data property
pub(crate) fn set_on_receiver(key: &PropertyKey, value: Value, receiver: &Value) -> Result<bool> {
    let obj = match receiver {
        Value::Object(obj) => obj,
        _ => return Ok(false),
    };
    match obj.get_own_property(key)? {
        Some((meta, _)) => {
            if !meta.is_data() || !meta.is_writable() {
                return Ok(false);
            }
            obj.define_own_property(key, PropertyValue::Data(value), meta.flags.attributes())
        }
        None => obj.define_own_property(key, PropertyValue::Data(value), PropertyFlags::default()),
    }
}

/// Create a revocable proxy object
pub fn new_proxy(target: ObjectRef, handler: ObjectRef) -> ObjectRef {
    JsObject::with_kind(ObjectKind::Proxy(ProxyData::new(target, handler)), None)
}

impl std::fmt::Debug for JsObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsObject")
            .field("id", &self.id)
            .field("class", &self.class())
            .field("shape", &self.shape().id())
            .finish()
    }
}

/// Convenience for building errors about objects
pub(crate) fn revoked() -> Error {
    Error::type_error(crate::error::messages::PROXY_REVOKED)
}
