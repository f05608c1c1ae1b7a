//! Shared test helpers for integration tests
//!
//! Shapes are shared process-wide and tests run in parallel, so every test
//! builds its objects from property names made unique with [`unique`].

#![allow(dead_code)]

use shapeshift::object::{JsObject, ObjectRef, PropertyFlags};
use shapeshift::runtime::native;
use shapeshift::{Error, PropertyKey, Value};
use std::sync::atomic::{AtomicUsize, Ordering};

static COUNTER: AtomicUsize = AtomicUsize::new(0);

/// A property name no other test uses
pub fn unique(prefix: &str) -> String {
    format!("{}_{}", prefix, COUNTER.fetch_add(1, Ordering::Relaxed))
}

pub fn key(name: &str) -> PropertyKey {
    PropertyKey::name(name)
}

/// Ordinary object with plain data properties, in order
pub fn object(props: &[(&str, Value)]) -> Value {
    Value::Object(JsObject::with_properties(None, props))
}

/// Ordinary object with a prototype
pub fn object_with_proto(proto: &ObjectRef, props: &[(&str, Value)]) -> Value {
    Value::Object(JsObject::with_properties(Some(proto.clone()), props))
}

pub fn as_object(value: &Value) -> ObjectRef {
    value.as_object().cloned().expect("object value")
}

/// Read a property through the uncached object model
pub fn read(value: &Value, name: &str) -> Value {
    as_object(value).get(&key(name), value).expect("generic read")
}

/// Proxy handler whose `trap` always returns `result`
pub fn handler_returning(trap: &str, result: Value) -> ObjectRef {
    let f = JsObject::function(trap, native(move |_, _| Ok(result.clone())));
    JsObject::with_properties(None, &[(trap, Value::Object(f))])
}

/// Getter that returns `this[field]`
pub fn getter_of(field: &str) -> Value {
    let field = field.to_string();
    Value::Object(JsObject::function(
        "get",
        native(move |this, _| {
            let obj = this.as_object().cloned().ok_or_else(|| Error::type_error("no receiver"))?;
            obj.get(&PropertyKey::name(&field), this)
        }),
    ))
}

/// Define a non-writable, non-configurable data property
pub fn define_frozen(obj: &ObjectRef, name: &str, value: Value) {
    obj.define_data(&key(name), value, PropertyFlags::frozen())
        .expect("define frozen property");
}
