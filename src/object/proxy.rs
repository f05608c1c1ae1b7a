//! Proxy trap dispatch
//!
//! Only the traps the property caches reach are modelled: `get`, `set` and
//! `has`. Every other operation on a proxy forwards to its target. Results
//! of the modelled traps are checked against the target's non-configurable
//! properties.

use super::{revoked, ObjectRef, PropertyValue};
use crate::error::{messages, Error, Result};
use crate::runtime::{call, PropertyKey, Value};
use parking_lot::RwLock;

/// Target and handler of a proxy; both are dropped on revocation
pub struct ProxyData {
    inner: RwLock<Option<(ObjectRef, ObjectRef)>>,
}

impl ProxyData {
    pub(crate) fn new(target: ObjectRef, handler: ObjectRef) -> Self {
        Self {
            inner: RwLock::new(Some((target, handler))),
        }
    }

    /// The target, unless revoked
    pub fn target(&self) -> Option<ObjectRef> {
        self.inner.read().as_ref().map(|(t, _)| t.clone())
    }

    /// The handler, unless revoked
    pub fn handler(&self) -> Option<ObjectRef> {
        self.inner.read().as_ref().map(|(_, h)| h.clone())
    }

    pub fn is_revoked(&self) -> bool {
        self.inner.read().is_none()
    }

    /// Drop target and handler; every later operation throws
    pub fn revoke(&self) {
        *self.inner.write() = None;
    }

    pub(crate) fn checked(&self) -> Result<(ObjectRef, ObjectRef)> {
        self.inner.read().clone().ok_or_else(revoked)
    }

    pub(crate) fn checked_target(&self) -> Result<ObjectRef> {
        self.checked().map(|(t, _)| t)
    }
}

/// Look up a trap on the handler; `None` means "forward to target"
fn trap(handler: &ObjectRef, name: &str) -> Result<Option<Value>> {
    let trap = handler.get(&PropertyKey::name(name), &Value::Object(handler.clone()))?;
    if trap.is_nullish() {
        return Ok(None);
    }
    if !trap.is_callable() {
        return Err(Error::type_error(format!("proxy trap '{}' is not a function", name)));
    }
    Ok(Some(trap))
}

/// `get` trap with invariant checks
pub(crate) fn get(proxy: &ProxyData, key: &PropertyKey, receiver: &Value) -> Result<Value> {
    let (target, handler) = proxy.checked()?;
    let trap = match trap(&handler, "get")? {
        Some(t) => t,
        None => return target.get(key, receiver),
    };
    let result = call(
        &trap,
        &Value::Object(handler),
        &[Value::Object(target.clone()), key.to_value(), receiver.clone()],
    )?;

    if let Some((meta, pv)) = target.get_own_property(key)? {
        if !meta.is_configurable() {
            match pv {
                PropertyValue::Data(expected) if !meta.is_writable() => {
                    if !result.same_value(&expected) {
                        return Err(Error::type_error(messages::proxy_invariant(
                            "get",
                            &key.to_string(),
                            "is a read-only and non-configurable data property on the proxy target but the proxy did not return its actual value",
                        )));
                    }
                }
                PropertyValue::Accessor { getter: None, .. } => {
                    if !result.is_undefined() {
                        return Err(Error::type_error(messages::proxy_invariant(
                            "get",
                            &key.to_string(),
                            "is a non-configurable accessor property on the proxy target and does not have a getter function, but the trap did not return 'undefined'",
                        )));
                    }
                }
                _ => {}
            }
        }
    }
    Ok(result)
}

/// `set` trap with invariant checks; a falsy trap result is a rejected assignment
pub(crate) fn set(proxy: &ProxyData, key: &PropertyKey, value: Value, receiver: &Value) -> Result<bool> {
    let (target, handler) = proxy.checked()?;
    let trap = match trap(&handler, "set")? {
        Some(t) => t,
        None => return target.set(key, value, receiver),
    };
    let accepted = call(
        &trap,
        &Value::Object(handler),
        &[Value::Object(target.clone()), key.to_value(), value.clone(), receiver.clone()],
    )?
    .to_boolean();
    if !accepted {
        return Ok(false);
    }

    if let Some((meta, pv)) = target.get_own_property(key)? {
        if !meta.is_configurable() {
            match pv {
                PropertyValue::Data(expected) if !meta.is_writable() => {
                    if !value.same_value(&expected) {
                        return Err(Error::type_error(messages::proxy_invariant(
                            "set",
                            &key.to_string(),
                            "is a read-only and non-configurable data property on the proxy target, the trap cannot change its value",
                        )));
                    }
                }
                PropertyValue::Accessor { setter: None, .. } => {
                    return Err(Error::type_error(messages::proxy_invariant(
                        "set",
                        &key.to_string(),
                        "is a non-configurable accessor property on the proxy target without a setter",
                    )));
                }
                _ => {}
            }
        }
    }
    Ok(true)
}

/// `has` trap with invariant checks
pub(crate) fn has(proxy: &ProxyData, key: &PropertyKey) -> Result<bool> {
    let (target, handler) = proxy.checked()?;
    let trap = match trap(&handler, "has")? {
        Some(t) => t,
        None => return target.has_property(key),
    };
    let present = call(
        &trap,
        &Value::Object(handler),
        &[Value::Object(target.clone()), key.to_value()],
    )?
    .to_boolean();

    if !present {
        if let Some((meta, _)) = target.get_own_property(key)? {
            if !meta.is_configurable() {
                return Err(Error::type_error(messages::proxy_invariant(
                    "has",
                    &key.to_string(),
                    "exists in the proxy target as non-configurable, the trap cannot report it as absent",
                )));
            }
            if !target.is_extensible() {
                return Err(Error::type_error(messages::proxy_invariant(
                    "has",
                    &key.to_string(),
                    "exists in the proxy target, which is non-extensible, the trap cannot report it as absent",
                )));
            }
        }
    }
    Ok(present)
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;
    use crate::object::{new_proxy, JsObject, PropertyFlags};
    use crate::runtime::{native, PropertyKey, Value};

    fn handler_with(trap_name: &str, result: Value) -> crate::object::ObjectRef {
        let trap = JsObject::function(trap_name, native(move |_, _| Ok(result.clone())));
        JsObject::with_properties(None, &[(trap_name, Value::Object(trap))])
    }

    #[test]
    fn test_missing_trap_forwards_to_target() {
        let target = JsObject::with_properties(None, &[("a", Value::Int(1))]);
        let proxy = new_proxy(target, JsObject::new(None));
        let v = proxy.get(&PropertyKey::name("a"), &Value::Object(proxy.clone())).unwrap();
        assert_eq!(v, Value::Int(1));
    }

    #[test]
    fn test_revoked_proxy_throws() {
        let proxy = new_proxy(JsObject::new(None), JsObject::new(None));
        proxy.as_proxy().unwrap().revoke();
        let err = proxy.get(&PropertyKey::name("a"), &Value::Undefined).unwrap_err();
        assert!(err.is(ErrorKind::TypeError));
    }

    #[test]
    fn test_has_cannot_hide_non_configurable() {
        let target = JsObject::new(None);
        target
            .define_data(&PropertyKey::name("pinned"), Value::Int(1), PropertyFlags::frozen())
            .unwrap();
        let proxy = new_proxy(target, handler_with("has", Value::Boolean(false)));
        let err = proxy.has_property(&PropertyKey::name("pinned")).unwrap_err();
        assert!(err.is(ErrorKind::TypeError));
        assert!(!proxy.has_property(&PropertyKey::name("other")).unwrap());
    }

    #[test]
    fn test_set_trap_false_rejects() {
        let target = JsObject::new(None);
        let proxy = new_proxy(target.clone(), handler_with("set", Value::Boolean(false)));
        let ok = proxy
            .set(&PropertyKey::name("a"), Value::Int(1), &Value::Object(proxy.clone()))
            .unwrap();
        assert!(!ok);
        assert!(!target.has_own_property(&PropertyKey::name("a")).unwrap());
    }
}
