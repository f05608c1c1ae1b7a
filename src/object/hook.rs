//! Property hooks
//!
//! A hooked property stores a [`PropertyHook`] instead of a value. Reads and
//! writes go through the hook, which lets an embedder expose computed
//! properties (lazily formatted diagnostics, host-backed values) while the
//! caches still treat the property as a plain slot of the shape.

use crate::error::Result;
use crate::runtime::Value;
use parking_lot::RwLock;

/// Indirection for a computed property
pub trait PropertyHook: Send + Sync {
    /// Produce the value seen by `receiver`
    fn get(&self, receiver: &Value) -> Result<Value>;

    /// Store a value; returns false when the hook is read-only
    fn set(&self, _receiver: &Value, _value: Value) -> Result<bool> {
        Ok(false)
    }
}

type Compute = Box<dyn Fn(&Value) -> Result<Value> + Send + Sync>;

/// Computes its value on first read and caches it; a write replaces it
pub struct LazyValueHook {
    compute: Compute,
    value: RwLock<Option<Value>>,
}

impl LazyValueHook {
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn(&Value) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            compute: Box::new(compute),
            value: RwLock::new(None),
        }
    }

    /// True once the value has been computed or assigned
    pub fn is_materialized(&self) -> bool {
        self.value.read().is_some()
    }
}

impl PropertyHook for LazyValueHook {
    fn get(&self, receiver: &Value) -> Result<Value> {
        if let Some(v) = self.value.read().as_ref() {
            return Ok(v.clone());
        }
        let computed = (self.compute)(receiver)?;
        let mut slot = self.value.write();
        Ok(slot.get_or_insert(computed).clone())
    }

    fn set(&self, _receiver: &Value, value: Value) -> Result<bool> {
        *self.value.write() = Some(value);
        Ok(true)
    }
}
