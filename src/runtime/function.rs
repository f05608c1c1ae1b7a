//! Native callables
//!
//! Getters, setters, proxy traps and plain methods are all native closures
//! taking `(this, args)`. Errors they return propagate unchanged through
//! every cache strategy.

use super::value::Value;
use crate::error::{messages, Error, Result};
use std::sync::Arc;

/// Native function signature
pub type NativeFn = Arc<dyn Fn(&Value, &[Value]) -> Result<Value> + Send + Sync>;

/// Wrap a closure as a [`NativeFn`]
pub fn native<F>(f: F) -> NativeFn
where
    F: Fn(&Value, &[Value]) -> Result<Value> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Call `callee` with the given `this` and arguments
pub fn call(callee: &Value, this: &Value, args: &[Value]) -> Result<Value> {
    match callee {
        Value::Object(obj) => match obj.callable() {
            Some(f) => f(this, args),
            None => Err(Error::type_error(messages::not_a_function(&callee.describe()))),
        },
        other => Err(Error::type_error(messages::not_a_function(&other.describe()))),
    }
}
