//! Module namespace objects
//!
//! A namespace exposes a module's export bindings as read-only properties.
//! Bindings may be uninitialized (accessing one is a ReferenceError), and a
//! deferred namespace runs its module body on first access to an export.

use super::{JsObject, ObjectKind, ObjectRef, PropertyFlags, PropertyMeta, PropertyValue};
use crate::error::{messages, Error, Result};
use crate::runtime::{Atom, PropertyKey, Value};
use parking_lot::{ReentrantMutex, RwLock};
use rustc_hash::FxHashMap as HashMap;
use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Deferred module body; initializes the namespace's bindings
pub type Evaluator = Box<dyn FnOnce(&ModuleNamespace) -> Result<()> + Send>;

/// Export bindings of one module
pub struct ModuleNamespace {
    name: Arc<str>,
    /// Export names, sorted
    exports: Vec<Atom>,
    bindings: RwLock<HashMap<Atom, Option<Value>>>,
    /// Held for the whole evaluation. Re-entrant so the module body can read
    /// its own exports.
    evaluator: ReentrantMutex<RefCell<Option<Evaluator>>>,
    evaluated: AtomicBool,
}

/// Builder for namespace objects
pub struct NamespaceBuilder {
    name: String,
    bindings: Vec<(Atom, Option<Value>)>,
    evaluator: Option<Evaluator>,
}

impl NamespaceBuilder {
    /// Add an initialized export
    pub fn export(mut self, name: &str, value: Value) -> Self {
        self.bindings.push((Atom::new(name), Some(value)));
        self
    }

    /// Add an export that is still in its dead zone
    pub fn uninitialized(mut self, name: &str) -> Self {
        self.bindings.push((Atom::new(name), None));
        self
    }

    /// Defer evaluation of the module body until first export access
    pub fn deferred<F>(mut self, evaluate: F) -> Self
    where
        F: FnOnce(&ModuleNamespace) -> Result<()> + Send + 'static,
    {
        self.evaluator = Some(Box::new(evaluate));
        self
    }

    pub fn build(self) -> ObjectRef {
        let mut exports: Vec<Atom> = self.bindings.iter().map(|(a, _)| *a).collect();
        exports.sort_by(|a, b| a.as_str().cmp(&b.as_str()));
        exports.dedup();
        let evaluated = self.evaluator.is_none();
        let ns = ModuleNamespace {
            name: Arc::from(self.name.as_str()),
            exports,
            bindings: RwLock::new(self.bindings.into_iter().collect()),
            evaluator: ReentrantMutex::new(RefCell::new(self.evaluator)),
            evaluated: AtomicBool::new(evaluated),
        };
        JsObject::with_kind(ObjectKind::Namespace(ns), None)
    }
}

impl ModuleNamespace {
    /// Start building a namespace for module `name`
    pub fn builder(name: &str) -> NamespaceBuilder {
        NamespaceBuilder {
            name: name.to_string(),
            bindings: Vec::new(),
            evaluator: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// True once the module body has run (always true for eager namespaces)
    pub fn is_evaluated(&self) -> bool {
        self.evaluated.load(Ordering::Acquire)
    }

    pub fn is_export(&self, key: &PropertyKey) -> bool {
        match key.as_atom() {
            Some(atom) => self.exports.binary_search_by(|a| a.as_str().cmp(&atom.as_str())).is_ok(),
            None => false,
        }
    }

    /// Export names as keys, sorted
    pub fn export_keys(&self) -> Vec<PropertyKey> {
        self.exports.iter().map(|a| PropertyKey::String(*a)).collect()
    }

    /// Initialize (or update) an export binding
    pub fn initialize(&self, name: &str, value: Value) -> Result<()> {
        let atom = Atom::new(name);
        let mut bindings = self.bindings.write();
        match bindings.get_mut(&atom) {
            Some(slot) => {
                *slot = Some(value);
                Ok(())
            }
            None => Err(Error::InternalError(format!(
                "module '{}' has no export named '{}'",
                self.name, name
            ))),
        }
    }

    /// Run the deferred module body, at most once. Other threads block until
    /// it has finished; a nested access from the body itself sees the
    /// bindings as they are.
    pub fn ensure_evaluated(&self) -> Result<()> {
        if self.is_evaluated() {
            return Ok(());
        }
        let guard = self.evaluator.lock();
        if self.is_evaluated() {
            return Ok(());
        }
        let evaluator = guard.borrow_mut().take();
        match evaluator {
            Some(evaluate) => {
                tracing::debug!(module = %self.name, "evaluating deferred module");
                let result = evaluate(self);
                self.evaluated.store(true, Ordering::Release);
                result
            }
            None => Ok(()),
        }
    }

    /// Resolve an export binding. Absent for non-exports; ReferenceError for
    /// a binding in its dead zone.
    pub fn get(&self, key: &PropertyKey) -> Result<Option<Value>> {
        let atom = match key.as_atom() {
            Some(atom) if self.is_export(key) => atom,
            _ => return Ok(None),
        };
        self.ensure_evaluated()?;
        match self.bindings.read().get(&atom) {
            Some(Some(value)) => Ok(Some(value.clone())),
            Some(None) => Err(Error::reference_error(messages::before_init(&atom.as_str()))),
            None => Ok(None),
        }
    }

    /// Presence check. Performs full binding resolution, so it may evaluate
    /// a deferred module and may throw for an uninitialized binding.
    pub fn has(&self, key: &PropertyKey) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    pub(crate) fn get_own_property(&self, key: &PropertyKey) -> Result<Option<(PropertyMeta, PropertyValue)>> {
        let slot = match key.as_atom() {
            Some(atom) => self.exports.iter().position(|a| *a == atom),
            None => None,
        };
        let slot = match slot {
            Some(slot) => slot,
            None => return Ok(None),
        };
        let value = self.get(key)?.unwrap_or(Value::Undefined);
        let meta = PropertyMeta {
            slot,
            flags: PropertyFlags::WRITABLE | PropertyFlags::ENUMERABLE,
        };
        Ok(Some((meta, PropertyValue::Data(value))))
    }
}
