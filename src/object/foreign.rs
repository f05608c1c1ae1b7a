//! Objects owned by another language
//!
//! The caches treat foreign objects opaquely: a single foreign guard
//! accepts all of them and every access is forwarded to the bridge.

use crate::error::Result;
use crate::runtime::{PropertyKey, Value};
use parking_lot::RwLock;
use rustc_hash::FxHashMap as HashMap;
use std::sync::Arc;

/// Member access bridge for a foreign object
pub trait ForeignObject: Send + Sync {
    /// Name of the owning language, for diagnostics
    fn language(&self) -> &str;

    /// Read a member; `None` if it does not exist
    fn read_member(&self, key: &PropertyKey) -> Result<Option<Value>>;

    /// Write a member; false if the object refused
    fn write_member(&self, key: &PropertyKey, value: Value) -> Result<bool>;

    /// Member presence
    fn has_member(&self, key: &PropertyKey) -> Result<bool>;
}

/// Shared handle to a foreign object
pub type ForeignRef = Arc<dyn ForeignObject>;

/// Map-backed foreign object for embedders and tests
pub struct HostObject {
    language: String,
    members: RwLock<HashMap<PropertyKey, Value>>,
    read_only: bool,
}

impl HostObject {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            members: RwLock::new(HashMap::default()),
            read_only: false,
        }
    }

    /// Reject all writes
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Add a member
    pub fn with_member(self, name: &str, value: Value) -> Self {
        self.members.write().insert(PropertyKey::name(name), value);
        self
    }

    /// Wrap as a language value
    pub fn into_value(self) -> Value {
        Value::Foreign(Arc::new(self))
    }
}

impl ForeignObject for HostObject {
    fn language(&self) -> &str {
        &self.language
    }

    fn read_member(&self, key: &PropertyKey) -> Result<Option<Value>> {
        Ok(self.members.read().get(key).cloned())
    }

    fn write_member(&self, key: &PropertyKey, value: Value) -> Result<bool> {
        if self.read_only {
            return Ok(false);
        }
        self.members.write().insert(key.clone(), value);
        Ok(true)
    }

    fn has_member(&self, key: &PropertyKey) -> Result<bool> {
        Ok(self.members.read().contains_key(key))
    }
}
