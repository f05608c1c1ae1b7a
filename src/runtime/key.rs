//! Property keys

use super::intern::Atom;
use super::value::Value;
use crate::error::{Error, Result};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_SYMBOL_ID: AtomicU64 = AtomicU64::new(1);

/// A unique symbol; identity is its ID, the description is informational
#[derive(Clone)]
pub struct Symbol {
    id: u64,
    description: Option<Arc<str>>,
}

impl Symbol {
    /// Create a fresh symbol
    pub fn new(description: Option<&str>) -> Self {
        Self {
            id: NEXT_SYMBOL_ID.fetch_add(1, Ordering::Relaxed),
            description: description.map(Arc::from),
        }
    }

    /// The symbol's unique ID
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The symbol's description, if any
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.description.as_deref().unwrap_or(""))
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol#{}({:?})", self.id, self.description.as_deref())
    }
}

/// A property key: an interned name or a symbol
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    String(Atom),
    Symbol(Symbol),
}

impl PropertyKey {
    /// Intern a string key
    pub fn name(s: &str) -> Self {
        PropertyKey::String(Atom::new(s))
    }

    /// Check whether this is the string key `s`
    pub fn is_name(&self, s: &str) -> bool {
        match self {
            PropertyKey::String(atom) => &*atom.as_str() == s,
            PropertyKey::Symbol(_) => false,
        }
    }

    /// The atom for string keys
    pub fn as_atom(&self) -> Option<Atom> {
        match self {
            PropertyKey::String(atom) => Some(*atom),
            PropertyKey::Symbol(_) => None,
        }
    }

    /// The key as a language value, as passed to proxy traps
    pub fn to_value(&self) -> Value {
        match self {
            PropertyKey::String(atom) => Value::String(atom.as_str()),
            PropertyKey::Symbol(sym) => Value::Symbol(sym.clone()),
        }
    }

    /// Convert an arbitrary primitive value to a property key
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::String(s) => Ok(PropertyKey::name(s)),
            Value::Symbol(sym) => Ok(PropertyKey::Symbol(sym.clone())),
            Value::Object(_) | Value::Foreign(_) => {
                Err(Error::type_error("Cannot convert object to property key"))
            }
            other => Ok(PropertyKey::name(&other.to_string())),
        }
    }
}

impl From<&str> for PropertyKey {
    fn from(s: &str) -> Self {
        PropertyKey::name(s)
    }
}

impl From<Atom> for PropertyKey {
    fn from(atom: Atom) -> Self {
        PropertyKey::String(atom)
    }
}

impl From<Symbol> for PropertyKey {
    fn from(sym: Symbol) -> Self {
        PropertyKey::Symbol(sym)
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKey::String(atom) => write!(f, "{}", atom),
            PropertyKey::Symbol(sym) => write!(f, "{}", sym),
        }
    }
}

impl fmt::Debug for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKey::String(atom) => write!(f, "{:?}", &*atom.as_str()),
            PropertyKey::Symbol(sym) => write!(f, "{:?}", sym),
        }
    }
}
