//! Property name interning
//!
//! Every string property key is interned once into a process-wide table so
//! that key comparison in cache guards and shape lookups is an integer
//! comparison. Interned names live for the rest of the process.

use parking_lot::RwLock;
use rustc_hash::FxHashMap as HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Names the caches special-case, interned up front
const SEEDED: &[&str] = &["length", "prototype", "constructor", "__proto__", "get", "set", "has", "default"];

#[derive(Default)]
struct AtomTable {
    ids: HashMap<Arc<str>, u32>,
    names: Vec<Arc<str>>,
}

impl AtomTable {
    fn seeded() -> Self {
        let mut table = Self::default();
        for name in SEEDED {
            table.insert(name);
        }
        table
    }

    fn insert(&mut self, s: &str) -> u32 {
        if let Some(&id) = self.ids.get(s) {
            return id;
        }
        let id = self.names.len() as u32;
        let name: Arc<str> = Arc::from(s);
        self.names.push(name.clone());
        self.ids.insert(name, id);
        id
    }
}

fn table() -> &'static RwLock<AtomTable> {
    static TABLE: OnceLock<RwLock<AtomTable>> = OnceLock::new();
    TABLE.get_or_init(|| RwLock::new(AtomTable::seeded()))
}

/// An interned property name
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Atom(u32);

impl Atom {
    /// Intern `s` and return its atom
    pub fn new(s: &str) -> Self {
        if let Some(atom) = Atom::lookup(s) {
            return atom;
        }
        Atom(table().write().insert(s))
    }

    /// The atom for `s` if it was interned before
    #[inline]
    pub fn lookup(s: &str) -> Option<Self> {
        table().read().ids.get(s).copied().map(Atom)
    }

    /// The interned ID
    pub fn id(self) -> u32 {
        self.0
    }

    /// The interned text
    pub fn as_str(self) -> Arc<str> {
        // Atoms are only minted by the table, so the ID is always present
        table().read().names.get(self.0 as usize).cloned().unwrap_or_else(|| Arc::from(""))
    }
}

impl From<&str> for Atom {
    fn from(s: &str) -> Self {
        Atom::new(s)
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

impl fmt::Debug for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Atom({:?})", &*self.as_str())
    }
}
