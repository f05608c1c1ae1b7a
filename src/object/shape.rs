//! Shapes (hidden classes)
//!
//! Objects that gained the same properties in the same order, with the same
//! attributes, the same prototype and the same class share one [`Shape`].
//! Shapes are immutable; adding a property moves the object along a cached
//! transition to a child shape:
//!
//! ```text
//!     root(proto)
//!         |
//!       "x"
//!         |
//!      {x}  ── "y" ──>  {x, y}
//! ```
//!
//! Changing the prototype or preventing extensions moves just that object
//! onto another shape. Deleting a property or changing its attributes is
//! incompatible: the object's old shape is marked invalid and the object is
//! rebuilt onto a fresh shape by replaying its properties from a valid root.
//! Other objects still holding the invalid shape keep working through the
//! generic paths and migrate lazily. Invalid shapes are never handed out by
//! transitions again, so every cache entry pinned to one stays a miss.
//!
//! A shape keeps its parent alive, while roots and transitions are held
//! weakly, so a layout disappears once no object or cache uses it.

use super::ObjectClass;
use crate::runtime::PropertyKey;
use parking_lot::RwLock;
use rustc_hash::FxHashMap as HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, OnceLock, Weak};

bitflags::bitflags! {
    /// Property attributes, plus the storage kind of the slot
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PropertyFlags: u8 {
        /// Value can be changed
        const WRITABLE = 1 << 0;
        /// Shows up in enumeration
        const ENUMERABLE = 1 << 1;
        /// Can be deleted or reconfigured
        const CONFIGURABLE = 1 << 2;
        /// Slot holds a getter/setter pair
        const ACCESSOR = 1 << 3;
        /// Slot holds a property hook
        const HOOKED = 1 << 4;
    }
}

impl Default for PropertyFlags {
    /// Plain assignment creates writable, enumerable, configurable data
    fn default() -> Self {
        Self::WRITABLE | Self::ENUMERABLE | Self::CONFIGURABLE
    }
}

impl PropertyFlags {
    /// Frozen data property: neither writable nor configurable
    pub const fn frozen() -> Self {
        Self::ENUMERABLE
    }

    /// Attribute bits only, without the storage kind
    pub fn attributes(self) -> Self {
        self & (Self::WRITABLE | Self::ENUMERABLE | Self::CONFIGURABLE)
    }
}

/// Where and how a property is stored in objects of a shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyMeta {
    /// Index into the object's slot vector
    pub slot: usize,
    /// Attributes and storage kind
    pub flags: PropertyFlags,
}

impl PropertyMeta {
    pub fn is_accessor(&self) -> bool {
        self.flags.contains(PropertyFlags::ACCESSOR)
    }

    pub fn is_hooked(&self) -> bool {
        self.flags.contains(PropertyFlags::HOOKED)
    }

    pub fn is_data(&self) -> bool {
        !self.is_accessor() && !self.is_hooked()
    }

    pub fn is_writable(&self) -> bool {
        self.flags.contains(PropertyFlags::WRITABLE)
    }

    pub fn is_configurable(&self) -> bool {
        self.flags.contains(PropertyFlags::CONFIGURABLE)
    }
}

static NEXT_SHAPE_ID: AtomicU32 = AtomicU32::new(1);

type TransitionKey = (PropertyKey, PropertyFlags);
type RootKey = (ObjectClass, Option<u64>);

struct ShapeInner {
    id: u32,
    class: ObjectClass,
    prototype: Option<u64>,
    /// Keeps the path back to the root alive while this shape is in use
    parent: Option<Shape>,
    /// Keys in slot order
    keys: Vec<PropertyKey>,
    index: HashMap<PropertyKey, PropertyMeta>,
    extensible: bool,
    valid: AtomicBool,
    transitions: RwLock<WeakTable<TransitionKey>>,
}

impl Drop for ShapeInner {
    // Unlink the parent chain iteratively; long chains would overflow the
    // stack through nested drops.
    fn drop(&mut self) {
        let mut next = self.parent.take();
        while let Some(Shape(inner)) = next {
            next = match Arc::try_unwrap(inner) {
                Ok(mut parent) => parent.parent.take(),
                Err(_) => None,
            };
        }
    }
}

/// Immutable object layout; identity is pointer identity
#[derive(Clone)]
pub struct Shape(Arc<ShapeInner>);

/// Shapes by key, held weakly. Dead entries are swept whenever the table
/// has doubled since the last sweep.
struct WeakTable<K> {
    entries: HashMap<K, Weak<ShapeInner>>,
    sweep_at: usize,
}

const MIN_SWEEP: usize = 32;

impl<K: std::hash::Hash + Eq> WeakTable<K> {
    fn new() -> Self {
        WeakTable {
            entries: HashMap::default(),
            sweep_at: MIN_SWEEP,
        }
    }

    /// The live, valid shape under `key`
    fn get(&self, key: &K) -> Option<Shape> {
        self.entries
            .get(key)
            .and_then(Weak::upgrade)
            .map(Shape)
            .filter(Shape::is_valid)
    }

    fn insert(&mut self, key: K, shape: &Shape) {
        if self.entries.len() >= self.sweep_at {
            self.entries.retain(|_, w| w.strong_count() > 0);
            self.sweep_at = (self.entries.len() * 2).max(MIN_SWEEP);
        }
        self.entries.insert(key, Arc::downgrade(&shape.0));
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Empty shapes per class and prototype. A root stays registered only while
/// some object or descendant shape still uses it.
fn roots() -> &'static RwLock<WeakTable<RootKey>> {
    static ROOTS: OnceLock<RwLock<WeakTable<RootKey>>> = OnceLock::new();
    ROOTS.get_or_init(|| RwLock::new(WeakTable::new()))
}

impl Shape {
    fn build(
        class: ObjectClass,
        prototype: Option<u64>,
        parent: Option<Shape>,
        keys: Vec<PropertyKey>,
        index: HashMap<PropertyKey, PropertyMeta>,
        extensible: bool,
    ) -> Self {
        Shape(Arc::new(ShapeInner {
            id: NEXT_SHAPE_ID.fetch_add(1, Ordering::Relaxed),
            class,
            prototype,
            parent,
            keys,
            index,
            extensible,
            valid: AtomicBool::new(true),
            transitions: RwLock::new(WeakTable::new()),
        }))
    }

    /// The shared empty shape for objects of `class` whose prototype has ID `prototype`
    pub fn root(class: ObjectClass, prototype: Option<u64>) -> Self {
        let key = (class, prototype);
        if let Some(root) = roots().read().get(&key) {
            return root;
        }
        let mut table = roots().write();
        if let Some(root) = table.get(&key) {
            return root;
        }
        let root = Shape::build(class, prototype, None, Vec::new(), HashMap::default(), true);
        table.insert(key, &root);
        root
    }

    /// Number of root shapes registered, live or awaiting a sweep
    pub fn root_table_len() -> usize {
        roots().read().len()
    }

    /// Unique shape ID, for diagnostics
    pub fn id(&self) -> u32 {
        self.0.id
    }

    pub fn class(&self) -> ObjectClass {
        self.0.class
    }

    /// ID of the prototype object, if any
    pub fn prototype_id(&self) -> Option<u64> {
        self.0.prototype
    }

    pub fn is_extensible(&self) -> bool {
        self.0.extensible
    }

    /// Number of properties
    pub fn len(&self) -> usize {
        self.0.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.keys.is_empty()
    }

    /// Keys in slot order
    pub fn keys(&self) -> &[PropertyKey] {
        &self.0.keys
    }

    /// Find a property
    #[inline]
    pub fn lookup(&self, key: &PropertyKey) -> Option<PropertyMeta> {
        self.0.index.get(key).copied()
    }

    /// Whether caches may still rely on this shape
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.0.valid.load(Ordering::Acquire)
    }

    /// Mark this shape obsolete. Irreversible.
    pub(crate) fn invalidate(&self) {
        self.0.valid.store(false, Ordering::Release);
    }

    /// Identity comparison
    #[inline]
    pub fn ptr_eq(a: &Shape, b: &Shape) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    /// The shape reached by adding `key` with `flags` to this shape
    pub fn child_shape_for(&self, key: &PropertyKey, flags: PropertyFlags) -> Shape {
        let tkey = (key.clone(), flags);
        if let Some(child) = self.0.transitions.read().get(&tkey) {
            return child;
        }
        let mut transitions = self.0.transitions.write();
        if let Some(child) = transitions.get(&tkey) {
            return child;
        }
        let mut keys = self.0.keys.clone();
        let mut index = self.0.index.clone();
        index.insert(key.clone(), PropertyMeta { slot: keys.len(), flags });
        keys.push(key.clone());
        let child = Shape::build(
            self.0.class,
            self.0.prototype,
            Some(self.clone()),
            keys,
            index,
            self.0.extensible,
        );
        transitions.insert(tkey, &child);
        child
    }

    /// Rebuild a layout from a valid root
    pub fn replay<I>(class: ObjectClass, prototype: Option<u64>, properties: I, extensible: bool) -> Shape
    where
        I: IntoIterator<Item = (PropertyKey, PropertyFlags)>,
    {
        let mut shape = Shape::root(class, prototype);
        for (key, flags) in properties {
            shape = shape.child_shape_for(&key, flags);
        }
        if extensible {
            shape
        } else {
            shape.sealed_copy()
        }
    }

    /// Properties of this shape in slot order
    pub fn properties(&self) -> impl Iterator<Item = (PropertyKey, PropertyFlags)> + '_ {
        self.0.keys.iter().map(move |k| {
            let flags = self.0.index.get(k).map(|m| m.flags).unwrap_or_default();
            (k.clone(), flags)
        })
    }

    /// The valid equivalent of this shape
    pub fn migrated(&self) -> Shape {
        Shape::replay(self.0.class, self.0.prototype, self.properties(), self.0.extensible)
    }

    /// A non-extensible copy with the same properties. Never shared through
    /// transitions.
    fn sealed_copy(&self) -> Shape {
        Shape::build(
            self.0.class,
            self.0.prototype,
            Some(self.clone()),
            self.0.keys.clone(),
            self.0.index.clone(),
            false,
        )
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shape")
            .field("id", &self.0.id)
            .field("keys", &self.0.keys)
            .field("extensible", &self.0.extensible)
            .field("valid", &self.is_valid())
            .finish()
    }
}
