//! Receiver guards and key resolution
//!
//! A [`ReceiverCheck`] decides whether a cache entry applies to a receiver.
//! Checks never fail and have no side effects. A check is *valid* while every
//! shape it pins is valid; an accepting but invalid check is a structural
//! miss.

use crate::object::{ObjectClass, ObjectRef, PropertyMeta, PropertyValue, Shape};
use crate::runtime::{PrimitiveKind, PropertyKey, Value};

/// Guard of one cache entry
#[derive(Clone)]
pub(crate) enum ReceiverCheck {
    /// Receiver has exactly this shape
    Shape(Shape),
    /// Receiver has one of these shapes (all resolve the key identically)
    CombinedShape(Vec<Shape>),
    /// Receiver has `receiver` and each prototype still has its pinned shape
    PrototypeChain {
        receiver: Shape,
        prototypes: Vec<(ObjectRef, Shape)>,
    },
    /// Receiver is a non-shaped object of this class
    Class(ObjectClass),
    /// Receiver is a primitive of this kind; the lookup continues on pinned prototypes
    Primitive {
        kind: PrimitiveKind,
        prototypes: Vec<(ObjectRef, Shape)>,
    },
    /// Receiver is a foreign object
    Foreign,
    /// Receiver is undefined or null
    Nullish,
}

fn pinned(prototypes: &[(ObjectRef, Shape)]) -> bool {
    prototypes.iter().all(|(obj, shape)| Shape::ptr_eq(&obj.shape(), shape))
}

impl ReceiverCheck {
    /// Whether this entry applies to `receiver`
    #[inline]
    pub(crate) fn accepts(&self, receiver: &Value) -> bool {
        match self {
            ReceiverCheck::Shape(shape) => match receiver {
                Value::Object(obj) => Shape::ptr_eq(&obj.shape(), shape),
                _ => false,
            },
            ReceiverCheck::CombinedShape(shapes) => match receiver {
                Value::Object(obj) => {
                    let current = obj.shape();
                    shapes.iter().any(|s| Shape::ptr_eq(&current, s))
                }
                _ => false,
            },
            ReceiverCheck::PrototypeChain { receiver: shape, prototypes } => match receiver {
                Value::Object(obj) => Shape::ptr_eq(&obj.shape(), shape) && pinned(prototypes),
                _ => false,
            },
            ReceiverCheck::Class(class) => match receiver {
                Value::Object(obj) => obj.class() == *class,
                _ => false,
            },
            ReceiverCheck::Primitive { kind, prototypes } => {
                receiver.primitive_kind() == Some(*kind) && pinned(prototypes)
            }
            ReceiverCheck::Foreign => matches!(receiver, Value::Foreign(_)),
            ReceiverCheck::Nullish => receiver.is_nullish(),
        }
    }

    /// Whether every pinned shape is still valid
    #[inline]
    pub(crate) fn is_valid(&self) -> bool {
        match self {
            ReceiverCheck::Shape(shape) => shape.is_valid(),
            ReceiverCheck::CombinedShape(shapes) => shapes.iter().all(Shape::is_valid),
            ReceiverCheck::PrototypeChain { receiver, prototypes } => {
                receiver.is_valid() && prototypes.iter().all(|(_, s)| s.is_valid())
            }
            ReceiverCheck::Primitive { prototypes, .. } => prototypes.iter().all(|(_, s)| s.is_valid()),
            ReceiverCheck::Class(_) | ReceiverCheck::Foreign | ReceiverCheck::Nullish => true,
        }
    }

    /// Whether a receiver with `shape` passes the receiver part of this check
    #[inline]
    pub(crate) fn accepts_shape(&self, shape: &Shape) -> bool {
        match self {
            ReceiverCheck::Shape(s) => Shape::ptr_eq(s, shape),
            ReceiverCheck::CombinedShape(shapes) => shapes.iter().any(|s| Shape::ptr_eq(s, shape)),
            ReceiverCheck::PrototypeChain { receiver, .. } => Shape::ptr_eq(receiver, shape),
            _ => false,
        }
    }

    /// The single receiver shape of a depth-0 shape check
    pub(crate) fn single_shape(&self) -> Option<&Shape> {
        match self {
            ReceiverCheck::Shape(shape) => Some(shape),
            _ => None,
        }
    }

    /// Receiver shapes of a depth-0 shape check, combined or not
    pub(crate) fn layout_shapes(&self) -> Option<&[Shape]> {
        match self {
            ReceiverCheck::Shape(shape) => Some(std::slice::from_ref(shape)),
            ReceiverCheck::CombinedShape(shapes) => Some(shapes),
            _ => None,
        }
    }
}

/// Where a resolved property lives
#[derive(Clone)]
pub(crate) enum Holder {
    /// On the receiver itself
    Receiver,
    /// On a prototype, which has this shape
    Prototype(ObjectRef, Shape),
}

impl Holder {
    /// Read the holder's slot, provided the layouts are still the ones the
    /// entry was built for
    #[inline]
    pub(crate) fn read(&self, check: &ReceiverCheck, receiver: &Value, slot: usize) -> Option<PropertyValue> {
        match self {
            Holder::Receiver => receiver
                .as_object()?
                .read_slot_where(slot, |shape| check.accepts_shape(shape)),
            Holder::Prototype(obj, pinned) => obj.read_slot_where(slot, |shape| Shape::ptr_eq(shape, pinned)),
        }
    }
}

/// Outcome of walking a shaped prototype chain for one key
pub(crate) struct Resolution {
    /// The receiver's shape, if the lookup started on an object
    pub(crate) receiver: Option<Shape>,
    /// Prototypes visited, with their shapes
    pub(crate) prototypes: Vec<(ObjectRef, Shape)>,
    /// The property, if found
    pub(crate) found: Option<(Holder, PropertyMeta)>,
}

impl Resolution {
    /// The smallest check that keeps this resolution sound for `receiver`
    pub(crate) fn object_check(&self) -> Option<ReceiverCheck> {
        let receiver = self.receiver.clone()?;
        if self.prototypes.is_empty() {
            Some(ReceiverCheck::Shape(receiver))
        } else {
            Some(ReceiverCheck::PrototypeChain {
                receiver,
                prototypes: self.prototypes.clone(),
            })
        }
    }

    /// Check for a primitive receiver whose lookup started at its prototype
    pub(crate) fn primitive_check(&self, kind: PrimitiveKind) -> ReceiverCheck {
        ReceiverCheck::Primitive {
            kind,
            prototypes: self.prototypes.clone(),
        }
    }
}

/// Walk the chain from `start` looking for `key`.
///
/// With `start_is_receiver`, `start` is the receiver and its shape becomes
/// the receiver shape; otherwise every object walked counts as a prototype.
/// Objects on invalid shapes are migrated first. Returns `None` when the
/// chain cannot be guarded by shapes (a proxy or namespace on it, or a
/// dictionary-sized object), in which case the site should go generic.
pub(crate) fn resolve(
    start: &ObjectRef,
    start_is_receiver: bool,
    key: &PropertyKey,
    own_only: bool,
    dictionary_threshold: usize,
) -> Option<Resolution> {
    let mut resolution = Resolution {
        receiver: None,
        prototypes: Vec::new(),
        found: None,
    };
    let mut current = start.clone();
    let mut first = true;
    loop {
        if !current.is_shaped() {
            return None;
        }
        current.migrate_if_obsolete();
        let (shape, proto) = current.snapshot();
        if shape.len() > dictionary_threshold {
            return None;
        }
        let meta = shape.lookup(key);
        let holder = if first && start_is_receiver {
            resolution.receiver = Some(shape);
            Holder::Receiver
        } else {
            resolution.prototypes.push((current.clone(), shape.clone()));
            Holder::Prototype(current.clone(), shape)
        };
        if let Some(meta) = meta {
            resolution.found = Some((holder, meta));
            return Some(resolution);
        }
        if own_only && first {
            return Some(resolution);
        }
        first = false;
        match proto {
            Some(p) => current = p,
            None => return Some(resolution),
        }
    }
}
