//! Typed local-variable slots
//!
//! A [`FrameDescriptor`] is shared by every activation of one function body
//! and records, per slot, the representation speculated so far. Each
//! activation gets its own [`Frame`] holding the values. A write that does
//! not fit the slot's kind generalizes the kind for all activations and
//! bumps the descriptor's generation, which invalidates code specialized on
//! the old kinds.
//!
//! Slots declared with a temporal dead zone start out dead: reading one
//! before its first write is a ReferenceError.

mod inc;
mod kind;

pub use inc::{Fixity, IncDecOp};
pub use kind::SlotKind;

use crate::error::{messages, Error, Result};
use crate::runtime::Value;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

/// One local variable of a function body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSlot {
    index: usize,
    identifier: Arc<str>,
    tdz: bool,
}

impl FrameSlot {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Whether the slot has a temporal dead zone (`let`, `const`, `class`)
    pub fn has_tdz(&self) -> bool {
        self.tdz
    }
}

/// Slot layout and kind side table of one function body
#[derive(Debug)]
pub struct FrameDescriptor {
    slots: Vec<FrameSlot>,
    kinds: Box<[AtomicU8]>,
    generation: AtomicU64,
}

impl FrameDescriptor {
    pub fn builder() -> FrameDescriptorBuilder {
        FrameDescriptorBuilder { slots: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[FrameSlot] {
        &self.slots
    }

    /// Look a slot up by identifier
    pub fn slot(&self, identifier: &str) -> Option<&FrameSlot> {
        self.slots.iter().find(|s| &*s.identifier == identifier)
    }

    /// Current kind of a slot
    #[inline]
    pub fn kind(&self, slot: &FrameSlot) -> SlotKind {
        self.kinds
            .get(slot.index)
            .map(|k| SlotKind::from_u8(k.load(Ordering::Acquire)))
            .unwrap_or(SlotKind::Object)
    }

    /// Bumped on every kind change
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Widen the slot until it holds `value`. Concurrent activations may
    /// race; the compare-exchange loop keeps every change monotonic.
    fn generalize(&self, slot: &FrameSlot, value: &Value) -> SlotKind {
        let cell = &self.kinds[slot.index];
        let mut current = cell.load(Ordering::Acquire);
        loop {
            let kind = SlotKind::from_u8(current);
            if kind.can_hold(value) {
                return kind;
            }
            let next = kind.join(SlotKind::of(value));
            match cell.compare_exchange(current, next as u8, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => {
                    self.generation.fetch_add(1, Ordering::AcqRel);
                    tracing::debug!(slot = slot.identifier(), from = %kind, to = %next, "slot kind generalized");
                    return next;
                }
                Err(actual) => current = actual,
            }
        }
    }
}

/// Builder for [`FrameDescriptor`]
#[derive(Debug, Default)]
pub struct FrameDescriptorBuilder {
    slots: Vec<(String, bool)>,
}

impl FrameDescriptorBuilder {
    /// Plain slot (`var`, parameter)
    pub fn slot(mut self, identifier: &str) -> Self {
        self.slots.push((identifier.to_string(), false));
        self
    }

    /// Slot with a temporal dead zone
    pub fn tdz_slot(mut self, identifier: &str) -> Self {
        self.slots.push((identifier.to_string(), true));
        self
    }

    pub fn build(self) -> Arc<FrameDescriptor> {
        let slots: Vec<FrameSlot> = self
            .slots
            .into_iter()
            .enumerate()
            .map(|(index, (identifier, tdz))| FrameSlot {
                index,
                identifier: Arc::from(identifier),
                tdz,
            })
            .collect();
        // The dead marker is an object, so dead-zone slots begin generic.
        let kinds = slots
            .iter()
            .map(|s| AtomicU8::new((if s.tdz { SlotKind::Object } else { SlotKind::Illegal }) as u8))
            .collect();
        Arc::new(FrameDescriptor {
            slots,
            kinds,
            generation: AtomicU64::new(0),
        })
    }
}

/// Values of one activation. `None` is the dead marker.
#[derive(Debug)]
pub struct Frame {
    descriptor: Arc<FrameDescriptor>,
    values: Vec<Option<Value>>,
}

impl Frame {
    pub fn new(descriptor: &Arc<FrameDescriptor>) -> Self {
        let values = descriptor
            .slots
            .iter()
            .map(|s| if s.tdz { None } else { Some(Value::Undefined) })
            .collect();
        Self {
            descriptor: descriptor.clone(),
            values,
        }
    }

    pub fn descriptor(&self) -> &Arc<FrameDescriptor> {
        &self.descriptor
    }

    fn stored(&self, slot: &FrameSlot) -> Result<&Option<Value>> {
        // Each descriptor allocates its own identifiers, so pointer identity
        // tells its slots apart from look-alikes of another descriptor
        let owned = self
            .descriptor
            .slots
            .get(slot.index)
            .is_some_and(|s| Arc::ptr_eq(&s.identifier, &slot.identifier));
        match self.values.get(slot.index) {
            Some(v) if owned => Ok(v),
            _ => Err(Error::InternalError(format!(
                "slot '{}' does not belong to this frame",
                slot.identifier
            ))),
        }
    }

    /// Whether the slot is still in its dead zone
    pub fn is_dead(&self, slot: &FrameSlot) -> Result<bool> {
        Ok(self.stored(slot)?.is_none())
    }

    /// Kind-agnostic read
    pub fn read(&self, slot: &FrameSlot) -> Result<Value> {
        match self.stored(slot)? {
            Some(value) => Ok(value.clone()),
            None => Err(Error::reference_error(messages::before_init(slot.identifier()))),
        }
    }

    /// Read a slot speculated as `expected`. Any other kind reports the
    /// actual value through `Error::UnexpectedResult`.
    fn read_kind(&self, slot: &FrameSlot, expected: SlotKind) -> Result<Value> {
        let value = self.read(slot)?;
        if self.descriptor.kind(slot) == expected {
            Ok(value)
        } else {
            Err(Error::unexpected(value))
        }
    }

    pub fn read_boolean(&self, slot: &FrameSlot) -> Result<bool> {
        match self.read_kind(slot, SlotKind::Boolean)? {
            Value::Boolean(b) => Ok(b),
            other => Err(Error::unexpected(other)),
        }
    }

    pub fn read_int(&self, slot: &FrameSlot) -> Result<i32> {
        match self.read_kind(slot, SlotKind::Int)? {
            Value::Int(n) => Ok(n),
            other => Err(Error::unexpected(other)),
        }
    }

    pub fn read_long(&self, slot: &FrameSlot) -> Result<i64> {
        match self.read_kind(slot, SlotKind::Long)? {
            Value::Int(n) => Ok(n as i64),
            Value::Long(n) => Ok(n),
            other => Err(Error::unexpected(other)),
        }
    }

    pub fn read_double(&self, slot: &FrameSlot) -> Result<f64> {
        match self.read_kind(slot, SlotKind::Double)? {
            Value::Int(n) => Ok(n as f64),
            Value::Long(n) => Ok(n as f64),
            Value::Number(n) => Ok(n),
            other => Err(Error::unexpected(other)),
        }
    }

    pub fn read_object(&self, slot: &FrameSlot) -> Result<Value> {
        self.read_kind(slot, SlotKind::Object)
    }

    /// Store `value`, generalizing the slot kind if it does not fit.
    /// Returns the value in the representation it was stored in.
    pub fn write(&mut self, slot: &FrameSlot, value: Value) -> Result<Value> {
        self.stored(slot)?;
        let mut kind = self.descriptor.kind(slot);
        if !kind.can_hold(&value) {
            kind = self.descriptor.generalize(slot, &value);
        }
        let stored = kind.coerce(value);
        self.values[slot.index] = Some(stored.clone());
        Ok(stored)
    }

    /// Put a dead-zone slot back into its dead zone (fresh per-iteration
    /// loop bindings)
    pub fn clear(&mut self, slot: &FrameSlot) -> Result<()> {
        self.stored(slot)?;
        if !slot.tdz {
            return Err(Error::InternalError(format!(
                "slot '{}' has no dead zone and cannot be cleared",
                slot.identifier
            )));
        }
        self.values[slot.index] = None;
        Ok(())
    }
}
