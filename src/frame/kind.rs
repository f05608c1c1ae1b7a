//! Slot representation lattice
//!
//! `Illegal` is below everything and `Object` above everything. The numeric
//! kinds form a chain `Int < Long < Double`; `Boolean` joined with any
//! numeric kind is `Object`. A slot only ever moves up.

use crate::runtime::Value;
use serde::Serialize;
use std::fmt;

/// Speculated representation of a frame slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum SlotKind {
    /// Never written
    Illegal = 0,
    Boolean = 1,
    Int = 2,
    Long = 3,
    Double = 4,
    /// Any value, boxed
    Object = 5,
}

impl SlotKind {
    pub(crate) fn from_u8(raw: u8) -> SlotKind {
        match raw {
            0 => SlotKind::Illegal,
            1 => SlotKind::Boolean,
            2 => SlotKind::Int,
            3 => SlotKind::Long,
            4 => SlotKind::Double,
            _ => SlotKind::Object,
        }
    }

    /// The narrowest kind that holds `value`
    pub fn of(value: &Value) -> SlotKind {
        match value {
            Value::Boolean(_) => SlotKind::Boolean,
            Value::Int(_) => SlotKind::Int,
            Value::Long(_) => SlotKind::Long,
            Value::Number(_) => SlotKind::Double,
            _ => SlotKind::Object,
        }
    }

    /// Whether a slot of this kind can store `value` without generalizing
    #[inline]
    pub fn can_hold(self, value: &Value) -> bool {
        match self {
            SlotKind::Illegal => false,
            SlotKind::Boolean => matches!(value, Value::Boolean(_)),
            SlotKind::Int => matches!(value, Value::Int(_)),
            SlotKind::Long => matches!(value, Value::Int(_) | Value::Long(_)),
            SlotKind::Double => matches!(value, Value::Int(_) | Value::Long(_) | Value::Number(_)),
            SlotKind::Object => true,
        }
    }

    /// Least upper bound of two kinds
    pub fn join(self, other: SlotKind) -> SlotKind {
        use SlotKind::*;
        match (self, other) {
            (Illegal, k) | (k, Illegal) => k,
            (a, b) if a == b => a,
            (Int, Long) | (Long, Int) => Long,
            (Int | Long, Double) | (Double, Int | Long) => Double,
            _ => Object,
        }
    }

    /// Whether moving from `self` to `next` follows the lattice
    pub fn may_become(self, next: SlotKind) -> bool {
        self.join(next) == next
    }

    /// Convert `value` to this kind's representation. Only called when
    /// `can_hold` is true.
    pub(crate) fn coerce(self, value: Value) -> Value {
        match (self, value) {
            (SlotKind::Long, Value::Int(n)) => Value::Long(n as i64),
            (SlotKind::Double, Value::Int(n)) => Value::Number(n as f64),
            (SlotKind::Double, Value::Long(n)) => Value::Number(n as f64),
            (_, value) => value,
        }
    }
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SlotKind::Illegal => "illegal",
            SlotKind::Boolean => "boolean",
            SlotKind::Int => "int",
            SlotKind::Long => "long",
            SlotKind::Double => "double",
            SlotKind::Object => "object",
        };
        f.write_str(name)
    }
}
