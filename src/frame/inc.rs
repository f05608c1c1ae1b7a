//! `++` / `--` on local slots

use super::{Frame, FrameSlot};
use crate::error::Result;
use crate::runtime::Value;

/// Increment or decrement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncDecOp {
    Increment,
    Decrement,
}

/// Whether the expression yields the new (`++x`) or old (`x++`) value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fixity {
    Prefix,
    Postfix,
}

impl IncDecOp {
    fn delta(self) -> i32 {
        match self {
            IncDecOp::Increment => 1,
            IncDecOp::Decrement => -1,
        }
    }

    /// Returns the numeric old value and the updated value. Integer
    /// representations are kept until they overflow.
    fn apply(self, old: &Value) -> (Value, Value) {
        let delta = self.delta();
        match *old {
            Value::Int(n) => match n.checked_add(delta) {
                Some(r) => (Value::Int(n), Value::Int(r)),
                None => (Value::Int(n), Value::Number(n as f64 + delta as f64)),
            },
            Value::Long(n) => match n.checked_add(delta as i64) {
                Some(r) => (Value::Long(n), Value::Long(r)),
                None => (Value::Long(n), Value::Number(n as f64 + delta as f64)),
            },
            Value::Number(d) => (Value::Number(d), Value::Number(d + delta as f64)),
            ref other => {
                let d = other.to_number();
                (Value::Number(d), Value::Number(d + delta as f64))
            }
        }
    }
}

impl Frame {
    /// Apply `++`/`--` to a slot and return the expression value
    pub fn increment(&mut self, slot: &FrameSlot, op: IncDecOp, fixity: Fixity) -> Result<Value> {
        let old = self.read(slot)?;
        let (old, new) = op.apply(&old);
        let stored = self.write(slot, new)?;
        Ok(match fixity {
            Fixity::Prefix => stored,
            Fixity::Postfix => old,
        })
    }
}
