//! Stack-offset tracking, layered on top of [`super::abstract_value`].
//!
//! Ported from the source's `SimulationContext`, which rides alongside the
//! bit-lattice to answer "is this value `frame-base + k`" without needing a
//! separate symbolic-execution pass.

use serde::{Deserialize, Serialize};

use super::abstract_value::AbstractValue;

/// Whether a value is known to be a stack offset, known *not* to be one, or
/// undetermined. The two "known" states are mutually exclusive by
/// construction (§3: "two disjoint flags").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StackAttribute {
    /// Not yet determined either way.
    Unknown,
    /// Known to equal `frame-base + offset`.
    Offset(i64),
    /// Known to not be any stack offset (e.g. the sum of two stack
    /// offsets, or an offset plus an unrelated unknown value).
    NotOffset,
}

impl StackAttribute {
    /// Adds a constant `delta` to a stack offset, if this value is one.
    pub fn add_constant(self, delta: i64) -> StackAttribute {
        match self {
            StackAttribute::Offset(k) => StackAttribute::Offset(k + delta),
            other => other,
        }
    }

    /// Combines two operands of a binary operator: offset-of is only
    /// preserved through a single addend. Two real offsets, or an offset
    /// and an unrelated non-constant, are definitively not an offset.
    pub fn combine_additive(self, other: StackAttribute) -> StackAttribute {
        match (self, other) {
            (StackAttribute::Offset(_), StackAttribute::Offset(_)) => StackAttribute::NotOffset,
            (StackAttribute::Offset(k), StackAttribute::Unknown) | (StackAttribute::Unknown, StackAttribute::Offset(k)) => StackAttribute::NotOffset.unless_zero(k),
            _ => StackAttribute::Unknown,
        }
    }

    fn unless_zero(self, _k: i64) -> StackAttribute {
        // Adding an offset to a value whose own offset-ness is merely
        // undetermined (not proven absent) still can't be trusted as an
        // offset: conservatively not-an-offset, matching the source's
        // "clears the attribute" rule for anything but a literal constant.
        StackAttribute::NotOffset
    }

    /// True iff this is a known, concrete offset.
    pub fn is_known(&self) -> bool {
        matches!(self, StackAttribute::Offset(_))
    }
}

/// A term's full dataflow-computed value: bit-lattice plus stack-offset
/// attribute. Memory-location is tracked separately by the analyzer since
/// it additionally depends on the enclosing `Dereference`/access context.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TermValue {
    /// The bit-wise lattice value.
    pub abstract_value: AbstractValue,
    /// The stack-offset attribute.
    pub stack_attribute: StackAttribute,
}

impl TermValue {
    /// A fully unconstrained value of `size` bits with undetermined
    /// stack-offset attribute.
    pub fn top(size: u32) -> TermValue {
        TermValue { abstract_value: AbstractValue::top(size), stack_attribute: StackAttribute::Unknown }
    }

    /// A concrete value, definitively not a stack offset.
    pub fn concrete(size: u32, value: u64) -> TermValue {
        TermValue { abstract_value: AbstractValue::concrete(size, value), stack_attribute: StackAttribute::NotOffset }
    }

    /// The frame-base value (`offset 0`) bound to the stack pointer at
    /// function entry, before any write reaches it.
    pub fn frame_base(size: u32) -> TermValue {
        TermValue { abstract_value: AbstractValue::top(size), stack_attribute: StackAttribute::Offset(0) }
    }

    /// Joins two values at a control-flow merge point. Per §9's open
    /// question, conflicting offsets at a merge prefer the larger signed
    /// offset (fewer pushes outstanding) rather than collapsing to
    /// `NotOffset` — callers must not rely on exact offsets at merges
    /// after an unmatched call.
    pub fn join(&self, other: &TermValue) -> TermValue {
        let stack_attribute = match (self.stack_attribute, other.stack_attribute) {
            (StackAttribute::Offset(a), StackAttribute::Offset(b)) => StackAttribute::Offset(a.max(b)),
            (StackAttribute::Offset(a), StackAttribute::Unknown) | (StackAttribute::Unknown, StackAttribute::Offset(a)) => StackAttribute::Offset(a),
            (StackAttribute::NotOffset, StackAttribute::NotOffset) => StackAttribute::NotOffset,
            _ => StackAttribute::Unknown,
        };
        TermValue { abstract_value: self.abstract_value.join(&other.abstract_value), stack_attribute }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adding_constant_to_offset_shifts_it() {
        let base = TermValue::frame_base(32);
        assert_eq!(base.stack_attribute.add_constant(-4), StackAttribute::Offset(-4));
    }

    #[test]
    fn two_offsets_combined_are_not_an_offset() {
        let combined = StackAttribute::Offset(4).combine_additive(StackAttribute::Offset(8));
        assert_eq!(combined, StackAttribute::NotOffset);
    }

    #[test]
    fn merge_of_conflicting_offsets_prefers_larger() {
        let a = TermValue { abstract_value: AbstractValue::top(32), stack_attribute: StackAttribute::Offset(-4) };
        let b = TermValue { abstract_value: AbstractValue::top(32), stack_attribute: StackAttribute::Offset(-8) };
        assert_eq!(a.join(&b).stack_attribute, StackAttribute::Offset(-4));
    }
}
