//! The payload carried by each type-lattice node.

use crate::union_find::TypeId;

/// Known signedness of an integer-ish type.
///
/// Unlike the boolean pair in the original design note, this is modelled
/// as a small lattice of its own: `Unknown` is the bottom element, and it
/// can be raised to `Signed` or `Unsigned` but never lowered again, and
/// never flipped from one concrete signedness to the other (that is an
/// [`crate::TypeError::Incompatible`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signedness {
    /// No evidence of signedness has been observed yet.
    Unknown,
    /// The term is known to be interpreted as signed.
    Signed,
    /// The term is known to be interpreted as unsigned.
    Unsigned,
}

impl Signedness {
    /// Joins two observations, returning `None` if they conflict.
    pub fn join(self, other: Signedness) -> Option<Signedness> {
        use Signedness::*;
        match (self, other) {
            (Unknown, x) | (x, Unknown) => Some(x),
            (Signed, Signed) => Some(Signed),
            (Unsigned, Unsigned) => Some(Unsigned),
            (Signed, Unsigned) | (Unsigned, Signed) => None,
        }
    }
}

/// Per-node payload of the type union-find.
///
/// Mirrors the source's `Type` class: every term starts out as a
/// completely unconstrained integer of its own bit-width, and propagation
/// rules only ever add facts (never remove them) until a fixed point is
/// reached. `size` is the one field that is monotonically *decreasing*:
/// it starts at the term's bit width and may shrink if unification with a
/// narrower pointee/field proves the value is only partially used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo {
    /// Current size in bits. Never grows once narrowed.
    pub size: u32,
    /// Proven to be used as a plain integer.
    pub is_integer: bool,
    /// Proven to be used as a floating-point value (mutually exclusive in
    /// practice with `is_pointer`, though both may be unset).
    pub is_float: bool,
    /// Proven to be used as a pointer.
    pub is_pointer: bool,
    /// Observed signedness, if any.
    pub signedness: Signedness,
    /// Pointee type, set only when `is_pointer` is true.
    pub pointee: Option<TypeId>,
    /// gcd of all observed multiplicative increments against this type,
    /// used to recover the pointer's element stride. Starts at 0 (no
    /// evidence); 0 joined with anything yields that thing, per gcd(0,n)=n.
    pub factor: u64,
    /// Set whenever this node's fields changed during the current
    /// iteration; cleared by the analyzer once the iteration that
    /// observed the change has been reprocessed to a fixed point.
    pub changed: bool,
}

impl TypeInfo {
    /// A fresh, maximally unconstrained node of the given bit size.
    pub fn unconstrained(size: u32) -> Self {
        TypeInfo {
            size,
            is_integer: false,
            is_float: false,
            is_pointer: false,
            signedness: Signedness::Unknown,
            pointee: None,
            factor: 0,
            changed: false,
        }
    }

    /// Joins `other` into `self` in place, setting `changed` if anything
    /// new was learned. `self.size` shrinks to `min(self.size,
    /// other.size)` since size is the one monotonically-decreasing field.
    ///
    /// Returns `true` if a fact was added or the size shrank (i.e. the
    /// node changed and the fixed-point loop must keep iterating).
    pub fn merge_from(&mut self, other: &TypeInfo) -> bool {
        let mut changed = false;

        if other.size < self.size {
            self.size = other.size;
            changed = true;
        }
        if other.is_integer && !self.is_integer {
            self.is_integer = true;
            changed = true;
        }
        if other.is_float && !self.is_float {
            self.is_float = true;
            changed = true;
        }
        if other.is_pointer && !self.is_pointer {
            self.is_pointer = true;
            changed = true;
        }
        if let Some(joined) = self.signedness.join(other.signedness) {
            if joined != self.signedness {
                self.signedness = joined;
                changed = true;
            }
        }
        if self.pointee.is_none() && other.pointee.is_some() {
            self.pointee = other.pointee;
            changed = true;
        }
        let new_factor = gcd(self.factor, other.factor);
        if new_factor != self.factor {
            self.factor = new_factor;
            changed = true;
        }

        self.changed |= changed;
        changed
    }

    /// Records a multiplicative constant observed for this type (e.g. a
    /// `mul` by a constant, or a constant stride in a pointer-arithmetic
    /// `add`), folding it into the gcd-factor.
    pub fn observe_factor(&mut self, value: u64) -> bool {
        if value == 0 {
            return false;
        }
        let new_factor = gcd(self.factor, value);
        if new_factor != self.factor {
            self.factor = new_factor;
            self.changed = true;
            true
        } else {
            false
        }
    }
}

fn gcd(a: u64, b: u64) -> u64 {
    let (mut a, mut b) = (a, b);
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}
