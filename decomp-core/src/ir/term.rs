//! The algebraic core of the IR: [`Term`], a typed expression node.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::memory_location::{Domain, MemoryLocation};

/// Stable, process-wide-unique identifier for a [`Term`].
///
/// The term graph itself is a tree (children are owned via `Box`); this id
/// is how external tables (reaching definitions, dataflow values, the type
/// union-find) refer back to a specific node without borrowing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TermId(u32);

/// Allocates process-unique [`TermId`]s for one [`super::Program`].
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct TermIdSource(u32);

impl TermIdSource {
    /// Allocates the next id.
    pub fn next(&mut self) -> TermId {
        let id = TermId(self.0);
        self.0 += 1;
        id
    }
}

/// One bit of access-flag information about how a term is used at its
/// position in a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessFlag {
    /// The term's value is read.
    Read,
    /// The term's location is written.
    Write,
    /// A prior definition is invalidated without a new value being given.
    Kill,
}

/// Unary operators (`UnaryOp` variant of [`Term`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOperator {
    /// Bitwise complement.
    Not,
    /// Arithmetic negation.
    Neg,
    /// Sign-extend to the enclosing term's size.
    SignExtend,
    /// Zero-extend to the enclosing term's size.
    ZeroExtend,
    /// Truncate to the enclosing term's size.
    Truncate,
}

/// Binary operators (`BinaryOp` variant of [`Term`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOperator {
    /// Addition.
    Add,
    /// Subtraction.
    Sub,
    /// Multiplication (low bits).
    Mul,
    /// Unsigned division.
    UDiv,
    /// Signed division.
    SDiv,
    /// Unsigned remainder.
    URem,
    /// Signed remainder.
    SRem,
    /// Bitwise and.
    And,
    /// Bitwise or.
    Or,
    /// Bitwise xor.
    Xor,
    /// Logical shift left.
    Shl,
    /// Logical shift right.
    Shr,
    /// Arithmetic shift right.
    Sar,
    /// Equality comparison (result is a 1-bit boolean).
    Eq,
    /// Unsigned less-than.
    ULt,
    /// Signed less-than.
    SLt,
    /// Unsigned less-or-equal.
    ULe,
    /// Signed less-or-equal.
    SLe,
}

impl BinaryOperator {
    /// True for the three comparison families whose result is a 1-bit
    /// boolean rather than a value of the operands' size.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOperator::Eq
                | BinaryOperator::ULt
                | BinaryOperator::SLt
                | BinaryOperator::ULe
                | BinaryOperator::SLe
        )
    }

    /// True for operators whose type-analyzer rule constrains signedness
    /// ([MODULE] Type Analyzer propagation rules).
    pub fn is_signed_sensitive(self) -> bool {
        matches!(
            self,
            BinaryOperator::SDiv
                | BinaryOperator::SRem
                | BinaryOperator::Sar
                | BinaryOperator::SLt
                | BinaryOperator::SLe
        )
    }
}

/// Kind of opaque value produced by an [`Term::Intrinsic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntrinsicKind {
    /// Fully unknown value (e.g. an unresolved external read).
    Unknown,
    /// The return address pushed by a `Call`/implied by the ABI.
    ReturnAddress,
    /// Explicitly undefined (e.g. flags left unspecified by an opcode).
    Undefined,
}

/// A typed IR expression node — the algebraic core described in §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Term {
    id: TermId,
    size: u32,
    flags: Vec<AccessFlag>,
    kind: TermKind,
}

/// The variant payload of a [`Term`], kept separate from the common
/// `id`/`size`/`flags` fields that every variant carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TermKind {
    /// A literal bit-vector.
    Constant {
        /// The literal value, truncated to `size` bits.
        value: u64,
    },
    /// An opaque value.
    Intrinsic {
        /// Which flavor of opaque value.
        kind: IntrinsicKind,
    },
    /// A named abstract storage cell.
    MemoryLocationAccess {
        /// The accessed location.
        location: MemoryLocation,
    },
    /// A read/write of memory via a computed address.
    Dereference {
        /// The address expression.
        address: Box<Term>,
        /// The memory domain being dereferenced (usually `Domain::Memory`,
        /// but can resolve to `Domain::Stack` once the dataflow analyzer
        /// proves the address is `frame-base + k`).
        domain: Domain,
    },
    /// A unary operation.
    UnaryOp {
        /// The operator.
        op: UnaryOperator,
        /// The operand.
        operand: Box<Term>,
    },
    /// A binary operation.
    BinaryOp {
        /// The operator.
        op: BinaryOperator,
        /// Left operand.
        left: Box<Term>,
        /// Right operand.
        right: Box<Term>,
    },
    /// Selects `preferred` if it has any reaching definition, else
    /// `default`.
    Choice {
        /// The preferred term.
        preferred: Box<Term>,
        /// The fallback term.
        default: Box<Term>,
    },
}

impl Term {
    fn new(id_source: &mut TermIdSource, size: u32, kind: TermKind) -> Term {
        Term { id: id_source.next(), size, flags: Vec::new(), kind }
    }

    /// Builds a constant term.
    pub fn constant(ids: &mut TermIdSource, size: u32, value: u64) -> Term {
        let mask = if size >= 64 { u64::MAX } else { (1u64 << size) - 1 };
        Term::new(ids, size, TermKind::Constant { value: value & mask })
    }

    /// Builds an intrinsic term.
    pub fn intrinsic(ids: &mut TermIdSource, size: u32, kind: IntrinsicKind) -> Term {
        Term::new(ids, size, TermKind::Intrinsic { kind })
    }

    /// Builds a memory-location-access term.
    pub fn memory_location_access(ids: &mut TermIdSource, location: MemoryLocation) -> Term {
        let size = location.bit_size();
        Term::new(ids, size, TermKind::MemoryLocationAccess { location })
    }

    /// Builds a dereference term of the given result size.
    pub fn dereference(ids: &mut TermIdSource, address: Term, domain: Domain, size: u32) -> Term {
        Term::new(ids, size, TermKind::Dereference { address: Box::new(address), domain })
    }

    /// Builds a unary-operator term.
    pub fn unary(ids: &mut TermIdSource, op: UnaryOperator, operand: Term, size: u32) -> Term {
        Term::new(ids, size, TermKind::UnaryOp { op, operand: Box::new(operand) })
    }

    /// Builds a binary-operator term. `size` is the *result* size: equal
    /// to the operand size for arithmetic/bitwise ops, 1 for comparisons.
    pub fn binary(ids: &mut TermIdSource, op: BinaryOperator, left: Term, right: Term, size: u32) -> Term {
        Term::new(ids, size, TermKind::BinaryOp { op, left: Box::new(left), right: Box::new(right) })
    }

    /// Builds a choice term.
    pub fn choice(ids: &mut TermIdSource, preferred: Term, default: Term) -> Term {
        let size = preferred.size;
        Term::new(ids, size, TermKind::Choice { preferred: Box::new(preferred), default: Box::new(default) })
    }

    /// This term's stable identifier.
    pub fn id(&self) -> TermId {
        self.id
    }

    /// This term's bit-size — demanded by its enclosing context, and
    /// equal to its sub-terms' sizes wherever the invariant in §3
    /// ("term sizes match the sizes demanded by their enclosing context")
    /// requires it.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// The variant payload.
    pub fn kind(&self) -> &TermKind {
        &self.kind
    }

    /// Mutable access to the variant payload (used by the x86-64
    /// zero-extend post-pass and similar statement-rewriting passes).
    pub fn kind_mut(&mut self) -> &mut TermKind {
        &mut self.kind
    }

    /// Current access-flag set.
    pub fn flags(&self) -> &[AccessFlag] {
        &self.flags
    }

    /// Adds an access flag (assignment construction sets `Write` on the
    /// LHS and leaves the RHS with only `Read`, per §3).
    pub fn with_flag(mut self, flag: AccessFlag) -> Term {
        if !self.flags.contains(&flag) {
            self.flags.push(flag);
        }
        self
    }

    /// If this term is a [`TermKind::MemoryLocationAccess`], the location.
    pub fn as_memory_location(&self) -> Option<&MemoryLocation> {
        match &self.kind {
            TermKind::MemoryLocationAccess { location } => Some(location),
            _ => None,
        }
    }

    /// If this term is a [`TermKind::Constant`], its value.
    pub fn as_constant(&self) -> Option<u64> {
        match &self.kind {
            TermKind::Constant { value } => Some(*value),
            _ => None,
        }
    }

    /// Visits this term and every descendant (pre-order), following the
    /// invariant that the term graph is a tree.
    pub fn visit<'a>(&'a self, f: &mut impl FnMut(&'a Term)) {
        f(self);
        match &self.kind {
            TermKind::Dereference { address, .. } => address.visit(f),
            TermKind::UnaryOp { operand, .. } => operand.visit(f),
            TermKind::BinaryOp { left, right, .. } => {
                left.visit(f);
                right.visit(f);
            }
            TermKind::Choice { preferred, default } => {
                preferred.visit(f);
                default.visit(f);
            }
            TermKind::Constant { .. }
            | TermKind::Intrinsic { .. }
            | TermKind::MemoryLocationAccess { .. } => {}
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TermKind::Constant { value } => write!(f, "0x{value:x}:{}", self.size),
            TermKind::Intrinsic { kind } => write!(f, "{kind:?}:{}", self.size),
            TermKind::MemoryLocationAccess { location } => write!(f, "{location}"),
            TermKind::Dereference { address, domain } => write!(f, "*[{domain:?}]({address})"),
            TermKind::UnaryOp { op, operand } => write!(f, "{op:?}({operand})"),
            TermKind::BinaryOp { op, left, right } => write!(f, "({left} {op:?} {right})"),
            TermKind::Choice { preferred, default } => write!(f, "choice({preferred}, {default})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_truncates_to_size() {
        let mut ids = TermIdSource::default();
        let t = Term::constant(&mut ids, 8, 0x1FF);
        assert_eq!(t.as_constant(), Some(0xFF));
        assert_eq!(t.size(), 8);
    }

    #[test]
    fn term_ids_are_unique() {
        let mut ids = TermIdSource::default();
        let a = Term::constant(&mut ids, 32, 1);
        let b = Term::constant(&mut ids, 32, 2);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn visit_reaches_every_descendant() {
        let mut ids = TermIdSource::default();
        let a = Term::constant(&mut ids, 32, 1);
        let b = Term::constant(&mut ids, 32, 2);
        let sum = Term::binary(&mut ids, BinaryOperator::Add, a, b, 32);
        let mut count = 0;
        sum.visit(&mut |_| count += 1);
        assert_eq!(count, 3);
    }
}
