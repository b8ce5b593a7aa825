//! [`Statement`]: the IR's executable unit.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::term::{AccessFlag, Term};

/// Address of a [`super::BasicBlock`], also used as its handle: `Program`
/// keys its blocks by the address of their first instruction, so a
/// `u64` address doubles as a stable, copyable block handle.
pub type BlockAddress = u64;

/// The kind of a [`Statement::Touch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TouchKind {
    /// The term's value is read (used as a liveness seed without being
    /// otherwise consumed, e.g. a calling convention's "this register
    /// leaves the function live" marker).
    Read,
    /// The term's prior definition is invalidated (e.g. a call's
    /// conservative clobber of a single location).
    Kill,
}

/// One entry of a [`JumpTarget::Table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JumpTableEntry {
    /// The address read from the table slot.
    pub address: u64,
    /// The resolved successor block, if any.
    pub block: Option<BlockAddress>,
}

/// The target of a [`Statement::Jump`] or [`Statement::Call`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum JumpTarget {
    /// An address computed at runtime that has not been resolved to a
    /// concrete block (symbolic target).
    Computed(Box<Term>),
    /// A resolved, concrete successor block.
    Direct(BlockAddress),
    /// A resolved switch jump table.
    Table(Vec<JumpTableEntry>),
}

/// One IR statement, always owned by exactly one [`super::BasicBlock`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Statement {
    /// A free-form annotation with no runtime effect.
    Comment(String),
    /// Opaque assembly the instruction analyzer could not lift (emitted
    /// for `InvalidInstruction`, per §7).
    InlineAssembly(String),
    /// `lhs := rhs`. `lhs` carries `AccessFlag::Write`; `rhs` is
    /// read-only.
    Assignment { lhs: Term, rhs: Term },
    /// Reads or kills a term without it being a full assignment.
    Touch { term: Term, kind: TouchKind },
    /// Conditional or unconditional control transfer.
    Jump {
        /// `None` for an unconditional jump.
        condition: Option<Term>,
        then_target: JumpTarget,
        /// Present only for a conditional jump's fallthrough/else arm.
        else_target: Option<JumpTarget>,
    },
    /// A call to `target`.
    Call { target: JumpTarget },
    /// Function return.
    Return,
    /// Execution halts (e.g. `hlt`, an unconditional trap).
    Halt,
}

impl Statement {
    /// True if this statement is a valid basic-block terminator (may only
    /// appear as a block's last statement, per the §3 invariant).
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Statement::Jump { .. } | Statement::Call { .. } | Statement::Return | Statement::Halt
        )
    }

    /// Visits every top-level [`Term`] directly owned by this statement
    /// (not recursing into sub-terms; use [`Term::visit`] for that).
    pub fn for_each_term<'a>(&'a self, mut f: impl FnMut(&'a Term)) {
        match self {
            Statement::Comment(_) | Statement::InlineAssembly(_) => {}
            Statement::Assignment { lhs, rhs } => {
                f(lhs);
                f(rhs);
            }
            Statement::Touch { term, .. } => f(term),
            Statement::Jump { condition, then_target, else_target } => {
                if let Some(c) = condition {
                    f(c);
                }
                if let JumpTarget::Computed(t) = then_target {
                    f(t);
                }
                if let Some(JumpTarget::Computed(t)) = else_target {
                    f(t);
                }
            }
            Statement::Call { target } => {
                if let JumpTarget::Computed(t) = target {
                    f(t);
                }
            }
            Statement::Return | Statement::Halt => {}
        }
    }

    /// Constructs an assignment, applying the LHS-is-write-only /
    /// RHS-is-read-only access-flag convention from §3.
    pub fn assign(lhs: Term, rhs: Term) -> Statement {
        debug_assert_eq!(lhs.size(), rhs.size(), "assignment LHS/RHS size mismatch");
        Statement::Assignment { lhs: lhs.with_flag(AccessFlag::Write), rhs: rhs.with_flag(AccessFlag::Read) }
    }
}

impl fmt::Display for JumpTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JumpTarget::Direct(addr) => write!(f, "0x{addr:x}"),
            JumpTarget::Table(entries) => {
                write!(f, "table[")?;
                for (i, entry) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match entry.block {
                        Some(block) => write!(f, "0x{block:x}")?,
                        None => write!(f, "?")?,
                    }
                }
                write!(f, "]")
            }
            JumpTarget::Computed(term) => write!(f, "*{term}"),
        }
    }
}

/// Renders a statement the way the source's `Printable` instances render
/// IR: one line, no trailing semicolon, terms spelled out via their own
/// `Display`.
impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Comment(text) => write!(f, "// {text}"),
            Statement::InlineAssembly(text) => write!(f, "asm {{ {text} }}"),
            Statement::Assignment { lhs, rhs } => write!(f, "{lhs} := {rhs}"),
            Statement::Touch { term, kind } => write!(f, "touch({term}, {kind:?})"),
            Statement::Jump { condition, then_target, else_target } => match (condition, else_target) {
                (Some(c), Some(e)) => write!(f, "if {c} goto {then_target} else {e}"),
                (Some(c), None) => write!(f, "if {c} goto {then_target}"),
                (None, _) => write!(f, "goto {then_target}"),
            },
            Statement::Call { target } => write!(f, "call {target}"),
            Statement::Return => write!(f, "return"),
            Statement::Halt => write!(f, "halt"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::term::TermIdSource;

    #[test]
    fn terminators_are_identified() {
        assert!(Statement::Return.is_terminator());
        assert!(Statement::Halt.is_terminator());
        assert!(!Statement::Comment("x".into()).is_terminator());
    }

    #[test]
    fn assign_sets_access_flags() {
        let mut ids = TermIdSource::default();
        let lhs = Term::constant(&mut ids, 32, 0);
        let rhs = Term::constant(&mut ids, 32, 1);
        let stmt = Statement::assign(lhs, rhs);
        if let Statement::Assignment { lhs, rhs } = stmt {
            assert!(lhs.flags().contains(&AccessFlag::Write));
            assert!(rhs.flags().contains(&AccessFlag::Read));
        } else {
            panic!("expected assignment");
        }
    }

    #[test]
    fn assignment_renders_as_lhs_colon_equals_rhs() {
        let mut ids = TermIdSource::default();
        let lhs = Term::constant(&mut ids, 32, 0);
        let rhs = Term::constant(&mut ids, 32, 1);
        let stmt = Statement::assign(lhs, rhs);
        assert_eq!(stmt.to_string(), "0x0:32 := 0x1:32");
    }

    #[test]
    fn direct_jump_target_renders_as_hex_address() {
        assert_eq!(JumpTarget::Direct(0x1000).to_string(), "0x1000");
    }
}
