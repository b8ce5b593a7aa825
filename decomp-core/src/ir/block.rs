//! [`BasicBlock`]: an ordered statement sequence with at most one
//! terminator, mirroring the shape of `raya_engine::jit::analysis::cfg`'s
//! `CfgBlock` but over IR [`Statement`]s instead of decoded bytecode.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::statement::{BlockAddress, Statement};

/// A maximal sequence of IR statements with one entry and (eventually)
/// one terminator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BasicBlock {
    /// Address of the first instruction lowered into this block, if this
    /// block is a control point (may be a jump target).
    start_address: Option<BlockAddress>,
    /// Address of the instruction immediately following this block's last
    /// lowered instruction, used to materialize the fall-through
    /// successor.
    successor_address: Option<BlockAddress>,
    statements: Vec<Statement>,
}

impl BasicBlock {
    /// A fresh, empty block with no start address yet.
    pub fn new() -> BasicBlock {
        BasicBlock::default()
    }

    /// A block that is a control point at `address`.
    pub fn at(address: BlockAddress) -> BasicBlock {
        BasicBlock { start_address: Some(address), successor_address: None, statements: Vec::new() }
    }

    /// This block's control-point address, if any.
    pub fn start_address(&self) -> Option<BlockAddress> {
        self.start_address
    }

    /// Sets the control-point address.
    pub fn set_start_address(&mut self, address: BlockAddress) {
        self.start_address = Some(address);
    }

    /// The fall-through successor's address, if known.
    pub fn successor_address(&self) -> Option<BlockAddress> {
        self.successor_address
    }

    /// Records the fall-through successor's address.
    pub fn set_successor_address(&mut self, address: BlockAddress) {
        self.successor_address = Some(address);
    }

    /// All statements, in program order.
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// Mutable access to the statement list (used by later passes that
    /// rewrite statements in place, e.g. the x86-64 zero-extend patch).
    pub fn statements_mut(&mut self) -> &mut Vec<Statement> {
        &mut self.statements
    }

    /// This block's terminator, if its last statement is one.
    pub fn terminator(&self) -> Option<&Statement> {
        self.statements.last().filter(|s| s.is_terminator())
    }

    /// True iff this block's last statement is a terminator (the §3
    /// invariant: "at most one terminator ... if present it is the last
    /// statement" is upheld by construction — `push_statement` rejects
    /// pushing after a terminator).
    pub fn has_terminator(&self) -> bool {
        self.terminator().is_some()
    }

    /// Appends a statement. Panics (debug-only) if a terminator has
    /// already been pushed, upholding the "at most one terminator, and if
    /// present it is the last statement" invariant.
    pub fn push_statement(&mut self, statement: Statement) {
        debug_assert!(!self.has_terminator(), "cannot append after a block terminator");
        self.statements.push(statement);
    }

    /// Number of statements.
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    /// True if this block has no statements.
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

impl fmt::Display for BasicBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.start_address {
            Some(addr) => writeln!(f, "block 0x{addr:x}:")?,
            None => writeln!(f, "block <unanchored>:")?,
        }
        for statement in &self.statements {
            writeln!(f, "  {statement}")?;
        }
        Ok(())
    }
}
