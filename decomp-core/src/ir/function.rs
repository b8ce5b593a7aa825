//! [`Function`]: a single-entry subgraph of the [`super::Program`].

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use super::program::Program;
use super::statement::{BlockAddress, JumpTarget, Statement};

/// A function: the set of blocks reachable from `entry` without crossing
/// a `Call` statement (calls are edges *out of* the function, never
/// traversed during reachability — per §3, "containing its reachable
/// blocks excluding calls").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    entry: BlockAddress,
    blocks: FxHashSet<BlockAddress>,
}

impl Function {
    /// The function's entry address.
    pub fn entry(&self) -> BlockAddress {
        self.entry
    }

    /// All block addresses belonging to this function.
    pub fn blocks(&self) -> impl Iterator<Item = BlockAddress> + '_ {
        self.blocks.iter().copied()
    }

    /// Number of blocks.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// True if `address` belongs to this function.
    pub fn contains(&self, address: BlockAddress) -> bool {
        self.blocks.contains(&address)
    }
}

/// Computes the reachable-blocks-excluding-calls subgraph rooted at
/// `entry` within `program`. Used by the Function Isolator ([MODULE]
/// Function Isolator) once per seed in `Program::called_addresses`.
pub fn isolate(program: &Program, entry: BlockAddress) -> Function {
    let mut blocks = FxHashSet::default();
    let mut worklist = vec![entry];

    while let Some(addr) = worklist.pop() {
        if !blocks.insert(addr) {
            continue;
        }
        let Some(block) = program.block(addr) else { continue };
        for succ in successors_within_function(block) {
            if !blocks.contains(&succ) {
                worklist.push(succ);
            }
        }
    }

    Function { entry, blocks }
}

/// Successor addresses that stay *inside* the function: `Call` targets
/// are deliberately excluded (a call is an edge leaving the function, not
/// a fallthrough/jump edge within it).
fn successors_within_function(block: &super::block::BasicBlock) -> Vec<BlockAddress> {
    let mut out = Vec::new();
    match block.terminator() {
        Some(Statement::Jump { then_target, else_target, .. }) => {
            push_direct(&mut out, then_target);
            if let Some(e) = else_target {
                push_direct(&mut out, e);
            }
        }
        Some(Statement::Call { .. }) | Some(Statement::Return) | Some(Statement::Halt) | None => {
            if let Some(succ) = block.successor_address() {
                if block.terminator().is_none() {
                    out.push(succ);
                }
            }
        }
        _ => {}
    }
    out
}

fn push_direct(out: &mut Vec<BlockAddress>, target: &JumpTarget) {
    match target {
        JumpTarget::Direct(addr) => out.push(*addr),
        JumpTarget::Table(entries) => {
            for e in entries {
                if let Some(b) = e.block {
                    out.push(b);
                }
            }
        }
        JumpTarget::Computed(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::statement::JumpTarget;

    #[test]
    fn isolate_follows_jumps_not_calls() {
        let mut program = Program::new();

        let mut entry = super::super::block::BasicBlock::at(0);
        entry.push_statement(Statement::Call { target: JumpTarget::Direct(0x1000) });
        program.insert_block(0, entry);

        let mut called = super::super::block::BasicBlock::at(0x1000);
        called.push_statement(Statement::Return);
        program.insert_block(0x1000, called);

        let func = isolate(&program, 0);
        assert!(func.contains(0));
        assert!(!func.contains(0x1000), "call targets must not be pulled into the caller's function");
    }

    #[test]
    fn isolate_follows_branches() {
        let mut program = Program::new();

        let mut entry = super::super::block::BasicBlock::at(0);
        entry.push_statement(Statement::Jump {
            condition: None,
            then_target: JumpTarget::Direct(4),
            else_target: None,
        });
        program.insert_block(0, entry);

        let mut target = super::super::block::BasicBlock::at(4);
        target.push_statement(Statement::Return);
        program.insert_block(4, target);

        let func = isolate(&program, 0);
        assert_eq!(func.block_count(), 2);
    }
}
