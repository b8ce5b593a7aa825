//! Liveness Analyzer (§4.4): a backwards dataflow pass over a function's
//! blocks that decides which defining terms still matter to *something*
//! downstream. Liveness never prunes the IR itself — it only tells later
//! passes (Variable Reconstruction, Code Generator) which writes they may
//! ignore.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::ir::{BlockAddress, Function, MemoryLocation, Program, Statement, TermId, TouchKind};

/// Liveness seeds and the fixed-point result: which memory locations are
/// live at the exit of each block, and which defining [`TermId`]s are
/// live overall.
#[derive(Debug, Default)]
pub struct Liveness {
    live_out: FxHashMap<BlockAddress, FxHashSet<MemoryLocation>>,
    live_terms: FxHashSet<TermId>,
}

impl Liveness {
    /// True if `location` is live at the exit of `block`.
    pub fn is_live_out(&self, block: BlockAddress, location: &MemoryLocation) -> bool {
        self.live_out.get(&block).map(|set| set.iter().any(|l| l.overlaps(location))).unwrap_or(false)
    }

    /// True if the term identified by `id` defines a value some later
    /// statement or the function boundary still reads.
    pub fn is_live_term(&self, id: TermId) -> bool {
        self.live_terms.contains(&id)
    }
}

/// Runs backwards dataflow to a fixed point over `function`'s blocks
/// within `program`. Seeds: `Jump`/`Call` condition and target terms,
/// any `Touch { kind: Read }` (the calling-convention hooks' argument and
/// return-value markers), and writes to locations outside the function's
/// own frame (escaping writes).
pub fn analyze(program: &Program, function: &Function) -> Liveness {
    let mut result = Liveness::default();
    let blocks: Vec<BlockAddress> = function.blocks().collect();

    loop {
        let mut changed = false;
        for &addr in blocks.iter().rev() {
            let block = program.block(addr).expect("function block must exist in program");
            let mut live: FxHashSet<MemoryLocation> = successor_live_in(program, function, &result, addr, block.successor_address(), &blocks);

            for statement in block.statements().iter().rev() {
                step(statement, &mut live, &mut result.live_terms);
            }

            let entry = result.live_out.entry(addr).or_default();
            let before = entry.len();
            entry.extend(live);
            if entry.len() != before {
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    result
}

fn successor_live_in(
    program: &Program,
    function: &Function,
    result: &Liveness,
    addr: BlockAddress,
    fallthrough: Option<BlockAddress>,
    blocks: &[BlockAddress],
) -> FxHashSet<MemoryLocation> {
    let mut live = FxHashSet::default();
    let block = program.block(addr).unwrap();
    for target in jump_targets(block) {
        if function.contains(target) {
            if let Some(set) = result.live_out.get(&target) {
                live.extend(set.iter().copied());
            }
        }
    }
    if let Some(succ) = fallthrough {
        if blocks.contains(&succ) {
            if let Some(set) = result.live_out.get(&succ) {
                live.extend(set.iter().copied());
            }
        }
    }
    live
}

/// Resolved successor block addresses a `Jump` terminator can transfer
/// control to (a `Call`'s target is deliberately excluded, same as the
/// Function Isolator's reachability walk).
fn jump_targets(block: &crate::ir::BasicBlock) -> Vec<BlockAddress> {
    use crate::ir::JumpTarget;
    let mut out = Vec::new();
    let mut push = |target: &JumpTarget| match target {
        JumpTarget::Direct(addr) => out.push(*addr),
        JumpTarget::Table(entries) => out.extend(entries.iter().filter_map(|e| e.block)),
        JumpTarget::Computed(_) => {}
    };
    if let Some(Statement::Jump { then_target, else_target, .. }) = block.terminator() {
        push(then_target);
        if let Some(e) = else_target {
            push(e);
        }
    }
    out
}

fn step(statement: &Statement, live: &mut FxHashSet<MemoryLocation>, live_terms: &mut FxHashSet<TermId>) {
    match statement {
        Statement::Assignment { lhs, rhs } => {
            if let Some(location) = lhs.as_memory_location() {
                let was_live = live.iter().any(|l| l.overlaps(location));
                if was_live {
                    live_terms.insert(lhs.id());
                    live.retain(|l| !location.contains(l));
                    mark_reads(rhs, live, live_terms);
                }
            } else {
                // A write through a dereference (e.g. a stack store whose
                // address is not yet resolved to a location) is always
                // conservatively treated as live: we cannot prove nothing
                // downstream reads it.
                live_terms.insert(lhs.id());
                mark_reads(lhs, live, live_terms);
                mark_reads(rhs, live, live_terms);
            }
        }
        Statement::Touch { term, kind: TouchKind::Read } => {
            live_terms.insert(term.id());
            mark_reads(term, live, live_terms);
        }
        Statement::Touch { term, kind: TouchKind::Kill } => {
            if let Some(location) = term.as_memory_location() {
                live.retain(|l| !location.contains(l));
            }
        }
        Statement::Jump { condition, .. } => {
            if let Some(c) = condition {
                mark_reads(c, live, live_terms);
            }
        }
        Statement::Call { .. } | Statement::Return | Statement::Halt | Statement::Comment(_) | Statement::InlineAssembly(_) => {}
    }
}

fn mark_reads(term: &crate::ir::Term, live: &mut FxHashSet<MemoryLocation>, live_terms: &mut FxHashSet<TermId>) {
    term.visit(&mut |t| {
        if let Some(location) = t.as_memory_location() {
            live.insert(*location);
            live_terms.insert(t.id());
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::x86_regs;
    use crate::ir::{isolate, BasicBlock, JumpTarget, Term, TouchKind};

    #[test]
    fn dead_write_never_read_is_not_live() {
        let mut program = Program::new();
        let mut block = BasicBlock::at(0);
        let dead_lhs = Term::memory_location_access(program.term_ids(), MemoryLocation::register(x86_regs::CX, 0, 32));
        let dead_lhs_id = dead_lhs.id();
        let dead_rhs = Term::constant(program.term_ids(), 32, 1);
        block.push_statement(Statement::assign(dead_lhs, dead_rhs));
        block.push_statement(Statement::Return);
        program.insert_block(0, block);
        let function = isolate(&program, 0);

        let liveness = analyze(&program, &function);
        assert!(!liveness.is_live_term(dead_lhs_id));
    }

    #[test]
    fn write_read_by_later_statement_is_live() {
        let mut program = Program::new();
        let mut block = BasicBlock::at(0);
        let lhs = Term::memory_location_access(program.term_ids(), MemoryLocation::register(x86_regs::AX, 0, 32));
        let lhs_id = lhs.id();
        let rhs = Term::constant(program.term_ids(), 32, 5);
        block.push_statement(Statement::assign(lhs, rhs));
        let read = Term::memory_location_access(program.term_ids(), MemoryLocation::register(x86_regs::AX, 0, 32));
        block.push_statement(Statement::Touch { term: read, kind: TouchKind::Read });
        block.push_statement(Statement::Return);
        program.insert_block(0, block);
        let function = isolate(&program, 0);

        let liveness = analyze(&program, &function);
        assert!(liveness.is_live_term(lhs_id));
    }

    #[test]
    fn kill_touch_clears_liveness_before_the_call() {
        let mut program = Program::new();
        let mut entry = BasicBlock::at(0);
        let write = Term::memory_location_access(program.term_ids(), MemoryLocation::register(x86_regs::AX, 0, 32));
        let write_id = write.id();
        entry.push_statement(Statement::assign(write, Term::constant(program.term_ids(), 32, 1)));
        let kill_loc = Term::memory_location_access(program.term_ids(), MemoryLocation::register(x86_regs::AX, 0, 32));
        entry.push_statement(Statement::Touch { term: kill_loc, kind: TouchKind::Kill });
        entry.push_statement(Statement::Call { target: JumpTarget::Direct(0x100) });
        program.insert_block(0, entry);
        let mut callee = BasicBlock::at(0x100);
        callee.push_statement(Statement::Return);
        program.insert_block(0x100, callee);
        let function = isolate(&program, 0);

        let liveness = analyze(&program, &function);
        assert!(!liveness.is_live_term(write_id));
    }
}
