//! Calling-Convention Hooks (§4.2): entry/exit/call-site/return
//! instrumentation that make a function's ABI boundary visible to later
//! passes as ordinary IR statements, rather than as implicit knowledge
//! every pass would otherwise need to special-case.
//!
//! Three effects are synthesized, each expressed as a [`Statement::Touch`]
//! so it participates in liveness and dataflow like any other statement:
//!
//! - entry effect: the function's formal argument registers are touched
//!   `Read` at the entry block, seeding them as live-in without inventing
//!   a defining term for them.
//! - `CallAnalyzer` effect: each call site touches every caller-saved
//!   register `Kill`, modeling the conservative "a call clobbers its
//!   convention's volatile registers" assumption.
//! - `ReturnAnalyzer` effect: each `Return` is preceded by a `Read` touch
//!   of the convention's return registers, keeping the return value live
//!   across the function boundary.

use crate::arch::CallingConvention;
use crate::ir::{Function, MemoryLocation, Program, Statement, Term, TouchKind};

/// Applies entry, call-site, and return instrumentation for `function`
/// under `convention` to `program`, in place.
pub fn instrument(program: &mut Program, function: &Function, convention: &CallingConvention) {
    instrument_entry(program, function, convention);
    instrument_call_sites(program, function, convention);
    instrument_returns(program, function, convention);
}

fn touch_statements(program: &mut Program, locations: &[MemoryLocation], kind: TouchKind) -> Vec<Statement> {
    locations
        .iter()
        .map(|location| {
            let term = Term::memory_location_access(program.term_ids(), *location);
            Statement::Touch { term, kind }
        })
        .collect()
}

fn instrument_entry(program: &mut Program, function: &Function, convention: &CallingConvention) {
    let touches = touch_statements(program, &convention.argument_registers, TouchKind::Read);
    let block = program.block_mut(function.entry());
    prepend(block, touches);
}

fn instrument_call_sites(program: &mut Program, function: &Function, convention: &CallingConvention) {
    let call_sites: Vec<_> = function
        .blocks()
        .filter(|&addr| matches!(program.block(addr).unwrap().terminator(), Some(Statement::Call { .. })))
        .collect();
    for addr in call_sites {
        let clobbered = convention.clobbered().to_vec();
        let touches = touch_statements(program, &clobbered, TouchKind::Kill);
        let block = program.block_mut(addr);
        let statements = block.statements_mut();
        let call = statements.pop().expect("call terminator");
        statements.extend(touches);
        statements.push(call);
    }
}

fn instrument_returns(program: &mut Program, function: &Function, convention: &CallingConvention) {
    let return_sites: Vec<_> = function
        .blocks()
        .filter(|&addr| matches!(program.block(addr).unwrap().terminator(), Some(Statement::Return)))
        .collect();
    for addr in return_sites {
        let returns = convention.return_registers.clone();
        let touches = touch_statements(program, &returns, TouchKind::Read);
        let block = program.block_mut(addr);
        let statements = block.statements_mut();
        let ret = statements.pop().expect("return terminator");
        statements.extend(touches);
        statements.push(ret);
    }
}

fn prepend(block: &mut crate::ir::BasicBlock, mut statements: Vec<Statement>) {
    if statements.is_empty() {
        return;
    }
    let rest = std::mem::take(block.statements_mut());
    statements.extend(rest);
    *block.statements_mut() = statements;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{isolate, BasicBlock, JumpTarget, TouchKind};

    #[test]
    fn entry_touches_argument_registers() {
        let mut program = Program::new();
        let mut entry = BasicBlock::at(0);
        entry.push_statement(Statement::Return);
        program.insert_block(0, entry);
        let function = isolate(&program, 0);

        let cc = CallingConvention::microsoft64();
        instrument(&mut program, &function, &cc);

        let block = program.block(0).unwrap();
        assert!(matches!(block.statements()[0], Statement::Touch { kind: TouchKind::Read, .. }));
    }

    #[test]
    fn call_site_gets_clobber_touches_before_call() {
        let mut program = Program::new();
        let mut entry = BasicBlock::at(0);
        entry.push_statement(Statement::Call { target: JumpTarget::Direct(0x100) });
        program.insert_block(0, entry);
        let mut callee = BasicBlock::at(0x100);
        callee.push_statement(Statement::Return);
        program.insert_block(0x100, callee);
        let function = isolate(&program, 0);

        let cc = CallingConvention::cdecl32();
        instrument(&mut program, &function, &cc);

        let block = program.block(0).unwrap();
        assert!(matches!(block.statements().last(), Some(Statement::Call { .. })));
        assert!(block.statements().len() > 1, "expected clobber touches ahead of the call");
    }

    #[test]
    fn return_gets_read_touch_for_return_registers() {
        let mut program = Program::new();
        let mut entry = BasicBlock::at(0);
        entry.push_statement(Statement::Return);
        program.insert_block(0, entry);
        let function = isolate(&program, 0);

        let cc = CallingConvention::cdecl32();
        instrument(&mut program, &function, &cc);

        let block = program.block(0).unwrap();
        let statements = block.statements();
        assert!(matches!(statements.last(), Some(Statement::Return)));
        assert!(matches!(statements[statements.len() - 2], Statement::Touch { kind: TouchKind::Read, .. }));
    }
}
