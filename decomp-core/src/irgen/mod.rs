//! The IR Generator (§4.1): lowers a linear instruction stream into a
//! [`Program`]'s basic blocks, resolving jump targets and switch tables.

mod switch;
mod zero_extend_patch;

use rustc_hash::FxHashSet;

use crate::arch::{Instruction, InstructionAnalyzer};
use crate::diagnostics::Diagnostics;
use crate::image::{Architecture, Image};
use crate::ir::{BasicBlock, BlockAddress, JumpTarget, Program, Statement, TermKind};

/// Builds a [`Program`] from `instructions` using `analyzer` to lower each
/// one, then resolves switch jump tables against `image`. On x86-64
/// images, also applies the implicit zero-extend post-pass (§9).
pub fn generate(instructions: &[Instruction], analyzer: &dyn InstructionAnalyzer, image: &Image, diagnostics: &mut Diagnostics) -> Program {
    let mut program = Program::new();
    if instructions.is_empty() {
        return program;
    }

    // Pass 1: lower each instruction in isolation, recording the leaders
    // (block-start addresses) a real leader-based CFG builder would find:
    // the entry, every direct jump/call target, and every instruction
    // following a terminator.
    let mut per_instruction: Vec<(BlockAddress, BasicBlock)> = Vec::with_capacity(instructions.len());
    let mut leaders: FxHashSet<BlockAddress> = FxHashSet::default();
    leaders.insert(instructions[0].address());

    for instr in instructions {
        let mut scratch = BasicBlock::at(instr.address());
        analyzer.analyze(instr, &mut scratch, program.term_ids(), diagnostics);
        for target in terminator_targets(&scratch) {
            leaders.insert(target);
        }
        per_instruction.push((instr.address(), scratch));
    }
    for i in 0..per_instruction.len().saturating_sub(1) {
        if per_instruction[i].1.has_terminator() {
            leaders.insert(per_instruction[i + 1].0);
        }
    }

    // Pass 2: assemble basic blocks by splitting at leaders.
    let mut current: Option<BasicBlock> = None;
    for (addr, scratch) in per_instruction {
        if leaders.contains(&addr) {
            if let Some(block) = current.take() {
                finish_block(&mut program, block);
            }
            current = Some(BasicBlock::at(addr));
        }
        let block = current.get_or_insert_with(|| BasicBlock::at(addr));
        for statement in scratch.statements() {
            if !block.has_terminator() {
                block.push_statement(statement.clone());
            }
        }
        if let Some(successor) = scratch.successor_address() {
            block.set_successor_address(successor);
        }
        if scratch.has_terminator() {
            let finished = current.take().unwrap();
            finish_block(&mut program, finished);
        }
    }
    if let Some(block) = current {
        finish_block(&mut program, block);
    }

    synthesize_fallthroughs(&mut program);
    resolve_switches(&mut program, image, diagnostics);
    if image.platform().architecture == Architecture::X8664 {
        zero_extend_patch::apply(&mut program);
    }
    program
}

fn finish_block(program: &mut Program, block: BasicBlock) {
    if let Some(addr) = block.start_address() {
        for call_target in terminator_targets(&block) {
            // `record_called_address` is specifically for Call edges; a
            // plain Jump target is an intra-function leader, not a seed
            // for the Function Isolator, so only record Call targets.
            if matches!(block.terminator(), Some(Statement::Call { .. })) {
                program.record_called_address(call_target);
            }
        }
        program.insert_block(addr, block);
    }
}

fn terminator_targets(block: &BasicBlock) -> Vec<BlockAddress> {
    let mut out = Vec::new();
    match block.terminator() {
        Some(Statement::Jump { then_target, else_target, .. }) => {
            push_direct(&mut out, then_target);
            if let Some(e) = else_target {
                push_direct(&mut out, e);
            }
        }
        Some(Statement::Call { target }) => push_direct(&mut out, target),
        _ => {}
    }
    out
}

fn push_direct(out: &mut Vec<BlockAddress>, target: &JumpTarget) {
    if let JumpTarget::Direct(addr) = target {
        out.push(*addr);
    }
}

/// §4.1 step 4: any block lacking a terminator gets a synthetic
/// unconditional jump to its successor address.
fn synthesize_fallthroughs(program: &mut Program) {
    let addrs: Vec<BlockAddress> = program.addresses().collect();
    for addr in addrs {
        let needs_jump = {
            let block = program.block(addr).unwrap();
            !block.has_terminator() && block.successor_address().is_some()
        };
        if needs_jump {
            let successor = program.block(addr).unwrap().successor_address().unwrap();
            let block = program.block_mut(addr);
            block.push_statement(Statement::Jump { condition: None, then_target: JumpTarget::Direct(successor), else_target: None });
        }
    }
}

/// §4.1 step 3: replaces computed jump targets that match the jump-table
/// shape with a resolved [`JumpTarget::Table`], materializing a successor
/// block at each recovered address.
fn resolve_switches(program: &mut Program, image: &Image, diagnostics: &mut Diagnostics) {
    let addrs: Vec<BlockAddress> = program.addresses().collect();
    for addr in addrs {
        let resolved = {
            let block = program.block(addr).unwrap();
            match block.terminator() {
                Some(Statement::Jump { then_target: JumpTarget::Computed(term), condition: None, else_target: None }) => {
                    match term.kind() {
                        TermKind::Dereference { .. } => switch::recognize(term, image),
                        _ => None,
                    }
                }
                _ => None,
            }
        };
        if let Some(entries) = resolved {
            for entry in &entries {
                program.block_mut(entry.address);
            }
            let block = program.block_mut(addr);
            let statements = block.statements_mut();
            if let Some(Statement::Jump { then_target, .. }) = statements.last_mut() {
                *then_target = JumpTarget::Table(entries);
            }
        } else {
            let is_unresolved = matches!(
                program.block(addr).unwrap().terminator(),
                Some(Statement::Jump { then_target: JumpTarget::Computed(_), .. })
            );
            if is_unresolved {
                diagnostics.push(crate::diagnostics::Diagnostic::warning("irgen", "could not resolve computed jump target").at(addr));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::x86_stub::{encode_jmp_table, StubAnalyzer};
    use crate::arch::x86_regs;
    use crate::image::{Architecture, Endianness, OperatingSystem, Permissions, Platform, Section, SectionKind};

    fn table_image() -> Image {
        let targets = [0x2000u32, 0x2010, 0x2020, 0x2030];
        let mut bytes = Vec::new();
        for t in targets {
            bytes.extend(t.to_le_bytes());
        }
        let data = Section::new("rdata", 0x3000, bytes.len() as u64, Permissions::RODATA, SectionKind::Data, bytes);
        let code = Section::new("text", 0x2000, 0x40, Permissions::CODE, SectionKind::Code, vec![0x90; 0x40]);
        let platform = Platform { architecture: Architecture::I386, os: OperatingSystem::Windows, endianness: Endianness::Little };
        Image::new(platform, vec![data, code], vec![], vec![])
    }

    #[test]
    fn switch_scenario_builds_four_successor_blocks() {
        let image = table_image();
        let analyzer = StubAnalyzer::x86_32();
        let mut diags = Diagnostics::new();
        let instr = Instruction::new(0x1000, encode_jmp_table(x86_regs::AX, 0x3000, 4));
        let program = generate(&[instr], &analyzer, &image, &mut diags);

        let block = program.block(0x1000).expect("entry block");
        match block.terminator() {
            Some(Statement::Jump { then_target: JumpTarget::Table(entries), .. }) => {
                assert_eq!(entries.len(), 4);
            }
            other => panic!("expected resolved jump table, got {other:?}"),
        }
        for target in [0x2000u64, 0x2010, 0x2020, 0x2030] {
            assert!(program.has_block(target), "missing successor block at {target:#x}");
        }
    }
}
