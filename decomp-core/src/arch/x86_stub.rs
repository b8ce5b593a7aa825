//! A minimal, toy-encoded x86 instruction analyzer.
//!
//! Real x86 decoding is an external collaborator (§6) — this module
//! exists only as the fixture generator needed to drive the IR Generator,
//! Dataflow Analyzer, and later passes with something resembling real
//! control flow and data movement, without pulling in a full disassembler.
//! Its byte encoding is this crate's own invention: a one-byte opcode
//! followed by fixed-width little-endian operands, nothing more.

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::ir::{BinaryOperator, Domain, JumpTableEntry, JumpTarget, MemoryLocation, Statement, Term, TermIdSource};

use super::calling_convention::x86_regs;
use super::instruction::Instruction;
use super::InstructionAnalyzer;

const OP_PUSH_IMM32: u8 = 0x01;
const OP_POP_REG: u8 = 0x02;
const OP_RET: u8 = 0x03;
const OP_RET_IMM16: u8 = 0x04;
const OP_MOV_REG_IMM32: u8 = 0x05;
const OP_MOV_REG_REG: u8 = 0x06;
const OP_STORE_ESP_DISP: u8 = 0x07;
const OP_LOAD_ESP_DISP: u8 = 0x08;
const OP_SUB_ESP_IMM8: u8 = 0x09;
const OP_ADD_ESP_IMM8: u8 = 0x0A;
const OP_CMP_REG_IMM32: u8 = 0x0B;
const OP_JCC: u8 = 0x0C;
const OP_JMP: u8 = 0x0D;
const OP_JMP_TABLE: u8 = 0x0E;
const OP_CALL_REL32: u8 = 0x0F;
const OP_NOP: u8 = 0x10;
const OP_ADD_REG_REG: u8 = 0x11;
const OP_MOV_REG_MEM_ABS: u8 = 0x12;

fn le32(v: &[u8], at: usize) -> i32 {
    i32::from_le_bytes([v[at], v[at + 1], v[at + 2], v[at + 3]])
}

fn u_le32(v: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([v[at], v[at + 1], v[at + 2], v[at + 3]])
}

/// Condition codes for [`encode_jcc`], each mapped to a comparator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// Equal.
    Eq,
    /// Signed less-than.
    Slt,
    /// Unsigned less-than.
    Ult,
}

impl Condition {
    fn to_byte(self) -> u8 {
        match self {
            Condition::Eq => 0,
            Condition::Slt => 1,
            Condition::Ult => 2,
        }
    }

    fn from_byte(b: u8) -> Option<Condition> {
        match b {
            0 => Some(Condition::Eq),
            1 => Some(Condition::Slt),
            2 => Some(Condition::Ult),
            _ => None,
        }
    }

    fn operator(self) -> BinaryOperator {
        match self {
            Condition::Eq => BinaryOperator::Eq,
            Condition::Slt => BinaryOperator::SLt,
            Condition::Ult => BinaryOperator::ULt,
        }
    }
}

/// Encodes `push imm32`.
pub fn encode_push_imm32(imm: i32) -> Vec<u8> {
    let mut v = vec![OP_PUSH_IMM32];
    v.extend(imm.to_le_bytes());
    v
}

/// Encodes `pop reg`.
pub fn encode_pop_reg(reg: u16) -> Vec<u8> {
    vec![OP_POP_REG, reg as u8]
}

/// Encodes `ret`.
pub fn encode_ret() -> Vec<u8> {
    vec![OP_RET]
}

/// Encodes `ret imm16`.
pub fn encode_ret_imm16(imm: u16) -> Vec<u8> {
    let mut v = vec![OP_RET_IMM16];
    v.extend(imm.to_le_bytes());
    v
}

/// Encodes `mov reg, imm32`.
pub fn encode_mov_reg_imm32(reg: u16, imm: i32) -> Vec<u8> {
    let mut v = vec![OP_MOV_REG_IMM32, reg as u8];
    v.extend(imm.to_le_bytes());
    v
}

/// Encodes `mov dst, src`.
pub fn encode_mov_reg_reg(dst: u16, src: u16) -> Vec<u8> {
    vec![OP_MOV_REG_REG, dst as u8, src as u8]
}

/// Encodes `mov [esp+disp], src`.
pub fn encode_store_esp_disp(disp: i32, src: u16) -> Vec<u8> {
    let mut v = vec![OP_STORE_ESP_DISP];
    v.extend(disp.to_le_bytes());
    v.push(src as u8);
    v
}

/// Encodes `mov dst, [esp+disp]`.
pub fn encode_load_esp_disp(dst: u16, disp: i32) -> Vec<u8> {
    let mut v = vec![OP_LOAD_ESP_DISP, dst as u8];
    v.extend(disp.to_le_bytes());
    v
}

/// Encodes `sub esp, imm8`.
pub fn encode_sub_esp_imm8(imm: u8) -> Vec<u8> {
    vec![OP_SUB_ESP_IMM8, imm]
}

/// Encodes `add esp, imm8`.
pub fn encode_add_esp_imm8(imm: u8) -> Vec<u8> {
    vec![OP_ADD_ESP_IMM8, imm]
}

/// Encodes `cmp reg, imm32`.
pub fn encode_cmp_reg_imm32(reg: u16, imm: i32) -> Vec<u8> {
    let mut v = vec![OP_CMP_REG_IMM32, reg as u8];
    v.extend(imm.to_le_bytes());
    v
}

/// Encodes a conditional jump comparing `reg` against `imm32`, with
/// `rel` as the PC-relative (from the jcc's own end address) branch
/// displacement.
pub fn encode_jcc(cond: Condition, reg: u16, imm: i32, rel: i32) -> Vec<u8> {
    let mut v = vec![OP_JCC, cond.to_byte(), reg as u8];
    v.extend(imm.to_le_bytes());
    v.extend(rel.to_le_bytes());
    v
}

/// Encodes an unconditional relative jump.
pub fn encode_jmp(rel: i32) -> Vec<u8> {
    let mut v = vec![OP_JMP];
    v.extend(rel.to_le_bytes());
    v
}

/// Encodes `jmp [table_base + index_reg*stride]`.
pub fn encode_jmp_table(index_reg: u16, table_base: u32, stride: u32) -> Vec<u8> {
    let mut v = vec![OP_JMP_TABLE, index_reg as u8];
    v.extend(table_base.to_le_bytes());
    v.extend(stride.to_le_bytes());
    v
}

/// Encodes a relative call.
pub fn encode_call_rel32(rel: i32) -> Vec<u8> {
    let mut v = vec![OP_CALL_REL32];
    v.extend(rel.to_le_bytes());
    v
}

/// Encodes a no-op.
pub fn encode_nop() -> Vec<u8> {
    vec![OP_NOP]
}

/// Encodes `add dst, src`.
pub fn encode_add_reg_reg(dst: u16, src: u16) -> Vec<u8> {
    vec![OP_ADD_REG_REG, dst as u8, src as u8]
}

/// Encodes `mov dst, [addr]` (absolute).
pub fn encode_mov_reg_mem_abs(dst: u16, addr: u32) -> Vec<u8> {
    let mut v = vec![OP_MOV_REG_MEM_ABS, dst as u8];
    v.extend(addr.to_le_bytes());
    v
}

/// The stub analyzer. `register_size` is 32 or 64 and controls how wide
/// general-purpose register cells are modeled (the x86-64 scenario uses
/// 64, with the zero-extend post-pass applying only in that mode).
pub struct StubAnalyzer {
    /// Width in bits of general-purpose register cells.
    pub register_size: u32,
}

impl StubAnalyzer {
    /// A 32-bit-mode analyzer.
    pub fn x86_32() -> StubAnalyzer {
        StubAnalyzer { register_size: 32 }
    }

    /// A 64-bit-mode analyzer.
    pub fn x86_64() -> StubAnalyzer {
        StubAnalyzer { register_size: 64 }
    }

    fn reg(&self, family: u16) -> MemoryLocation {
        MemoryLocation::register(family, 0, self.register_size)
    }

    fn sp(&self) -> MemoryLocation {
        self.reg(x86_regs::SP)
    }
}

impl InstructionAnalyzer for StubAnalyzer {
    fn analyze(&self, instruction: &Instruction, block: &mut crate::ir::BasicBlock, ids: &mut TermIdSource, diagnostics: &mut Diagnostics) {
        let bytes = instruction.bytes();
        let Some(&opcode) = bytes.first() else {
            block.push_statement(Statement::InlineAssembly("<empty>".into()));
            diagnostics.push(Diagnostic::warning("irgen", "empty instruction encoding").at(instruction.address()));
            return;
        };

        let word = self.register_size;
        let fallthrough = instruction.end();

        match opcode {
            OP_PUSH_IMM32 if bytes.len() >= 5 => {
                let imm = le32(bytes, 1);
                push_value(self, block, ids, Term::constant(ids, word, imm as u32 as u64));
                block.set_successor_address(fallthrough);
            }
            OP_POP_REG if bytes.len() >= 2 => {
                let reg = bytes[1] as u16;
                pop_into(self, block, ids, self.reg(reg));
                block.set_successor_address(fallthrough);
            }
            OP_RET => {
                block.push_statement(Statement::Return);
            }
            OP_RET_IMM16 if bytes.len() >= 3 => {
                // The callee-cleanup amount is consumed by the calling
                // convention layer via the return instruction's address;
                // the stub only needs to terminate the block.
                block.push_statement(Statement::Return);
            }
            OP_MOV_REG_IMM32 if bytes.len() >= 6 => {
                let reg = bytes[1] as u16;
                let imm = le32(bytes, 2);
                let lhs = Term::memory_location_access(ids, self.reg(reg));
                let rhs = Term::constant(ids, word, imm as u32 as u64);
                block.push_statement(Statement::assign(lhs, rhs));
                block.set_successor_address(fallthrough);
            }
            OP_MOV_REG_REG if bytes.len() >= 3 => {
                let dst = bytes[1] as u16;
                let src = bytes[2] as u16;
                let lhs = Term::memory_location_access(ids, self.reg(dst));
                let rhs = Term::memory_location_access(ids, self.reg(src));
                block.push_statement(Statement::assign(lhs, rhs));
                block.set_successor_address(fallthrough);
            }
            OP_STORE_ESP_DISP if bytes.len() >= 6 => {
                let disp = le32(bytes, 1);
                let src = bytes[5] as u16;
                let esp = Term::memory_location_access(ids, self.sp());
                let addr = Term::binary(ids, BinaryOperator::Add, esp, Term::constant(ids, word, disp as u32 as u64), word);
                let lhs = Term::dereference(ids, addr, Domain::Memory, word);
                let rhs = Term::memory_location_access(ids, self.reg(src));
                block.push_statement(Statement::assign(lhs, rhs));
                block.set_successor_address(fallthrough);
            }
            OP_LOAD_ESP_DISP if bytes.len() >= 6 => {
                let dst = bytes[1] as u16;
                let disp = le32(bytes, 2);
                let esp = Term::memory_location_access(ids, self.sp());
                let addr = Term::binary(ids, BinaryOperator::Add, esp, Term::constant(ids, word, disp as u32 as u64), word);
                let rhs = Term::dereference(ids, addr, Domain::Memory, word);
                let lhs = Term::memory_location_access(ids, self.reg(dst));
                block.push_statement(Statement::assign(lhs, rhs));
                block.set_successor_address(fallthrough);
            }
            OP_SUB_ESP_IMM8 if bytes.len() >= 2 => {
                adjust_sp(self, block, ids, -(bytes[1] as i64));
                block.set_successor_address(fallthrough);
            }
            OP_ADD_ESP_IMM8 if bytes.len() >= 2 => {
                adjust_sp(self, block, ids, bytes[1] as i64);
                block.set_successor_address(fallthrough);
            }
            OP_CMP_REG_IMM32 if bytes.len() >= 6 => {
                // A pure comparison has no IR effect of its own in this
                // model: the jcc that follows carries the comparator and
                // operands directly (no flags register is modeled).
                block.push_statement(Statement::Comment(format!("cmp reg{}, {}", bytes[1], le32(bytes, 2))));
                block.set_successor_address(fallthrough);
            }
            OP_JCC if bytes.len() >= 11 => {
                let Some(cond) = Condition::from_byte(bytes[1]) else {
                    block.push_statement(Statement::InlineAssembly(format!("{bytes:02x?}")));
                    diagnostics.push(Diagnostic::warning("irgen", "unknown jcc condition").at(instruction.address()));
                    return;
                };
                let reg = bytes[2] as u16;
                let imm = le32(bytes, 3);
                let rel = le32(bytes, 7);
                let target = (fallthrough as i64 + rel as i64) as u64;
                let left = Term::memory_location_access(ids, self.reg(reg));
                let right = Term::constant(ids, word, imm as u32 as u64);
                let condition = Term::binary(ids, cond.operator(), left, right, 1);
                block.push_statement(Statement::Jump {
                    condition: Some(condition),
                    then_target: JumpTarget::Direct(target),
                    else_target: Some(JumpTarget::Direct(fallthrough)),
                });
            }
            OP_JMP if bytes.len() >= 5 => {
                let rel = le32(bytes, 1);
                let target = (fallthrough as i64 + rel as i64) as u64;
                block.push_statement(Statement::Jump { condition: None, then_target: JumpTarget::Direct(target), else_target: None });
            }
            OP_JMP_TABLE if bytes.len() >= 10 => {
                let index_reg = bytes[1] as u16;
                let base = u_le32(bytes, 2);
                let stride = u_le32(bytes, 6);
                let index = Term::memory_location_access(ids, self.reg(index_reg));
                let offset = Term::binary(ids, BinaryOperator::Mul, index, Term::constant(ids, word, stride as u64), word);
                let addr = Term::binary(ids, BinaryOperator::Add, Term::constant(ids, word, base as u64), offset, word);
                let deref = Term::dereference(ids, addr, Domain::Memory, word);
                block.push_statement(Statement::Jump { condition: None, then_target: JumpTarget::Computed(Box::new(deref)), else_target: None });
            }
            OP_CALL_REL32 if bytes.len() >= 5 => {
                let rel = le32(bytes, 1);
                let target = (fallthrough as i64 + rel as i64) as u64;
                block.push_statement(Statement::Call { target: JumpTarget::Direct(target) });
                block.set_successor_address(fallthrough);
            }
            OP_NOP => {
                block.push_statement(Statement::Comment("nop".into()));
                block.set_successor_address(fallthrough);
            }
            OP_ADD_REG_REG if bytes.len() >= 3 => {
                let dst = bytes[1] as u16;
                let src = bytes[2] as u16;
                let lhs = Term::memory_location_access(ids, self.reg(dst));
                let left = Term::memory_location_access(ids, self.reg(dst));
                let right = Term::memory_location_access(ids, self.reg(src));
                let rhs = Term::binary(ids, BinaryOperator::Add, left, right, word);
                block.push_statement(Statement::assign(lhs, rhs));
                block.set_successor_address(fallthrough);
            }
            OP_MOV_REG_MEM_ABS if bytes.len() >= 6 => {
                let dst = bytes[1] as u16;
                let addr = u_le32(bytes, 2);
                let lhs = Term::memory_location_access(ids, self.reg(dst));
                let addr_term = Term::constant(ids, word, addr as u64);
                let rhs = Term::dereference(ids, addr_term, Domain::Memory, word);
                block.push_statement(Statement::assign(lhs, rhs));
                block.set_successor_address(fallthrough);
            }
            _ => {
                block.push_statement(Statement::InlineAssembly(format!("{bytes:02x?}")));
                diagnostics.push(Diagnostic::warning("irgen", "unrecognized opcode").at(instruction.address()));
            }
        }
    }
}

fn push_value(analyzer: &StubAnalyzer, block: &mut crate::ir::BasicBlock, ids: &mut TermIdSource, value: Term) {
    let word = analyzer.register_size;
    let size_bytes = (value.size() / 8) as u64;
    adjust_sp(analyzer, block, ids, -(size_bytes as i64));
    let esp = Term::memory_location_access(ids, analyzer.sp());
    let lhs = Term::dereference(ids, esp, Domain::Memory, word);
    block.push_statement(Statement::assign(lhs, value));
}

fn pop_into(analyzer: &StubAnalyzer, block: &mut crate::ir::BasicBlock, ids: &mut TermIdSource, dest: MemoryLocation) {
    let word = analyzer.register_size;
    let esp = Term::memory_location_access(ids, analyzer.sp());
    let rhs = Term::dereference(ids, esp, Domain::Memory, word);
    let lhs = Term::memory_location_access(ids, dest);
    block.push_statement(Statement::assign(lhs, rhs));
    adjust_sp(analyzer, block, ids, (word / 8) as i64);
}

fn adjust_sp(analyzer: &StubAnalyzer, block: &mut crate::ir::BasicBlock, ids: &mut TermIdSource, delta: i64) {
    let word = analyzer.register_size;
    let lhs = Term::memory_location_access(ids, analyzer.sp());
    let esp_read = Term::memory_location_access(ids, analyzer.sp());
    let op = if delta >= 0 { BinaryOperator::Add } else { BinaryOperator::Sub };
    let magnitude = Term::constant(ids, word, delta.unsigned_abs());
    let rhs = Term::binary(ids, op, esp_read, magnitude, word);
    block.push_statement(Statement::assign(lhs, rhs));
}

/// Entries a [`JumpTableEntry`] fixture can carry, used by tests that
/// exercise switch recognition without re-deriving the table layout.
pub fn table_entry(address: u64, block: Option<u64>) -> JumpTableEntry {
    JumpTableEntry { address, block }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::BasicBlock;

    #[test]
    fn push_pop_ret_lowers_to_assignments_and_return() {
        let analyzer = StubAnalyzer::x86_32();
        let mut ids = TermIdSource::default();
        let mut diags = Diagnostics::new();
        let mut block = BasicBlock::at(0);

        let push = Instruction::new(0, encode_push_imm32(0x1234));
        analyzer.analyze(&push, &mut block, &mut ids, &mut diags);
        let pop = Instruction::new(push.end(), encode_pop_reg(x86_regs::AX));
        analyzer.analyze(&pop, &mut block, &mut ids, &mut diags);
        let ret = Instruction::new(pop.end(), encode_ret());
        analyzer.analyze(&ret, &mut block, &mut ids, &mut diags);

        assert!(block.has_terminator());
        assert!(diags.is_empty());
        assert!(block.statements().len() >= 5);
    }

    #[test]
    fn unknown_opcode_degrades_to_inline_assembly_with_warning() {
        let analyzer = StubAnalyzer::x86_32();
        let mut ids = TermIdSource::default();
        let mut diags = Diagnostics::new();
        let mut block = BasicBlock::at(0);
        let bogus = Instruction::new(0, vec![0xFF, 0xFF]);
        analyzer.analyze(&bogus, &mut block, &mut ids, &mut diags);
        assert!(matches!(block.statements()[0], Statement::InlineAssembly(_)));
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn jcc_builds_conditional_jump_with_both_targets() {
        let analyzer = StubAnalyzer::x86_32();
        let mut ids = TermIdSource::default();
        let mut diags = Diagnostics::new();
        let mut block = BasicBlock::at(0);
        let jcc = Instruction::new(0, encode_jcc(Condition::Slt, x86_regs::AX, 10, 20));
        analyzer.analyze(&jcc, &mut block, &mut ids, &mut diags);
        match block.terminator() {
            Some(Statement::Jump { condition: Some(_), then_target: JumpTarget::Direct(t), else_target: Some(JumpTarget::Direct(e)) }) => {
                assert_eq!(*t, jcc.end() + 20);
                assert_eq!(*e, jcc.end());
            }
            other => panic!("unexpected terminator: {other:?}"),
        }
    }
}
