//! Type Analyzer (§4.8): assigns each term a node in a
//! [`decomp_types::TypeTable`] and unifies nodes per the propagation
//! rules, iterating until no node's `changed` flag is set.

use rustc_hash::FxHashMap;

use decomp_types::{Signedness, TypeId, TypeTable};

use crate::ir::{BasicBlock, BinaryOperator, Function, Program, Statement, Term, TermId, TermKind, UnaryOperator};

/// Per-term type assignment for one function: every term encountered is
/// given a [`TypeId`] node, looked up by [`TermId`].
#[derive(Debug, Default)]
pub struct TypeAssignment {
    node_of: FxHashMap<TermId, TypeId>,
}

impl TypeAssignment {
    /// The type node for `term`, if one was assigned.
    pub fn node_of(&self, term: &Term) -> Option<TypeId> {
        self.node_of.get(&term.id()).copied()
    }
}

/// Runs the type analyzer over `function`'s blocks within `program`,
/// returning the resulting [`TypeTable`] and the term-to-node assignment.
pub fn analyze(program: &Program, function: &Function) -> (TypeTable, TypeAssignment) {
    let mut table = TypeTable::new();
    let mut assignment = TypeAssignment::default();

    for addr in function.blocks() {
        if let Some(block) = program.block(addr) {
            allocate_nodes(block, &mut table, &mut assignment);
        }
    }

    loop {
        for addr in function.blocks() {
            if let Some(block) = program.block(addr) {
                unify_block(block, &mut table, &assignment);
            }
        }
        if !table.has_pending_changes() {
            break;
        }
        table.clear_changed();
    }

    (table, assignment)
}

fn allocate_nodes(block: &BasicBlock, table: &mut TypeTable, assignment: &mut TypeAssignment) {
    for statement in block.statements() {
        statement.for_each_term(|term| allocate_term(term, table, assignment));
    }
}

fn allocate_term(term: &Term, table: &mut TypeTable, assignment: &mut TypeAssignment) {
    term.visit(&mut |t| {
        assignment.node_of.entry(t.id()).or_insert_with(|| table.insert(t.size()));
    });
}

fn node(table: &mut TypeTable, assignment: &TypeAssignment, term: &Term) -> TypeId {
    assignment.node_of(term).unwrap_or_else(|| table.insert(term.size()))
}

/// Sets a single fact on `id`'s node, flagging it changed only if the fact
/// was not already known — mirrors `TypeInfo::observe_factor`'s pattern so
/// a fact learned this round is not invisible to the fixed-point check.
fn mark_pointer(table: &mut TypeTable, id: TypeId) {
    let info = table.info_mut(id);
    if !info.is_pointer {
        info.is_pointer = true;
        info.changed = true;
    }
}

fn mark_integer(table: &mut TypeTable, id: TypeId) {
    let info = table.info_mut(id);
    if !info.is_integer {
        info.is_integer = true;
        info.changed = true;
    }
}

fn mark_signedness(table: &mut TypeTable, id: TypeId, signedness: Signedness) {
    let info = table.info_mut(id);
    if let Some(joined) = info.signedness.join(signedness) {
        if joined != info.signedness {
            info.signedness = joined;
            info.changed = true;
        }
    }
}

fn unify_block(block: &BasicBlock, table: &mut TypeTable, assignment: &TypeAssignment) {
    for statement in block.statements() {
        match statement {
            Statement::Assignment { lhs, rhs } => {
                let a = node(table, assignment, lhs);
                let b = node(table, assignment, rhs);
                let _ = table.unify(a, b);
                propagate_term(rhs, table, assignment);
                propagate_term(lhs, table, assignment);
            }
            Statement::Touch { term, .. } => propagate_term(term, table, assignment),
            Statement::Jump { condition: Some(cond), .. } => propagate_term(cond, table, assignment),
            _ => {}
        }
    }
}

/// Applies the per-operator propagation rules (§4.8) to `term` and
/// recurses into its operands.
fn propagate_term(term: &Term, table: &mut TypeTable, assignment: &TypeAssignment) {
    match term.kind() {
        TermKind::Dereference { address, .. } => {
            // The dereferenced address is a pointer to the result.
            let addr_id = node(table, assignment, address);
            mark_pointer(table, addr_id);
            propagate_term(address, table, assignment);
        }
        TermKind::UnaryOp { op, operand } => {
            propagate_unary(term, *op, operand, table, assignment);
            propagate_term(operand, table, assignment);
        }
        TermKind::BinaryOp { op, left, right } => {
            propagate_binary(term, *op, left, right, table, assignment);
            propagate_term(left, table, assignment);
            propagate_term(right, table, assignment);
        }
        TermKind::Choice { preferred, default } => {
            let p = node(table, assignment, preferred);
            let d = node(table, assignment, default);
            let _ = table.unify(p, d);
            propagate_term(preferred, table, assignment);
            propagate_term(default, table, assignment);
        }
        TermKind::Constant { .. } | TermKind::Intrinsic { .. } | TermKind::MemoryLocationAccess { .. } => {}
    }
}

fn propagate_unary(term: &Term, op: UnaryOperator, operand: &Term, table: &mut TypeTable, assignment: &TypeAssignment) {
    let operand_id = node(table, assignment, operand);
    let result_id = node(table, assignment, term);
    match op {
        UnaryOperator::SignExtend => mark_signedness(table, operand_id, Signedness::Signed),
        UnaryOperator::ZeroExtend => {
            // If the source operand is already known signed, the wider
            // result is unsigned (the value's bit pattern is reinterpreted,
            // not sign-preserved) — otherwise leave signedness unconstrained.
            if table.info(operand_id).signedness == Signedness::Signed {
                mark_signedness(table, result_id, Signedness::Unsigned);
            }
        }
        UnaryOperator::Not | UnaryOperator::Neg | UnaryOperator::Truncate => {}
    }
}

fn propagate_binary(term: &Term, op: BinaryOperator, left: &Term, right: &Term, table: &mut TypeTable, assignment: &TypeAssignment) {
    let left_id = node(table, assignment, left);
    let right_id = node(table, assignment, right);
    let result_id = node(table, assignment, term);

    match op {
        BinaryOperator::And | BinaryOperator::Or | BinaryOperator::Xor => {
            mark_integer(table, left_id);
            mark_integer(table, right_id);
        }
        BinaryOperator::Shl | BinaryOperator::Shr | BinaryOperator::Sar => {
            mark_integer(table, left_id);
            if op == BinaryOperator::Sar {
                mark_signedness(table, left_id, Signedness::Signed);
            } else if op == BinaryOperator::Shr {
                mark_signedness(table, left_id, Signedness::Unsigned);
            }
        }
        BinaryOperator::Add => propagate_pointer_arithmetic(left, right, left_id, right_id, result_id, table, assignment),
        BinaryOperator::Mul => {
            if let Some(value) = left.as_constant() {
                table.info_mut(right_id).observe_factor(value);
            }
            if let Some(value) = right.as_constant() {
                table.info_mut(left_id).observe_factor(value);
            }
        }
        _ if op.is_comparison() => {
            let _ = table.unify(left_id, right_id);
            if op.is_signed_sensitive() {
                mark_signedness(table, left_id, Signedness::Signed);
                mark_signedness(table, right_id, Signedness::Signed);
            }
        }
        _ => {}
    }
}

/// `a + b`: if either operand is already known to be a pointer, the
/// result is a pointer to the same pointee and the other operand is an
/// integer offset; a constant offset additionally records its value as
/// the pointee's observed stride.
fn propagate_pointer_arithmetic(left: &Term, right: &Term, left_id: TypeId, right_id: TypeId, result_id: TypeId, table: &mut TypeTable, _assignment: &TypeAssignment) {
    let left_is_ptr = table.info(left_id).is_pointer;
    let right_is_ptr = table.info(right_id).is_pointer;

    if left_is_ptr && !right_is_ptr {
        mark_integer(table, right_id);
        mark_pointer(table, result_id);
        if let Some(pointee) = table.info(left_id).pointee {
            set_pointee(table, result_id, pointee);
        }
        if let Some(value) = right.as_constant() {
            table.info_mut(left_id).observe_factor(value);
        }
    } else if right_is_ptr && !left_is_ptr {
        mark_integer(table, left_id);
        mark_pointer(table, result_id);
        if let Some(pointee) = table.info(right_id).pointee {
            set_pointee(table, result_id, pointee);
        }
        if let Some(value) = left.as_constant() {
            table.info_mut(right_id).observe_factor(value);
        }
    } else if is_product(right) {
        // The right operand is itself a multiplication/shift result, so
        // it reads as an index scaled by an element size; the left
        // operand is the base pointer (§8 end-to-end scenario 5).
        mark_integer(table, right_id);
        mark_pointer(table, left_id);
        mark_pointer(table, result_id);
    } else if is_product(left) {
        mark_integer(table, left_id);
        mark_pointer(table, right_id);
        mark_pointer(table, result_id);
    } else if let Some(value) = right.as_constant() {
        if value >= 4096 {
            // A large constant added to an unconstrained value is treated
            // as a pointer-candidate base (§8 end-to-end scenario 5).
            mark_pointer(table, left_id);
            mark_pointer(table, result_id);
        }
    } else if let Some(value) = left.as_constant() {
        if value >= 4096 {
            mark_pointer(table, right_id);
            mark_pointer(table, result_id);
        }
    }
}

/// True if `term` is the arithmetic result of a multiplication or a
/// left-shift (`x * k` or `x << k`), the index-scaling shape §4.8 calls
/// out as the signal that the *other* operand of an enclosing `add` is
/// the base pointer.
fn is_product(term: &Term) -> bool {
    matches!(term.kind(), TermKind::BinaryOp { op: BinaryOperator::Mul, .. } | TermKind::BinaryOp { op: BinaryOperator::Shl, .. })
}

fn set_pointee(table: &mut TypeTable, id: TypeId, pointee: TypeId) {
    let info = table.info_mut(id);
    if info.pointee.is_none() {
        info.pointee = Some(pointee);
        info.changed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::x86_regs;
    use crate::ir::{isolate, BasicBlock, MemoryLocation};

    #[test]
    fn assignment_unifies_lhs_and_rhs() {
        let mut program = Program::new();
        let mut block = BasicBlock::at(0);
        let lhs = Term::memory_location_access(program.term_ids(), MemoryLocation::register(x86_regs::AX, 0, 32));
        let rhs = Term::constant(program.term_ids(), 32, 5);
        let rhs_id_for_check = rhs.id();
        block.push_statement(Statement::assign(lhs, rhs));
        block.push_statement(Statement::Return);
        program.insert_block(0, block);
        let function = isolate(&program, 0);

        let (mut table, assignment) = analyze(&program, &function);
        let rep_rhs = assignment.node_of.get(&rhs_id_for_check).copied().unwrap();
        let block = program.block(0).unwrap();
        if let Statement::Assignment { lhs, .. } = &block.statements()[0] {
            let rep_lhs = assignment.node_of(lhs).unwrap();
            assert_eq!(table.find(rep_lhs), table.find(rep_rhs));
        }
    }

    #[test]
    fn dereference_marks_address_operand_pointer() {
        let mut program = Program::new();
        let mut block = BasicBlock::at(0);
        let addr = Term::constant(program.term_ids(), 32, 0x5000);
        let deref = Term::dereference(program.term_ids(), addr, crate::ir::Domain::Memory, 32);
        let lhs = Term::memory_location_access(program.term_ids(), MemoryLocation::register(x86_regs::AX, 0, 32));
        block.push_statement(Statement::assign(lhs, deref));
        block.push_statement(Statement::Return);
        program.insert_block(0, block);
        let function = isolate(&program, 0);

        let (mut table, assignment) = analyze(&program, &function);
        if let Statement::Assignment { rhs, .. } = &program.block(0).unwrap().statements()[0] {
            if let TermKind::Dereference { address, .. } = rhs.kind() {
                let id = assignment.node_of(address).unwrap();
                assert!(table.info(id).is_pointer);
            }
        }
    }

    #[test]
    fn large_constant_add_marks_pointer_candidate() {
        let mut program = Program::new();
        let mut block = BasicBlock::at(0);
        let base = Term::constant(program.term_ids(), 32, 0x10000);
        let index = Term::memory_location_access(program.term_ids(), MemoryLocation::register(x86_regs::BX, 0, 32));
        let sum = Term::binary(program.term_ids(), BinaryOperator::Add, base, index, 32);
        let lhs = Term::memory_location_access(program.term_ids(), MemoryLocation::register(x86_regs::AX, 0, 32));
        block.push_statement(Statement::assign(lhs, sum));
        block.push_statement(Statement::Return);
        program.insert_block(0, block);
        let function = isolate(&program, 0);

        let (mut table, assignment) = analyze(&program, &function);
        if let Statement::Assignment { rhs, .. } = &program.block(0).unwrap().statements()[0] {
            let id = assignment.node_of(rhs).unwrap();
            assert!(table.info(id).is_pointer);
        }
    }

    #[test]
    fn product_operand_marks_other_side_pointer() {
        // ebx = ecx * 4 (an index scaled by element size); eax = ebx' +
        // ebx — the non-product side is the base pointer even though it
        // carries no literal constant of its own.
        let mut program = Program::new();
        let mut block = BasicBlock::at(0);
        let ecx = Term::memory_location_access(program.term_ids(), MemoryLocation::register(x86_regs::CX, 0, 32));
        let four = Term::constant(program.term_ids(), 32, 4);
        let scaled_index = Term::binary(program.term_ids(), BinaryOperator::Mul, ecx, four, 32);
        let base = Term::memory_location_access(program.term_ids(), MemoryLocation::register(x86_regs::BX, 0, 32));
        let sum = Term::binary(program.term_ids(), BinaryOperator::Add, base, scaled_index, 32);
        let lhs = Term::memory_location_access(program.term_ids(), MemoryLocation::register(x86_regs::AX, 0, 32));
        block.push_statement(Statement::assign(lhs, sum));
        block.push_statement(Statement::Return);
        program.insert_block(0, block);
        let function = isolate(&program, 0);

        let (mut table, assignment) = analyze(&program, &function);
        if let Statement::Assignment { rhs, .. } = &program.block(0).unwrap().statements()[0] {
            let TermKind::BinaryOp { left, right, .. } = rhs.kind() else { panic!("expected the add term") };
            let base_id = assignment.node_of(left).unwrap();
            let index_id = assignment.node_of(right).unwrap();
            assert!(table.info(base_id).is_pointer, "non-product operand should be the base pointer");
            assert!(!table.info(index_id).is_pointer, "product operand should stay an integer index");
        }
    }
}
