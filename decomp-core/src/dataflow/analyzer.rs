//! The Dataflow Analyzer: iterated abstract interpretation to a fixed
//! point over a [`Function`]'s basic blocks (§4.3).

use rustc_hash::FxHashMap;

use crate::ir::{
    BinaryOperator, BlockAddress, Domain, Function, JumpTarget, MemoryLocation, Program, Statement, Term, TermId, TermKind, TouchKind, UnaryOperator,
};

use super::abstract_value::{self, AbstractValue};
use super::reaching_definitions::ReachingDefinitions;
use super::simulation::{StackAttribute, TermValue};

/// Maximum fixed-point rounds before the analyzer gives up and reports
/// budget exhaustion (§7).
pub const MAX_ITERATIONS: u32 = 30;

/// Everything the Dataflow Analyzer computed for one function.
#[derive(Debug, Default)]
pub struct Dataflow {
    values: FxHashMap<TermId, TermValue>,
    locations: FxHashMap<TermId, MemoryLocation>,
    entry_reaching_defs: FxHashMap<BlockAddress, ReachingDefinitions>,
    /// Rounds actually run; `== MAX_ITERATIONS` signals non-convergence.
    pub rounds_run: u32,
    /// True if the 30-iteration budget was exhausted without convergence
    /// (§7 Budget exhaustion — non-fatal, callers proceed with partial
    /// results).
    pub budget_exhausted: bool,
}

impl Dataflow {
    /// The computed value of a term, if it was reached during analysis.
    pub fn value(&self, term: TermId) -> Option<&TermValue> {
        self.values.get(&term)
    }

    /// The computed memory-location of a memory-accessing term, if any.
    pub fn location(&self, term: TermId) -> Option<MemoryLocation> {
        self.locations.get(&term).copied()
    }

    /// The reaching-definitions state on entry to `block`.
    pub fn reaching_definitions_on_entry(&self, block: BlockAddress) -> ReachingDefinitions {
        self.entry_reaching_defs.get(&block).cloned().unwrap_or_default()
    }
}

/// Runs the Dataflow Analyzer over `function`'s blocks within `program`.
/// `stack_pointer` is the register [`MemoryLocation`] this architecture
/// uses as its stack pointer, used to seed the frame-base offset at
/// function entry (no reaching definition yet reaches it).
pub fn analyze(program: &Program, function: &Function, stack_pointer: MemoryLocation) -> Dataflow {
    let mut dataflow = Dataflow::default();
    let mut block_out: FxHashMap<BlockAddress, ReachingDefinitions> = FxHashMap::default();

    let mut order: Vec<BlockAddress> = function.blocks().collect();
    order.sort();

    let mut consecutive_stable = 0u32;
    let mut round = 0u32;

    while consecutive_stable < 2 && round < MAX_ITERATIONS {
        round += 1;
        let mut any_changed = false;

        for &addr in &order {
            let Some(block) = program.block(addr) else { continue };

            let mut entry = ReachingDefinitions::new();
            for pred in predecessors(program, function, addr) {
                if let Some(out) = block_out.get(&pred) {
                    entry.merge(out);
                }
            }
            dataflow.entry_reaching_defs.insert(addr, entry.clone());

            let mut state = entry;
            for statement in block.statements() {
                let mut ctx = SimulationContext { state: &mut state, dataflow: &mut dataflow, stack_pointer };
                execute_statement(statement, &mut ctx);
            }

            let changed = block_out.get(&addr).map_or(true, |prev| prev != &state);
            if changed {
                any_changed = true;
                block_out.insert(addr, state);
            }
        }

        if any_changed {
            consecutive_stable = 0;
        } else {
            consecutive_stable += 1;
        }
    }

    dataflow.rounds_run = round;
    dataflow.budget_exhausted = consecutive_stable < 2;
    dataflow
}

fn predecessors(program: &Program, function: &Function, addr: BlockAddress) -> Vec<BlockAddress> {
    let mut out = Vec::new();
    for candidate in function.blocks() {
        let Some(block) = program.block(candidate) else { continue };
        let targets = match block.terminator() {
            Some(Statement::Jump { then_target, else_target, .. }) => {
                let mut t = direct_targets(then_target);
                if let Some(e) = else_target {
                    t.extend(direct_targets(e));
                }
                t
            }
            None => block.successor_address().into_iter().collect(),
            _ => Vec::new(),
        };
        if targets.contains(&addr) {
            out.push(candidate);
        }
    }
    out
}

fn direct_targets(target: &JumpTarget) -> Vec<BlockAddress> {
    match target {
        JumpTarget::Direct(a) => vec![*a],
        JumpTarget::Table(entries) => entries.iter().filter_map(|e| e.block).collect(),
        JumpTarget::Computed(_) => Vec::new(),
    }
}

/// Bundles the reaching-definitions state and the partial dataflow
/// results threaded through one statement's evaluation, so the executor
/// and evaluator below take one context parameter instead of passing the
/// state, the results, and the architecture's stack pointer by hand at
/// every call site.
struct SimulationContext<'a> {
    state: &'a mut ReachingDefinitions,
    dataflow: &'a mut Dataflow,
    stack_pointer: MemoryLocation,
}

fn execute_statement(statement: &Statement, ctx: &mut SimulationContext) {
    match statement {
        Statement::Comment(_) | Statement::InlineAssembly(_) | Statement::Halt => {}
        Statement::Assignment { lhs, rhs } => {
            let rhs_value = evaluate(rhs, ctx);
            ctx.dataflow.values.insert(rhs.id(), rhs_value);

            let lhs_location = evaluate_location(lhs, ctx);
            ctx.dataflow.values.insert(lhs.id(), rhs_value);
            if let Some(loc) = lhs_location {
                ctx.dataflow.locations.insert(lhs.id(), loc);
                if loc.domain() != Domain::Memory {
                    ctx.state.add_definition(loc, lhs.id());
                } else {
                    ctx.state.kill_definitions(&loc);
                }
            }
        }
        Statement::Touch { term, kind } => {
            let _ = evaluate(term, ctx);
            if let Some(loc) = evaluate_location(term, ctx) {
                ctx.dataflow.locations.insert(term.id(), loc);
                if *kind == TouchKind::Kill {
                    ctx.state.kill_definitions(&loc);
                }
            }
        }
        Statement::Jump { condition, then_target, else_target } => {
            if let Some(c) = condition {
                let v = evaluate(c, ctx);
                ctx.dataflow.values.insert(c.id(), v);
            }
            evaluate_target(then_target, ctx);
            if let Some(t) = else_target {
                evaluate_target(t, ctx);
            }
        }
        Statement::Call { target } => {
            evaluate_target(target, ctx);
            ctx.state.clear();
        }
        Statement::Return => {}
    }
}

fn evaluate_target(target: &JumpTarget, ctx: &mut SimulationContext) {
    if let JumpTarget::Computed(term) = target {
        let v = evaluate(term, ctx);
        ctx.dataflow.values.insert(term.id(), v);
    }
}

/// Resolves the [`MemoryLocation`] a term reads/writes, if it has one.
fn evaluate_location(term: &Term, ctx: &mut SimulationContext) -> Option<MemoryLocation> {
    match term.kind() {
        TermKind::MemoryLocationAccess { location } => Some(*location),
        TermKind::Dereference { address, domain } => {
            let addr_value = evaluate(address, ctx);
            let size = term.size();
            if addr_value.abstract_value.is_concrete() {
                Some(MemoryLocation::memory(addr_value.abstract_value.as_concrete(), size))
            } else if let StackAttribute::Offset(k) = addr_value.stack_attribute {
                Some(MemoryLocation::stack(k, size))
            } else {
                let _ = domain;
                None
            }
        }
        _ => None,
    }
}

/// Evaluates a term's abstract value (and, for memory-accessing terms,
/// records its location as a side effect) per the §4.3 term-evaluation
/// rules.
fn evaluate(term: &Term, ctx: &mut SimulationContext) -> TermValue {
    let value = match term.kind() {
        TermKind::Constant { value } => TermValue::concrete(term.size(), *value),
        TermKind::Intrinsic { .. } => TermValue::top(term.size()),
        TermKind::MemoryLocationAccess { location } => {
            if *location == ctx.stack_pointer && ctx.state.project(location).chunks().is_empty() {
                TermValue::frame_base(term.size())
            } else {
                join_reaching_values(ctx.state, location, ctx.dataflow)
            }
        }
        TermKind::Dereference { address, .. } => {
            let addr_value = evaluate(address, ctx);
            ctx.dataflow.values.insert(address.id(), addr_value);
            let loc = if addr_value.abstract_value.is_concrete() {
                Some(MemoryLocation::memory(addr_value.abstract_value.as_concrete(), term.size()))
            } else if let StackAttribute::Offset(k) = addr_value.stack_attribute {
                Some(MemoryLocation::stack(k, term.size()))
            } else {
                None
            };
            match loc {
                Some(l) => join_reaching_values(ctx.state, &l, ctx.dataflow),
                None => TermValue::top(term.size()),
            }
        }
        TermKind::UnaryOp { op, operand } => {
            let v = evaluate(operand, ctx);
            ctx.dataflow.values.insert(operand.id(), v);
            apply_unary(*op, v, term.size())
        }
        TermKind::BinaryOp { op, left, right } => {
            let l = evaluate(left, ctx);
            let r = evaluate(right, ctx);
            ctx.dataflow.values.insert(left.id(), l);
            ctx.dataflow.values.insert(right.id(), r);
            apply_binary(*op, l, r, term.size())
        }
        TermKind::Choice { preferred, default } => {
            let has_def = term_has_reaching_definition(preferred, ctx.state);
            if has_def {
                let v = evaluate(preferred, ctx);
                ctx.dataflow.values.insert(preferred.id(), v);
                v
            } else {
                let v = evaluate(default, ctx);
                ctx.dataflow.values.insert(default.id(), v);
                v
            }
        }
    };
    ctx.dataflow.values.insert(term.id(), value);
    value
}

fn term_has_reaching_definition(term: &Term, state: &ReachingDefinitions) -> bool {
    match term.kind() {
        TermKind::MemoryLocationAccess { location } => !state.project(location).chunks().is_empty(),
        _ => false,
    }
}

fn join_reaching_values(state: &ReachingDefinitions, location: &MemoryLocation, dataflow: &Dataflow) -> TermValue {
    let projected = state.project(location);
    if projected.chunks().is_empty() {
        return TermValue::top(location.bit_size());
    }
    let mut acc: Option<TermValue> = None;
    for chunk in projected.chunks() {
        for &def in chunk.definitions() {
            if let Some(def_value) = dataflow.values.get(&def) {
                let extracted = extract_subrange(*def_value, chunk.location(), *location);
                acc = Some(match acc {
                    Some(existing) => existing.join(&extracted),
                    None => extracted,
                });
            }
        }
    }
    acc.unwrap_or_else(|| TermValue::top(location.bit_size()))
}

/// Extracts the bits of `value` (defined over `defining`) that fall within
/// `queried`, re-basing them to start at bit 0.
fn extract_subrange(value: TermValue, defining: MemoryLocation, queried: MemoryLocation) -> TermValue {
    let delta = queried.bit_offset() - defining.bit_offset();
    let shifted = value.abstract_value.shift(-delta);
    let resized = shifted.resize(queried.bit_size());
    TermValue { abstract_value: resized, stack_attribute: value.stack_attribute }
}

fn apply_unary(op: UnaryOperator, v: TermValue, size: u32) -> TermValue {
    let av = match op {
        UnaryOperator::Not => !v.abstract_value,
        UnaryOperator::Neg => -v.abstract_value,
        UnaryOperator::SignExtend => v.abstract_value.sign_extend(size),
        UnaryOperator::ZeroExtend => v.abstract_value.zero_extend(size),
        UnaryOperator::Truncate => v.abstract_value.resize(size),
    };
    TermValue { abstract_value: av, stack_attribute: StackAttribute::Unknown }
}

fn apply_binary(op: BinaryOperator, a: TermValue, b: TermValue, size: u32) -> TermValue {
    use BinaryOperator::*;

    let stack_attribute = match op {
        Add => match (a.stack_attribute, b.abstract_value.is_concrete()) {
            (StackAttribute::Offset(k), true) => StackAttribute::Offset(k + b.abstract_value.as_concrete_signed()),
            _ => match (b.stack_attribute, a.abstract_value.is_concrete()) {
                (StackAttribute::Offset(k), true) => StackAttribute::Offset(k + a.abstract_value.as_concrete_signed()),
                _ => a.stack_attribute.combine_additive(b.stack_attribute),
            },
        },
        Sub => match (a.stack_attribute, b.abstract_value.is_concrete()) {
            (StackAttribute::Offset(k), true) => StackAttribute::Offset(k - b.abstract_value.as_concrete_signed()),
            _ => StackAttribute::Unknown,
        },
        And => {
            // A mask of the form 2^n-1 on a stack offset preserves it
            // (alignment rounding of the stack pointer, e.g. `and esp, -16`).
            if let (StackAttribute::Offset(k), true) = (a.stack_attribute, b.abstract_value.is_concrete()) {
                let mask = b.abstract_value.as_concrete();
                if mask.wrapping_add(1).is_power_of_two() {
                    StackAttribute::Offset(k)
                } else {
                    StackAttribute::Unknown
                }
            } else {
                StackAttribute::Unknown
            }
        }
        _ => StackAttribute::Unknown,
    };

    let abstract_value = match op {
        Add => a.abstract_value + b.abstract_value,
        Sub => a.abstract_value - b.abstract_value,
        Mul => a.abstract_value * b.abstract_value,
        UDiv => abstract_value::udiv(a.abstract_value, b.abstract_value),
        SDiv => abstract_value::sdiv(a.abstract_value, b.abstract_value),
        URem => abstract_value::urem(a.abstract_value, b.abstract_value),
        SRem => abstract_value::srem(a.abstract_value, b.abstract_value),
        And => a.abstract_value & b.abstract_value,
        Or => a.abstract_value | b.abstract_value,
        Xor => a.abstract_value ^ b.abstract_value,
        Shl => abstract_value::shl(a.abstract_value, &b.abstract_value),
        Shr => abstract_value::shr_unsigned(a.abstract_value, &b.abstract_value),
        Sar => abstract_value::shr_signed(a.abstract_value, &b.abstract_value),
        Eq => abstract_value::eq(a.abstract_value, b.abstract_value),
        ULt => abstract_value::ult(a.abstract_value, b.abstract_value),
        SLt => abstract_value::slt(a.abstract_value, b.abstract_value),
        ULe => abstract_value::ule(a.abstract_value, b.abstract_value),
        SLe => abstract_value::sle(a.abstract_value, b.abstract_value),
    };

    let _ = size;
    TermValue { abstract_value, stack_attribute }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BasicBlock, Domain, TermIdSource};

    fn reg(family: u16, size: u32) -> MemoryLocation {
        MemoryLocation::register(family, 0, size)
    }

    #[test]
    fn constant_propagates_through_push_pop_to_ret() {
        // push 0x1234; pop eax; ret — modeled directly as IR without the
        // instruction analyzer, to isolate the dataflow algorithm.
        let mut program = Program::new();
        let sp = reg(4, 32);
        let eax = reg(0, 32);

        let mut block = BasicBlock::at(0);
        {
            let ids = program.term_ids();
            // esp = esp - 4
            let lhs = Term::memory_location_access(ids, sp);
            let esp_read = Term::memory_location_access(ids, sp);
            let four = Term::constant(ids, 32, 4);
            let rhs = Term::binary(ids, BinaryOperator::Sub, esp_read, four, 32);
            block.push_statement(Statement::assign(lhs, rhs));

            // *esp = 0x1234
            let esp_read2 = Term::memory_location_access(ids, sp);
            let lhs_deref = Term::dereference(ids, esp_read2, Domain::Memory, 32);
            let value = Term::constant(ids, 32, 0x1234);
            block.push_statement(Statement::assign(lhs_deref, value));

            // eax = *esp
            let eax_lhs = Term::memory_location_access(ids, eax);
            let esp_read3 = Term::memory_location_access(ids, sp);
            let rhs_deref = Term::dereference(ids, esp_read3, Domain::Memory, 32);
            block.push_statement(Statement::assign(eax_lhs, rhs_deref));

            // esp = esp + 4
            let lhs2 = Term::memory_location_access(ids, sp);
            let esp_read4 = Term::memory_location_access(ids, sp);
            let four2 = Term::constant(ids, 32, 4);
            let rhs2 = Term::binary(ids, BinaryOperator::Add, esp_read4, four2, 32);
            block.push_statement(Statement::assign(lhs2, rhs2));
        }
        block.push_statement(Statement::Return);
        program.insert_block(0, block);

        let function = crate::ir::isolate(&program, 0);
        let dataflow = analyze(&program, &function, sp);

        // Find the eax-defining term's value by re-walking the block.
        let block = program.block(0).unwrap();
        if let Statement::Assignment { lhs, .. } = &block.statements()[2] {
            let v = dataflow.value(lhs.id()).expect("eax should have a computed value");
            assert!(v.abstract_value.is_concrete());
            assert_eq!(v.abstract_value.as_concrete(), 0x1234);
        } else {
            panic!("expected assignment at index 2");
        }
    }

    #[test]
    fn stack_pointer_starts_as_frame_base_offset_zero() {
        let mut program = Program::new();
        let sp = reg(4, 32);
        let mut block = BasicBlock::at(0);
        let read_term = {
            let ids = program.term_ids();
            let t = Term::memory_location_access(ids, sp);
            block.push_statement(Statement::Touch { term: t.clone(), kind: TouchKind::Read });
            t
        };
        block.push_statement(Statement::Return);
        program.insert_block(0, block);
        let function = crate::ir::isolate(&program, 0);
        let dataflow = analyze(&program, &function, sp);
        let v = dataflow.value(read_term.id()).unwrap();
        assert_eq!(v.stack_attribute, StackAttribute::Offset(0));
    }
}
