//! Walks a function's recovered [`Region`] tree in structural order and
//! emits a [`likec::Function`] (§4.9): declarations from variables and
//! types, expressions from terms, statements from IR statements, control
//! structures from regions.

use rustc_hash::{FxHashMap, FxHashSet};

use decomp_types::TypeTable;

use crate::ir::{BinaryOperator, BlockAddress, Function as IrFunction, JumpTarget, MemoryLocation, Program, Statement, Term, TermKind};
use crate::signatures::{CallSite, Signature};
use crate::structural::Region;
use crate::types::TypeAssignment;
use crate::variables::Variables;

use super::likec::{self, Declaration, Expr, Stmt};

/// Emits the LikeC AST for one function.
pub fn generate(
    program: &Program,
    function: &IrFunction,
    region: &Region,
    variables: &Variables,
    signature: &Signature,
    type_table: &mut TypeTable,
    type_assignment: &TypeAssignment,
    call_sites: &FxHashMap<BlockAddress, CallSite>,
) -> likec::Function {
    let mut used: FxHashSet<crate::variables::VariableId> = FxHashSet::default();

    let parameters: Vec<Declaration> = signature
        .formals
        .iter()
        .filter_map(|loc| variables.variable_of(loc))
        .filter(|id| used.insert(*id))
        .map(|variable| Declaration { variable, type_id: None })
        .collect();

    let locals: Vec<Declaration> = variables
        .distinct_variables()
        .into_iter()
        .filter(|(id, _)| used.insert(*id))
        .map(|(variable, _)| Declaration { variable, type_id: None })
        .collect();

    let body = emit_region(program, function, region, variables, signature, type_assignment, call_sites);
    let _ = type_table;

    likec::Function { entry: region.entry(), parameters, locals, body }
}

fn emit_region(program: &Program, function: &IrFunction, region: &Region, variables: &Variables, signature: &Signature, types: &TypeAssignment, call_sites: &FxHashMap<BlockAddress, CallSite>) -> Vec<Stmt> {
    match region {
        Region::Block(addr) => emit_block(program, function, *addr, variables, signature, types, call_sites),
        Region::Sequence(parts) => parts.iter().flat_map(|r| emit_region(program, function, r, variables, signature, types, call_sites)).collect(),
        Region::IfThenElse { head, then_branch, else_branch } => {
            let mut out = block_prefix(program, function, *head, variables, signature, types, call_sites);
            let cond = block_condition(program, *head, variables, types).unwrap_or(Expr::Undefined);
            out.push(Stmt::If {
                cond,
                then_branch: emit_region(program, function, then_branch, variables, signature, types, call_sites),
                else_branch: emit_region(program, function, else_branch, variables, signature, types, call_sites),
            });
            out
        }
        Region::IfThen { head, then_branch } => {
            let mut out = block_prefix(program, function, *head, variables, signature, types, call_sites);
            let cond = block_condition(program, *head, variables, types).unwrap_or(Expr::Undefined);
            out.push(Stmt::If { cond, then_branch: emit_region(program, function, then_branch, variables, signature, types, call_sites), else_branch: Vec::new() });
            out
        }
        Region::While { head, body } => {
            let cond = block_condition(program, *head, variables, types).unwrap_or(Expr::Undefined);
            vec![Stmt::While { cond, body: emit_region(program, function, body, variables, signature, types, call_sites) }]
        }
        Region::DoWhile { head, body } => {
            let cond = block_condition(program, *head, variables, types).unwrap_or(Expr::Undefined);
            vec![Stmt::DoWhile { body: emit_region(program, function, body, variables, signature, types, call_sites), cond }]
        }
        Region::Switch { head, cases } => {
            let mut out = block_prefix(program, function, *head, variables, signature, types, call_sites);
            let scrutinee = block_condition(program, *head, variables, types).unwrap_or(Expr::Undefined);
            out.push(Stmt::Switch { scrutinee, cases: cases.iter().map(|c| emit_region(program, function, c, variables, signature, types, call_sites)).collect() });
            out
        }
        Region::Goto(addr) => vec![Stmt::Goto(*addr)],
    }
}

/// Every non-terminator statement of `addr`'s block, translated
/// verbatim — used both for a plain [`Region::Block`] and as the
/// fall-through prefix emitted before a compound region's test.
fn block_prefix(program: &Program, function: &IrFunction, addr: BlockAddress, variables: &Variables, signature: &Signature, types: &TypeAssignment, call_sites: &FxHashMap<BlockAddress, CallSite>) -> Vec<Stmt> {
    emit_block(program, function, addr, variables, signature, types, call_sites)
}

fn emit_block(program: &Program, function: &IrFunction, addr: BlockAddress, variables: &Variables, signature: &Signature, types: &TypeAssignment, call_sites: &FxHashMap<BlockAddress, CallSite>) -> Vec<Stmt> {
    let Some(block) = program.block(addr) else { return Vec::new() };
    let mut out = Vec::new();
    for statement in block.statements() {
        match statement {
            Statement::Comment(text) => out.push(Stmt::Comment(text.clone())),
            Statement::InlineAssembly(text) => out.push(Stmt::Comment(format!("asm: {text}"))),
            Statement::Assignment { lhs, rhs } => out.push(Stmt::Assign(expr(lhs, variables, types), expr(rhs, variables, types))),
            Statement::Touch { .. } => {}
            Statement::Jump { .. } => {}
            Statement::Call { target } => out.push(Stmt::Expr(call_expr(target, function, call_sites.get(&addr), variables, types))),
            Statement::Return => out.push(Stmt::Return(return_value(signature, variables))),
            Statement::Halt => out.push(Stmt::Comment("halt".to_string())),
        }
    }
    out
}

/// The single-term condition a structural region's head block ends on,
/// if it has one (a `While`/`DoWhile`/`IfThen*` head always does; a
/// `Switch` head's "condition" is the table-index expression).
fn block_condition(program: &Program, addr: BlockAddress, variables: &Variables, types: &TypeAssignment) -> Option<Expr> {
    let block = program.block(addr)?;
    match block.terminator()? {
        Statement::Jump { condition: Some(cond), .. } => Some(expr(cond, variables, types)),
        _ => None,
    }
}

/// The recovered return value, if the Signature Analyzer found one
/// location written on every return path and Variable Reconstruction
/// assigned it a variable.
fn return_value(signature: &Signature, variables: &Variables) -> Option<Expr> {
    signature.returns.first().and_then(|loc| variables.variable_of(loc)).map(Expr::Variable)
}

fn call_expr(target: &JumpTarget, _function: &IrFunction, call_site: Option<&CallSite>, variables: &Variables, types: &TypeAssignment) -> Expr {
    let callee = match target {
        JumpTarget::Direct(addr) => Expr::FunctionRef(*addr),
        JumpTarget::Computed(term) => expr(term, variables, types),
        JumpTarget::Table(_) => Expr::Undefined,
    };
    let args = call_site
        .map(|site| site.actuals.iter().filter_map(|loc| variables.variable_of(loc)).map(Expr::Variable).collect())
        .unwrap_or_default();
    Expr::Call(Box::new(callee), args)
}

fn expr(term: &Term, variables: &Variables, types: &TypeAssignment) -> Expr {
    let _ = types;
    match term.kind() {
        TermKind::Constant { value } => Expr::Literal(*value),
        TermKind::Intrinsic { .. } => Expr::Undefined,
        TermKind::MemoryLocationAccess { location } => variable_expr(*location, variables),
        TermKind::Dereference { address, .. } => Expr::Deref(Box::new(expr(address, variables, types))),
        TermKind::UnaryOp { op, operand } => Expr::Unary(*op, Box::new(expr(operand, variables, types))),
        TermKind::BinaryOp { op, left, right } => binary_expr(*op, left, right, variables, types),
        TermKind::Choice { preferred, .. } => {
            // At the source level a choice reads as whichever reaching
            // definition the dataflow analyzer preferred; the
            // conservative default only matters before that pass runs.
            expr(preferred, variables, types)
        }
    }
}

fn binary_expr(op: BinaryOperator, left: &Term, right: &Term, variables: &Variables, types: &TypeAssignment) -> Expr {
    Expr::Binary(op, Box::new(expr(left, variables, types)), Box::new(expr(right, variables, types)))
}

fn variable_expr(location: MemoryLocation, variables: &Variables) -> Expr {
    variables.variable_of(&location).map(Expr::Variable).unwrap_or(Expr::Undefined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::{x86_regs, CallingConvention};
    use crate::ir::{isolate, BasicBlock, MemoryLocation as Loc};
    use crate::{signatures, structural, types as type_analysis, variables as var_analysis};

    #[test]
    fn straight_line_function_emits_assign_and_return() {
        let mut program = Program::new();
        let mut block = BasicBlock::at(0);
        let lhs = Term::memory_location_access(program.term_ids(), Loc::register(x86_regs::AX, 0, 32));
        let rhs = Term::constant(program.term_ids(), 32, 7);
        block.push_statement(Statement::assign(lhs, rhs));
        block.push_statement(Statement::Return);
        program.insert_block(0, block);
        let function = isolate(&program, 0);

        let convention = CallingConvention::cdecl32();
        let signature = signatures::analyze_signature(&program, &function, &convention);
        let variables = var_analysis::reconstruct(&program, &function);
        let (mut table, assignment) = type_analysis::analyze(&program, &function);
        let region = structural::analyze(&program, &function);
        let call_sites = FxHashMap::default();

        let ast = generate(&program, &function, &region, &variables, &signature, &mut table, &assignment, &call_sites);
        let eax_var = variables.variable_of(&Loc::register(x86_regs::AX, 0, 32)).expect("eax got a variable");
        assert!(matches!(ast.body.last(), Some(Stmt::Return(Some(Expr::Variable(v)))) if *v == eax_var));
        assert!(matches!(ast.body.first(), Some(Stmt::Assign(_, _))));
    }
}
