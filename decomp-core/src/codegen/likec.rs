//! The LikeC AST: the core's output format (§6 — "a LikeC AST, external
//! printer converts to text"). This module only builds the tree; no
//! textual rendering lives here.

use crate::ir::{BinaryOperator, BlockAddress, UnaryOperator};
use crate::variables::VariableId;

use decomp_types::TypeId;

/// An expression node.
#[derive(Debug, Clone)]
pub enum Expr {
    /// An integer literal.
    Literal(u64),
    /// A reference to a reconstructed variable.
    Variable(VariableId),
    /// `op operand`.
    Unary(UnaryOperator, Box<Expr>),
    /// `left op right`.
    Binary(BinaryOperator, Box<Expr>, Box<Expr>),
    /// `*address`.
    Deref(Box<Expr>),
    /// A call expression with its actual arguments, in formal order.
    Call(Box<Expr>, Vec<Expr>),
    /// A direct reference to a function at a known address (callee of a
    /// resolved [`crate::ir::JumpTarget::Direct`] call).
    FunctionRef(BlockAddress),
    /// A value whose defining term could not be resolved (e.g. an
    /// opaque intrinsic or an unresolved computed jump target).
    Undefined,
}

/// A statement node.
#[derive(Debug, Clone)]
pub enum Stmt {
    /// A bare expression statement (e.g. a call for its side effect).
    Expr(Expr),
    /// `lhs = rhs;`.
    Assign(Expr, Expr),
    /// `return expr;` or a bare `return;`.
    Return(Option<Expr>),
    /// `if (cond) { then_branch } else { else_branch }`. `else_branch` is
    /// empty for a single-armed `if`.
    If { cond: Expr, then_branch: Vec<Stmt>, else_branch: Vec<Stmt> },
    /// `while (cond) { body }`.
    While { cond: Expr, body: Vec<Stmt> },
    /// `do { body } while (cond);`.
    DoWhile { body: Vec<Stmt>, cond: Expr },
    /// `switch (scrutinee) { case ...: body ... }`, cases in table order.
    Switch { scrutinee: Expr, cases: Vec<Vec<Stmt>> },
    /// `goto label_<addr>;` for an edge the structural analyzer could not
    /// fold into a structured shape.
    Goto(BlockAddress),
    /// `label_<addr>:` marking a goto target.
    Label(BlockAddress),
    /// A free-form annotation carried through from [`crate::ir::Statement::Comment`].
    Comment(String),
}

/// One recovered local or parameter declaration.
#[derive(Debug, Clone)]
pub struct Declaration {
    /// The declared variable.
    pub variable: VariableId,
    /// Its recovered type, if the type analyzer reached a conclusion.
    pub type_id: Option<TypeId>,
}

/// A whole decompiled function's AST.
#[derive(Debug, Clone)]
pub struct Function {
    /// The function's entry block address, used as its identity.
    pub entry: BlockAddress,
    /// Formal parameters, in calling-convention order.
    pub parameters: Vec<Declaration>,
    /// Locals not already listed as parameters.
    pub locals: Vec<Declaration>,
    /// The function body.
    pub body: Vec<Stmt>,
}
