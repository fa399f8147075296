//! Statement and block AST nodes (`spec.md` §3 "Simple"/"Block"/"Cond"/
//! "For"/"ForIn"/"Ret"/"Continue"/"Break"/"Defer"/"VarDecl").

use feral_base::{Location, Symbol};

use crate::ast::expr::{ExprNode, FnSig, Var};

/// `let name [in expr] = expr, ...;` — an ordered list of [`Var`] bindings
/// (`spec.md` §3 "VarDecl").
#[derive(Debug, Clone)]
pub struct VarDecl<'a> {
    pub vars: &'a [Var<'a>],
    pub loc: Location,
}

/// One `if`/`elif*`/`else?` chain. Parsed as a flat list of
/// `(condition, body)` pairs plus an optional trailing `else` body — the
/// condition of the final pair is `None` for a bare `else`.
#[derive(Debug, Clone)]
pub struct CondArm<'a> {
    pub cond: Option<&'a ExprNode<'a>>,
    pub body: &'a Block<'a>,
}

#[derive(Debug, Clone)]
pub struct Cond<'a> {
    pub arms: &'a [CondArm<'a>],
    pub loc: Location,
}

#[derive(Debug, Clone)]
pub struct For<'a> {
    pub init: Option<&'a Stmt<'a>>,
    pub cond: Option<&'a ExprNode<'a>>,
    pub step: Option<&'a ExprNode<'a>>,
    pub body: &'a Block<'a>,
    pub loc: Location,
}

#[derive(Debug, Clone)]
pub struct ForIn<'a> {
    pub binding: Symbol,
    pub iterable: &'a ExprNode<'a>,
    pub body: &'a Block<'a>,
    pub loc: Location,
}

#[derive(Debug, Clone)]
pub struct While<'a> {
    pub cond: &'a ExprNode<'a>,
    pub body: &'a Block<'a>,
    pub loc: Location,
}

/// A single statement. `spec.md` §3 names most of these as distinct node
/// kinds (`Ret`, `Continue`, `Break`, `Defer`, ...); they are unified into
/// one enum here the way a recursive-descent statement parser naturally
/// produces them.
#[derive(Debug, Clone)]
pub enum Stmt<'a> {
    Expr(&'a ExprNode<'a>),
    VarDecl(&'a VarDecl<'a>),
    FnDef(&'a FnSig<'a>),
    Cond(&'a Cond<'a>),
    For(&'a For<'a>),
    ForIn(&'a ForIn<'a>),
    While(&'a While<'a>),
    Return(Option<&'a ExprNode<'a>>, Location),
    Continue(Location),
    Break(Location),
    /// `defer expr;` — registers `expr` to run, in reverse order, at every
    /// exit of the innermost enclosing block (`spec.md` §5.2).
    Defer(&'a ExprNode<'a>, Location),
    Block(&'a Block<'a>),
}

impl<'a> Stmt<'a> {
    pub fn loc(&self) -> Location {
        match self {
            Stmt::Expr(e) => e.loc,
            Stmt::VarDecl(v) => v.loc,
            Stmt::FnDef(f) => f.loc,
            Stmt::Cond(c) => c.loc,
            Stmt::For(f) => f.loc,
            Stmt::ForIn(f) => f.loc,
            Stmt::While(w) => w.loc,
            Stmt::Return(_, loc) | Stmt::Continue(loc) | Stmt::Break(loc) | Stmt::Defer(_, loc) => *loc,
            Stmt::Block(b) => b.loc,
        }
    }
}

/// A `{ ... }` statement sequence. The unit of `defer` unwinding and of
/// loop/function scope in the VM.
#[derive(Debug, Clone)]
pub struct Block<'a> {
    pub stmts: &'a [&'a Stmt<'a>],
    pub loc: Location,
}
