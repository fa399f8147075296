//! Abstract syntax tree produced by [`crate::parser::Parser`].
//!
//! All nodes are arena-allocated (`bumpalo`, via [`feral_base::Arena`]); the
//! `'a` lifetime parameter threaded through every type here is the arena's.
//! Each node carries, or is wrapped in a node that carries, a
//! [`feral_base::Location`] so later passes never need to re-derive a span
//! from a node's children.
//!
//! Split into two submodules:
//! - [`expr`]: expressions, literals, function signatures/literals
//! - [`stmt`]: statements, blocks, control-flow constructs

pub mod arena;
pub mod expr;
pub mod stmt;

pub use arena::{Arenas, AstArena};
pub use expr::{
    Arg, BinOp, Expr, ExprNode, FnSig, IncDecOp, IncDecPos, Literal, Params, StructField, UnOp, Var,
};
pub use stmt::{Block, Cond, CondArm, For, ForIn, Stmt, VarDecl, While};

/// A whole parsed source file: its top-level statement sequence.
#[derive(Debug, Clone)]
pub struct Module<'a> {
    pub block: &'a Block<'a>,
}
