//! Typed arena bundle used to allocate every AST node kind during parsing.
//!
//! One [`feral_base::Arena<T>`] per node type, the way `logicaffeine_language`'s
//! `AstContext` bundles its arenas. A single bump allocator backs the whole
//! module: nothing here is freed until the [`AstArena`] itself is dropped
//! (or [`AstArena::reset`] is called, for REPL reuse).

use feral_base::{Arena, Location, Symbol};

use crate::ast::expr::{Arg, Expr, ExprNode, FnSig, StructField, Var};
use crate::ast::stmt::{Block, Cond, CondArm, For, ForIn, Stmt, VarDecl, While};

pub struct AstArena<'a> {
    pub exprs: &'a Arena<ExprNode<'a>>,
    pub stmts: &'a Arena<Stmt<'a>>,
    pub blocks: &'a Arena<Block<'a>>,
    pub fn_sigs: &'a Arena<FnSig<'a>>,
    pub var_decls: &'a Arena<VarDecl<'a>>,
    pub conds: &'a Arena<Cond<'a>>,
    pub fors: &'a Arena<For<'a>>,
    pub for_ins: &'a Arena<ForIn<'a>>,
    pub whiles: &'a Arena<While<'a>>,
    pub expr_refs: &'a Arena<&'a ExprNode<'a>>,
    pub expr_pairs: &'a Arena<(&'a ExprNode<'a>, &'a ExprNode<'a>)>,
    pub stmt_refs: &'a Arena<&'a Stmt<'a>>,
    pub cond_arms: &'a Arena<CondArm<'a>>,
    pub symbols: &'a Arena<Symbol>,
    pub vars: &'a Arena<Var<'a>>,
    pub args: &'a Arena<Arg<'a>>,
    pub struct_fields: &'a Arena<StructField<'a>>,
}

impl<'a> AstArena<'a> {
    pub fn expr(&self, kind: Expr<'a>, loc: Location) -> &'a ExprNode<'a> {
        self.exprs.alloc(ExprNode::new(kind, loc))
    }

    pub fn stmt(&self, stmt: Stmt<'a>) -> &'a Stmt<'a> {
        self.stmts.alloc(stmt)
    }

    pub fn block(&self, stmts: Vec<&'a Stmt<'a>>, loc: Location) -> &'a Block<'a> {
        let stmts = self.stmt_refs.alloc_slice(stmts);
        self.blocks.alloc(Block { stmts, loc })
    }

    pub fn fn_sig(&self, sig: FnSig<'a>) -> &'a FnSig<'a> {
        self.fn_sigs.alloc(sig)
    }

    pub fn var_decl(&self, decl: VarDecl<'a>) -> &'a VarDecl<'a> {
        self.var_decls.alloc(decl)
    }

    pub fn cond(&self, arms: Vec<CondArm<'a>>, loc: Location) -> &'a Cond<'a> {
        let arms = self.cond_arms.alloc_slice(arms);
        self.conds.alloc(Cond { arms, loc })
    }

    pub fn for_(&self, node: For<'a>) -> &'a For<'a> {
        self.fors.alloc(node)
    }

    pub fn for_in(&self, node: ForIn<'a>) -> &'a ForIn<'a> {
        self.for_ins.alloc(node)
    }

    pub fn while_(&self, node: While<'a>) -> &'a While<'a> {
        self.whiles.alloc(node)
    }

    pub fn expr_slice(&self, items: Vec<&'a ExprNode<'a>>) -> &'a [&'a ExprNode<'a>] {
        self.expr_refs.alloc_slice(items)
    }

    pub fn expr_pair_slice(
        &self,
        items: Vec<(&'a ExprNode<'a>, &'a ExprNode<'a>)>,
    ) -> &'a [(&'a ExprNode<'a>, &'a ExprNode<'a>)] {
        self.expr_pairs.alloc_slice(items)
    }

    pub fn symbol_slice(&self, items: Vec<Symbol>) -> &'a [Symbol] {
        self.symbols.alloc_slice(items)
    }

    pub fn var_slice(&self, items: Vec<Var<'a>>) -> &'a [Var<'a>] {
        self.vars.alloc_slice(items)
    }

    pub fn arg_slice(&self, items: Vec<Arg<'a>>) -> &'a [Arg<'a>] {
        self.args.alloc_slice(items)
    }

    pub fn struct_field_slice(&self, items: Vec<StructField<'a>>) -> &'a [StructField<'a>] {
        self.struct_fields.alloc_slice(items)
    }
}

/// Owns one bump arena per node type. A caller creates one `Arenas` per
/// module compile (or keeps a single long-lived one in a REPL, calling
/// [`Arenas::reset`] between evaluations) and borrows an [`AstArena`] view
/// from it for the duration of a parse.
#[derive(Default)]
pub struct Arenas<'a> {
    exprs: Arena<ExprNode<'a>>,
    stmts: Arena<Stmt<'a>>,
    blocks: Arena<Block<'a>>,
    fn_sigs: Arena<FnSig<'a>>,
    var_decls: Arena<VarDecl<'a>>,
    conds: Arena<Cond<'a>>,
    fors: Arena<For<'a>>,
    for_ins: Arena<ForIn<'a>>,
    whiles: Arena<While<'a>>,
    expr_refs: Arena<&'a ExprNode<'a>>,
    expr_pairs: Arena<(&'a ExprNode<'a>, &'a ExprNode<'a>)>,
    stmt_refs: Arena<&'a Stmt<'a>>,
    cond_arms: Arena<CondArm<'a>>,
    symbols: Arena<Symbol>,
    vars: Arena<Var<'a>>,
    args: Arena<Arg<'a>>,
    struct_fields: Arena<StructField<'a>>,
}

impl<'a> Arenas<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ctx(&'a self) -> AstArena<'a> {
        AstArena {
            exprs: &self.exprs,
            stmts: &self.stmts,
            blocks: &self.blocks,
            fn_sigs: &self.fn_sigs,
            var_decls: &self.var_decls,
            conds: &self.conds,
            fors: &self.fors,
            for_ins: &self.for_ins,
            whiles: &self.whiles,
            expr_refs: &self.expr_refs,
            expr_pairs: &self.expr_pairs,
            stmt_refs: &self.stmt_refs,
            cond_arms: &self.cond_arms,
            symbols: &self.symbols,
            vars: &self.vars,
            args: &self.args,
            struct_fields: &self.struct_fields,
        }
    }
}
