//! Constant folding, `defer` lowering, and dead-branch elimination over a
//! parsed feral module (`spec.md` §4.3).
//!
//! Three independent rewrite passes, composed in [`simplify_module`] in
//! the order the spec's testable properties require: fold first (so
//! `defer`/`dce` see already-collapsed conditions), then lower `defer`
//! (since its scope-exit statement insertion must see the final control
//! structure), then eliminate dead branches (cheap now that both folding
//! and defer-lowering are done). `spec.md` §8 requires `parse ∘ simplify`
//! to be idempotent after the first pass — running any of these three
//! again on their own output is a no-op, since each only rewrites nodes
//! it can still find something to do with.

pub mod dce;
pub mod defer;
pub mod fold;

use feral_syntax::ast::{AstArena, Block, Expr, FnSig, Stmt};

/// Runs the full simplify pipeline over a module's top-level block,
/// descending into every nested function body along the way.
pub fn simplify_module<'a>(ast: &AstArena<'a>, block: &'a Block<'a>) -> &'a Block<'a> {
    let folded = fold_block(ast, block);
    let deferred = defer::lower_block(ast, folded);
    let simplified = dce::eliminate_dead_code(ast, deferred);
    log::debug!("simplified module ({} top-level statements)", simplified.stmts.len());
    simplified
}

/// Folds every expression in `block`, recursing into nested blocks
/// (loops, conditionals, function bodies, `or`-handler bodies) so nothing
/// inside a nested scope is left unfolded.
fn fold_block<'a>(ast: &AstArena<'a>, block: &'a Block<'a>) -> &'a Block<'a> {
    let stmts: Vec<_> = block.stmts.iter().map(|&s| fold_stmt(ast, s)).collect();
    ast.block(stmts, block.loc)
}

fn fold_stmt<'a>(ast: &AstArena<'a>, stmt: &'a Stmt<'a>) -> &'a Stmt<'a> {
    match stmt {
        Stmt::Expr(e) => ast.stmt(Stmt::Expr(fold_expr_deep(ast, e))),
        Stmt::VarDecl(decl) => {
            let vars: Vec<_> = decl
                .vars
                .iter()
                .map(|v| feral_syntax::ast::Var {
                    name: v.name,
                    in_target: v.in_target.map(|e| fold_expr_deep(ast, e)),
                    value: v.value.map(|e| fold_expr_deep(ast, e)),
                    is_fn_arg: v.is_fn_arg,
                    is_const: v.is_const,
                    loc: v.loc,
                })
                .collect();
            let vars = ast.var_slice(vars);
            let new_decl = ast.var_decl(feral_syntax::ast::VarDecl { vars, loc: decl.loc });
            ast.stmt(Stmt::VarDecl(new_decl))
        }
        Stmt::FnDef(sig) => ast.stmt(Stmt::FnDef(fold_fn_sig(ast, sig))),
        Stmt::Cond(cond) => {
            let arms: Vec<_> = cond
                .arms
                .iter()
                .map(|arm| feral_syntax::ast::CondArm {
                    cond: arm.cond.map(|c| fold_expr_deep(ast, c)),
                    body: fold_block(ast, arm.body),
                })
                .collect();
            let new_cond = ast.cond(arms, cond.loc);
            ast.stmt(Stmt::Cond(new_cond))
        }
        Stmt::For(f) => {
            let init = f.init.map(|s| fold_stmt(ast, s));
            let cond = f.cond.map(|c| fold_expr_deep(ast, c));
            let step = f.step.map(|c| fold_expr_deep(ast, c));
            let body = fold_block(ast, f.body);
            let new_for = ast.for_(feral_syntax::ast::For { init, cond, step, body, loc: f.loc });
            ast.stmt(Stmt::For(new_for))
        }
        Stmt::ForIn(f) => {
            let iterable = fold_expr_deep(ast, f.iterable);
            let body = fold_block(ast, f.body);
            let new_for_in =
                ast.for_in(feral_syntax::ast::ForIn { binding: f.binding, iterable, body, loc: f.loc });
            ast.stmt(Stmt::ForIn(new_for_in))
        }
        Stmt::While(w) => {
            let cond = fold_expr_deep(ast, w.cond);
            let body = fold_block(ast, w.body);
            let new_while = ast.while_(feral_syntax::ast::While { cond, body, loc: w.loc });
            ast.stmt(Stmt::While(new_while))
        }
        Stmt::Return(value, loc) => {
            let value = value.map(|e| fold_expr_deep(ast, e));
            ast.stmt(Stmt::Return(value, *loc))
        }
        Stmt::Defer(e, loc) => ast.stmt(Stmt::Defer(fold_expr_deep(ast, e), *loc)),
        Stmt::Block(b) => ast.stmt(Stmt::Block(fold_block(ast, b))),
        Stmt::Continue(_) | Stmt::Break(_) => stmt,
    }
}

fn fold_fn_sig<'a>(ast: &AstArena<'a>, sig: &'a FnSig<'a>) -> &'a FnSig<'a> {
    let body = fold_block(ast, sig.body);
    ast.fn_sig(FnSig { name: sig.name, params: sig.params.clone(), body, loc: sig.loc })
}

/// Folds `expr`'s own subtree with [`fold::fold_expr`], then additionally
/// descends into any nested block it carries (`FnLit` bodies,
/// `OrHandler` handler bodies) that `fold_expr` intentionally leaves
/// alone.
fn fold_expr_deep<'a>(
    ast: &AstArena<'a>,
    expr: &'a feral_syntax::ast::ExprNode<'a>,
) -> &'a feral_syntax::ast::ExprNode<'a> {
    let folded = fold::fold_expr(ast, expr);
    match &folded.kind {
        Expr::FnLit(sig) => {
            let new_sig = fold_fn_sig(ast, sig);
            ast.expr(Expr::FnLit(new_sig), folded.loc)
        }
        Expr::OrHandler { expr: inner, capture, handler } => {
            let new_handler = fold_block(ast, handler);
            ast.expr(Expr::OrHandler { expr: *inner, capture: *capture, handler: new_handler }, folded.loc)
        }
        _ => folded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feral_base::{Location, SourceId};
    use feral_syntax::ast::{Arenas, BinOp, Literal};

    fn loc() -> Location {
        Location::new(SourceId::from_raw(0), 0, 1)
    }

    #[test]
    fn simplify_module_folds_and_drops_dead_branches() {
        let arenas = Arenas::new();
        let ast = arenas.ctx();
        let one = ast.expr(Expr::Literal(Literal::Int(1)), loc());
        let two = ast.expr(Expr::Literal(Literal::Int(2)), loc());
        let sum = ast.expr(Expr::Binary { op: BinOp::Add, lhs: one, rhs: two }, loc());
        let expr_stmt = ast.stmt(Stmt::Expr(sum));
        let ret = ast.stmt(Stmt::Return(None, loc()));
        let unreachable = ast.stmt(Stmt::Continue(loc()));
        let block = ast.block(vec![expr_stmt, ret, unreachable], loc());

        let out = simplify_module(&ast, block);
        assert_eq!(out.stmts.len(), 2);
        match out.stmts[0] {
            Stmt::Expr(e) => assert!(matches!(e.kind, Expr::Literal(Literal::Int(3)))),
            _ => panic!("expected expr stmt"),
        }
    }
}
