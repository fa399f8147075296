//! Dead-branch elimination (`spec.md` §4.3 "removes trivially dead
//! branches arising from literal-folded conditions"), modeled on
//! `logicaffeine_compile::optimize::dce::eliminate_dead_code`'s approach:
//! collapse `if`/`while` arms whose condition folded to a literal, and
//! truncate a statement list after an unconditional exit.

use feral_syntax::ast::{AstArena, Block, Expr, Literal, Stmt};

/// Runs after [`crate::fold::fold_expr`] has already folded every
/// condition expression in `block` to its simplest literal form where
/// possible. Rebuilds the block with:
/// - `if` arms whose condition is a literal `false` dropped entirely;
///   an arm whose condition is a literal `true` becomes the chain's final
///   (unconditional) arm and every arm after it is unreachable and
///   dropped.
/// - `while false { ... }` removed outright (the body never runs).
/// - Any statement after an unconditional `return`/`break`/`continue`
///   in the same statement list is unreachable and dropped.
pub fn eliminate_dead_code<'a>(ast: &AstArena<'a>, block: &'a Block<'a>) -> &'a Block<'a> {
    let mut out: Vec<&'a Stmt<'a>> = Vec::new();

    for &stmt in block.stmts {
        let stmt = simplify_stmt(ast, stmt);
        let terminal = is_unconditional_exit(stmt);
        out.push(stmt);
        if terminal {
            break;
        }
    }

    ast.block(out, block.loc)
}

fn simplify_stmt<'a>(ast: &AstArena<'a>, stmt: &'a Stmt<'a>) -> &'a Stmt<'a> {
    match stmt {
        Stmt::Block(b) => ast.stmt(Stmt::Block(eliminate_dead_code(ast, b))),
        Stmt::Cond(cond) => {
            let mut kept = Vec::new();
            for arm in cond.arms {
                match arm.cond {
                    Some(c) => match literal_bool(c) {
                        Some(false) => continue,
                        Some(true) => {
                            let body = eliminate_dead_code(ast, arm.body);
                            kept.push(feral_syntax::ast::CondArm { cond: None, body });
                            break;
                        }
                        None => {
                            let body = eliminate_dead_code(ast, arm.body);
                            kept.push(feral_syntax::ast::CondArm { cond: Some(c), body });
                        }
                    },
                    None => {
                        let body = eliminate_dead_code(ast, arm.body);
                        kept.push(feral_syntax::ast::CondArm { cond: None, body });
                        break;
                    }
                }
            }
            if kept.is_empty() {
                // Whole chain folded to nothing: replace with an empty
                // block so the statement slot is still well-formed.
                ast.stmt(Stmt::Block(ast.block(Vec::new(), cond.loc)))
            } else if kept.len() == 1 && kept[0].cond.is_none() {
                ast.stmt(Stmt::Block(kept[0].body))
            } else {
                let new_cond = ast.cond(kept, cond.loc);
                ast.stmt(Stmt::Cond(new_cond))
            }
        }
        Stmt::While(w) => match literal_bool(w.cond) {
            Some(false) => ast.stmt(Stmt::Block(ast.block(Vec::new(), w.loc))),
            _ => {
                let body = eliminate_dead_code(ast, w.body);
                let new_while = ast.while_(feral_syntax::ast::While { cond: w.cond, body, loc: w.loc });
                ast.stmt(Stmt::While(new_while))
            }
        },
        Stmt::For(f) => {
            let body = eliminate_dead_code(ast, f.body);
            let new_for = ast.for_(feral_syntax::ast::For {
                init: f.init,
                cond: f.cond,
                step: f.step,
                body,
                loc: f.loc,
            });
            ast.stmt(Stmt::For(new_for))
        }
        Stmt::ForIn(f) => {
            let body = eliminate_dead_code(ast, f.body);
            let new_for_in = ast.for_in(feral_syntax::ast::ForIn {
                binding: f.binding,
                iterable: f.iterable,
                body,
                loc: f.loc,
            });
            ast.stmt(Stmt::ForIn(new_for_in))
        }
        other => other,
    }
}

fn literal_bool(expr: &feral_syntax::ast::ExprNode) -> Option<bool> {
    match &expr.kind {
        Expr::Literal(Literal::Bool(b)) => Some(*b),
        Expr::Literal(Literal::Int(n)) => Some(*n != 0),
        Expr::Literal(Literal::Nil) => Some(false),
        _ => None,
    }
}

fn is_unconditional_exit(stmt: &Stmt) -> bool {
    matches!(stmt, Stmt::Return(_, _) | Stmt::Break(_) | Stmt::Continue(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use feral_base::{Location, SourceId};
    use feral_syntax::ast::{Arenas, CondArm};

    fn loc() -> Location {
        Location::new(SourceId::from_raw(0), 0, 1)
    }

    #[test]
    fn drops_statements_after_return() {
        let arenas = Arenas::new();
        let ast = arenas.ctx();
        let ret = ast.stmt(Stmt::Return(None, loc()));
        let cont = ast.stmt(Stmt::Continue(loc()));
        let block = ast.block(vec![ret, cont], loc());
        let out = eliminate_dead_code(&ast, block);
        assert_eq!(out.stmts.len(), 1);
    }

    #[test]
    fn collapses_if_false_away() {
        let arenas = Arenas::new();
        let ast = arenas.ctx();
        let cond_expr = ast.expr(Expr::Literal(Literal::Bool(false)), loc());
        let body = ast.block(vec![ast.stmt(Stmt::Continue(loc()))], loc());
        let arm = CondArm { cond: Some(cond_expr), body };
        let cond = ast.cond(vec![arm], loc());
        let stmt = ast.stmt(Stmt::Cond(cond));
        let block = ast.block(vec![stmt], loc());
        let out = eliminate_dead_code(&ast, block);
        assert_eq!(out.stmts.len(), 1);
        assert!(matches!(out.stmts[0], Stmt::Block(b) if b.stmts.is_empty()));
    }
}
