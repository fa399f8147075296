//! Constant folding (`spec.md` §4.3). Walks the AST bottom-up, the way
//! `logicaffeine_compile::optimize::fold` does: one function per node
//! shape, each recursing into its children first and then checking
//! whether the now-folded children are literal enough to collapse the
//! parent into a single `Literal` node.

use feral_syntax::ast::{AstArena, BinOp, Expr, ExprNode, Literal, UnOp};

/// Folds one expression tree, returning a (possibly identical, possibly
/// freshly-allocated) node. Never mutates in place — the AST arena only
/// grows, matching the teacher's clone-and-rebuild style.
pub fn fold_expr<'a>(ast: &AstArena<'a>, expr: &'a ExprNode<'a>) -> &'a ExprNode<'a> {
    match &expr.kind {
        Expr::Literal(_) | Expr::Ident(_) => expr,

        Expr::Unary { op, operand } => {
            let operand = fold_expr(ast, operand);
            if let Expr::Literal(lit) = &operand.kind {
                if let Some(folded) = fold_unary(*op, lit) {
                    return ast.expr(Expr::Literal(folded), expr.loc);
                }
            }
            ast.expr(Expr::Unary { op: *op, operand }, expr.loc)
        }

        Expr::Binary { op, lhs, rhs } => {
            let lhs = fold_expr(ast, lhs);
            let rhs = fold_expr(ast, rhs);
            if let (Expr::Literal(l), Expr::Literal(r)) = (&lhs.kind, &rhs.kind) {
                if let Some(folded) = fold_binary(*op, l, r) {
                    return ast.expr(Expr::Literal(folded), expr.loc);
                }
            }
            ast.expr(Expr::Binary { op: *op, lhs, rhs }, expr.loc)
        }

        Expr::Ternary { cond, then, else_ } => {
            let cond = fold_expr(ast, cond);
            let then = fold_expr(ast, then);
            let else_ = fold_expr(ast, else_);
            if let Expr::Literal(lit) = &cond.kind {
                return if literal_truthy(lit) { then } else { else_ };
            }
            ast.expr(Expr::Ternary { cond, then, else_ }, expr.loc)
        }

        Expr::Paren(inner) => fold_expr(ast, inner),

        Expr::Assign { target, value } => {
            let target = fold_expr(ast, target);
            let value = fold_expr(ast, value);
            ast.expr(Expr::Assign { target, value }, expr.loc)
        }

        Expr::IncDec { op, pos, target } => {
            let target = fold_expr(ast, target);
            ast.expr(Expr::IncDec { op: *op, pos: *pos, target }, expr.loc)
        }

        Expr::Spread(inner) => {
            let inner = fold_expr(ast, inner);
            ast.expr(Expr::Spread(inner), expr.loc)
        }

        Expr::Index { recv, index } => {
            let recv = fold_expr(ast, recv);
            let index = fold_expr(ast, index);
            ast.expr(Expr::Index { recv, index }, expr.loc)
        }

        Expr::Attr { recv, attr } => {
            let recv = fold_expr(ast, recv);
            ast.expr(Expr::Attr { recv, attr: *attr }, expr.loc)
        }

        Expr::Call { callee, args } => {
            let callee = fold_expr(ast, callee);
            let args = fold_args(ast, args);
            ast.expr(Expr::Call { callee, args }, expr.loc)
        }

        Expr::MethodCall { recv, method, args } => {
            let recv = fold_expr(ast, recv);
            let args = fold_args(ast, args);
            ast.expr(Expr::MethodCall { recv, method: *method, args }, expr.loc)
        }

        Expr::VecLit(items) => {
            let folded: Vec<_> = items.iter().map(|e| fold_expr(ast, e)).collect();
            let folded = ast.expr_slice(folded);
            ast.expr(Expr::VecLit(folded), expr.loc)
        }

        Expr::MapLit(pairs) => {
            let folded: Vec<_> = pairs.iter().map(|(k, v)| (fold_expr(ast, k), fold_expr(ast, v))).collect();
            let folded = ast.expr_pair_slice(folded);
            ast.expr(Expr::MapLit(folded), expr.loc)
        }

        Expr::StructLit { ty, fields } => {
            let ty = fold_expr(ast, ty);
            let fields: Vec<_> = fields
                .iter()
                .map(|f| feral_syntax::ast::StructField { name: f.name, value: fold_expr(ast, f.value) })
                .collect();
            let fields = ast.struct_field_slice(fields);
            ast.expr(Expr::StructLit { ty, fields }, expr.loc)
        }

        // Function bodies are folded by the statement-level pass
        // (`crate::simplify_block`) once it descends into `FnDef`/`FnLit`
        // bodies; nothing to do to the signature node itself here.
        Expr::FnLit(_) => expr,

        Expr::OrHandler { expr: inner, capture, handler: _ } => {
            let inner = fold_expr(ast, inner);
            // The handler block's statements are folded by the
            // statement-level pass, not here; rebuild the wrapper with the
            // folded guarded expression only.
            ast.expr(Expr::OrHandler { expr: inner, capture: *capture, handler: extract_handler(expr) }, expr.loc)
        }
    }
}

fn extract_handler<'a>(expr: &'a ExprNode<'a>) -> &'a feral_syntax::ast::Block<'a> {
    match &expr.kind {
        Expr::OrHandler { handler, .. } => handler,
        _ => unreachable!("extract_handler called on non-OrHandler node"),
    }
}

fn fold_args<'a>(ast: &AstArena<'a>, args: &'a [feral_syntax::ast::Arg<'a>]) -> &'a [feral_syntax::ast::Arg<'a>] {
    use feral_syntax::ast::Arg;
    let folded: Vec<_> = args
        .iter()
        .map(|a| match a {
            Arg::Positional(e) => Arg::Positional(fold_expr(ast, e)),
            Arg::Named(name, e) => Arg::Named(*name, fold_expr(ast, e)),
            Arg::Unpack(e) => Arg::Unpack(fold_expr(ast, e)),
        })
        .collect();
    ast.arg_slice(folded)
}

fn literal_truthy(lit: &Literal) -> bool {
    match lit {
        Literal::Nil => false,
        Literal::Bool(b) => *b,
        Literal::Int(n) => *n != 0,
        Literal::Flt(f) => *f != 0.0,
        Literal::Str(s) => !s.is_empty(),
    }
}

fn fold_unary(op: UnOp, lit: &Literal) -> Option<Literal> {
    match (op, lit) {
        (UnOp::Neg, Literal::Int(n)) => Some(Literal::Int(-n)),
        (UnOp::Neg, Literal::Flt(f)) => Some(Literal::Flt(-f)),
        (UnOp::Plus, Literal::Int(n)) => Some(Literal::Int(*n)),
        (UnOp::Plus, Literal::Flt(f)) => Some(Literal::Flt(*f)),
        (UnOp::Not, other) => Some(Literal::Bool(!literal_truthy(other))),
        (UnOp::BitNot, Literal::Int(n)) => Some(Literal::Int(!n)),
        // Deref/AddrOf are value no-ops (see `feral_syntax::ast::UnOp`); a
        // literal is already its own value, so folding would be a no-op —
        // leave the Unary node in place rather than special-casing it.
        _ => None,
    }
}

/// Matches the VM's arithmetic/comparison semantics exactly (`spec.md`
/// §4.3: "Semantics must match the VM"). Returns `None` when the pair
/// isn't foldable (type mismatch codegen must still emit a run-time
/// failure for, or division by a literal zero, which must remain a
/// run-time failure per `spec.md` §4.3 so its location is preserved).
fn fold_binary(op: BinOp, l: &Literal, r: &Literal) -> Option<Literal> {
    use BinOp::*;
    use Literal::*;

    match (op, l, r) {
        // --- string + string is concatenation; the only `+` overload
        // beyond arithmetic. ---
        (Add, Str(a), Str(b)) => Some(Str(format!("{a}{b}"))),

        // string * int / int * string: repeat. Negative counts are
        // defined to produce the empty string (`DESIGN.md` Open Question
        // decision matching spec.md §9).
        (Mul, Str(s), Int(n)) | (Mul, Int(n), Str(s)) => {
            Some(Str(if *n <= 0 { String::new() } else { s.repeat(*n as usize) }))
        }

        // --- int/int arithmetic ---
        (Add, Int(a), Int(b)) => Some(Int(a.wrapping_add(*b))),
        (Sub, Int(a), Int(b)) => Some(Int(a.wrapping_sub(*b))),
        (Mul, Int(a), Int(b)) => Some(Int(a.wrapping_mul(*b))),
        (Div, Int(_), Int(0)) => None, // division by literal zero stays unfolded
        (Div, Int(a), Int(b)) => Some(Int(a / b)),
        (Mod, Int(_), Int(0)) => None,
        (Mod, Int(a), Int(b)) => Some(Int(a % b)),
        (Pow, Int(a), Int(b)) if *b >= 0 => Some(Int(a.pow(*b as u32))),
        (FloorDiv, Int(_), Int(0)) => None,
        // Truncate then adjust toward negative infinity when the signs
        // differ and the truncated division wasn't exact — matches
        // `feral_vm::builtins::op_floordiv` exactly (not `div_euclid`,
        // which disagrees with it whenever the divisor is negative: e.g.
        // `7.div_euclid(-2) == -3` but the VM's truncate-then-adjust
        // formula gives `-4`).
        (FloorDiv, Int(a), Int(b)) => {
            let q = a.wrapping_div(*b);
            Some(Int(if (a % b != 0) && ((*a < 0) != (*b < 0)) { q - 1 } else { q }))
        }

        // --- float-promoting mixes: any Int/Flt combination involving a
        // Flt promotes both sides to f64. ---
        (Add | Sub | Mul | Div | Mod | Pow | FloorDiv, _, _) if is_numeric(l) && is_numeric(r) => {
            let (a, b) = (as_f64(l)?, as_f64(r)?);
            match op {
                Add => Some(Flt(a + b)),
                Sub => Some(Flt(a - b)),
                Mul => Some(Flt(a * b)),
                Div if b == 0.0 => None,
                Div => Some(Flt(a / b)),
                Mod if b == 0.0 => None,
                Mod => Some(Flt(a % b)),
                Pow => Some(Flt(a.powf(b))),
                FloorDiv if b == 0.0 => None,
                FloorDiv => Some(Flt((a / b).floor())),
                _ => unreachable!(),
            }
        }

        // --- bitwise/shift: ints only ---
        (Shl, Int(a), Int(b)) => Some(Int(a.wrapping_shl(*b as u32))),
        (Shr, Int(a), Int(b)) => Some(Int(a.wrapping_shr(*b as u32))),
        (BitAnd, Int(a), Int(b)) => Some(Int(a & b)),
        (BitOr, Int(a), Int(b)) => Some(Int(a | b)),
        (BitXor, Int(a), Int(b)) => Some(Int(a ^ b)),

        // --- comparisons ---
        (Lt | Le | Gt | Ge | Eq | Ne, _, _) if is_numeric(l) && is_numeric(r) => {
            let (a, b) = (as_f64(l)?, as_f64(r)?);
            Some(Bool(match op {
                Lt => a < b,
                Le => a <= b,
                Gt => a > b,
                Ge => a >= b,
                Eq => a == b,
                Ne => a != b,
                _ => unreachable!(),
            }))
        }
        (Eq, Str(a), Str(b)) => Some(Bool(a == b)),
        (Ne, Str(a), Str(b)) => Some(Bool(a != b)),
        (Eq, Bool(a), Bool(b)) => Some(Bool(a == b)),
        (Ne, Bool(a), Bool(b)) => Some(Bool(a != b)),
        (Eq, Nil, Nil) => Some(Bool(true)),
        (Ne, Nil, Nil) => Some(Bool(false)),

        // --- logical, with shortcut over literal truthiness. The
        // `int && true` -> `int-is-nonzero` pair spec.md §4.3 names
        // explicitly falls out of always folding via `literal_truthy`. ---
        (LogAnd, a, b) => Some(Bool(literal_truthy(a) && literal_truthy(b))),
        (LogOr, a, b) => Some(Bool(literal_truthy(a) || literal_truthy(b))),

        _ => None,
    }
}

fn is_numeric(lit: &Literal) -> bool {
    matches!(lit, Literal::Int(_) | Literal::Flt(_))
}

fn as_f64(lit: &Literal) -> Option<f64> {
    match lit {
        Literal::Int(n) => Some(*n as f64),
        Literal::Flt(f) => Some(*f),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feral_base::{Location, SourceId};
    use feral_syntax::ast::Arenas;

    fn loc() -> Location {
        Location::new(SourceId::from_raw(0), 0, 1)
    }

    #[test]
    fn folds_int_arithmetic_with_precedence_already_resolved_by_parser() {
        let arenas = Arenas::new();
        let ast = arenas.ctx();
        let two = ast.expr(Expr::Literal(Literal::Int(2)), loc());
        let three = ast.expr(Expr::Literal(Literal::Int(3)), loc());
        let mul = ast.expr(Expr::Binary { op: BinOp::Mul, lhs: two, rhs: three }, loc());
        let one = ast.expr(Expr::Literal(Literal::Int(1)), loc());
        let add = ast.expr(Expr::Binary { op: BinOp::Add, lhs: one, rhs: mul }, loc());
        let folded = fold_expr(&ast, add);
        assert!(matches!(folded.kind, Expr::Literal(Literal::Int(7))));
    }

    #[test]
    fn does_not_fold_division_by_literal_zero() {
        let arenas = Arenas::new();
        let ast = arenas.ctx();
        let one = ast.expr(Expr::Literal(Literal::Int(1)), loc());
        let zero = ast.expr(Expr::Literal(Literal::Int(0)), loc());
        let div = ast.expr(Expr::Binary { op: BinOp::Div, lhs: one, rhs: zero }, loc());
        let folded = fold_expr(&ast, div);
        assert!(matches!(folded.kind, Expr::Binary { op: BinOp::Div, .. }));
    }

    #[test]
    fn folds_string_repeat() {
        let arenas = Arenas::new();
        let ast = arenas.ctx();
        let s = ast.expr(Expr::Literal(Literal::Str("ab".to_string())), loc());
        let n = ast.expr(Expr::Literal(Literal::Int(3)), loc());
        let mul = ast.expr(Expr::Binary { op: BinOp::Mul, lhs: s, rhs: n }, loc());
        let folded = fold_expr(&ast, mul);
        assert!(matches!(&folded.kind, Expr::Literal(Literal::Str(s)) if s == "ababab"));
    }

    #[test]
    fn floor_div_with_negative_divisor_matches_the_vm_not_div_euclid() {
        // 7 // -2: truncated quotient is -3 with a nonzero remainder and
        // differing signs, so the VM's op_floordiv adjusts to -4.
        // `7i64.div_euclid(-2) == -3` would disagree; folding must not use it.
        let arenas = Arenas::new();
        let ast = arenas.ctx();
        let seven = ast.expr(Expr::Literal(Literal::Int(7)), loc());
        let neg_two = ast.expr(Expr::Literal(Literal::Int(-2)), loc());
        let div = ast.expr(Expr::Binary { op: BinOp::FloorDiv, lhs: seven, rhs: neg_two }, loc());
        let folded = fold_expr(&ast, div);
        assert!(matches!(folded.kind, Expr::Literal(Literal::Int(-4))));
    }

    #[test]
    fn negative_string_repeat_folds_to_empty() {
        let arenas = Arenas::new();
        let ast = arenas.ctx();
        let s = ast.expr(Expr::Literal(Literal::Str("ab".to_string())), loc());
        let n = ast.expr(Expr::Literal(Literal::Int(-2)), loc());
        let mul = ast.expr(Expr::Binary { op: BinOp::Mul, lhs: s, rhs: n }, loc());
        let folded = fold_expr(&ast, mul);
        assert!(matches!(&folded.kind, Expr::Literal(Literal::Str(s)) if s.is_empty()));
    }

    #[test]
    fn int_and_true_folds_to_nonzero_check() {
        let arenas = Arenas::new();
        let ast = arenas.ctx();
        let n = ast.expr(Expr::Literal(Literal::Int(5)), loc());
        let t = ast.expr(Expr::Literal(Literal::Bool(true)), loc());
        let and = ast.expr(Expr::Binary { op: BinOp::LogAnd, lhs: n, rhs: t }, loc());
        let folded = fold_expr(&ast, and);
        assert!(matches!(folded.kind, Expr::Literal(Literal::Bool(true))));
    }
}
