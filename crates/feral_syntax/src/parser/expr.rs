//! Expression grammar: the 17-level precedence table (`spec.md` §4.2).

use feral_base::{Location, Symbol};

use crate::ast::{Arg, BinOp, Expr, ExprNode, IncDecOp, IncDecPos, Literal, StructField, UnOp};
use crate::error::{Result, SyntaxError};
use crate::token::TokenKind;

use super::Parser;

impl<'a, 't, 'i> Parser<'a, 't, 'i> {
    /// Entry point for "an expression" wherever the grammar calls for one.
    /// Does not consume a top-level `,` — callers that accept comma lists
    /// (call arguments, `return`, multi-`let`) loop over this explicitly.
    pub(super) fn expr(&mut self, no_struct_lit: bool) -> Result<&'a ExprNode<'a>> {
        self.ternary(no_struct_lit)
    }

    fn ternary(&mut self, no_struct_lit: bool) -> Result<&'a ExprNode<'a>> {
        let cond = self.assign_or_or(no_struct_lit)?;
        if self.eat(&TokenKind::Question) {
            let then = self.expr(false)?;
            self.expect(&TokenKind::Colon)?;
            let else_ = self.ternary(no_struct_lit)?;
            let loc = cond.loc.merge(else_.loc);
            return Ok(self.ast.expr(Expr::Ternary { cond, then, else_ }, loc));
        }
        Ok(cond)
    }

    /// Levels 14 (compound assign, `or`) and 15 (`=`, right-assoc).
    fn assign_or_or(&mut self, no_struct_lit: bool) -> Result<&'a ExprNode<'a>> {
        let lhs = self.logor(no_struct_lit)?;

        if self.eat(&TokenKind::Assign) {
            let rhs = self.assign_or_or(no_struct_lit)?;
            let loc = lhs.loc.merge(rhs.loc);
            return Ok(self.ast.expr(Expr::Assign { target: lhs, value: rhs }, loc));
        }

        // `~=` has no binary counterpart — `~` is a unary bitwise-not, so
        // `x ~= y` lowers to `x = ~y` rather than `x = x OP y` the way every
        // other compound assignment does.
        if self.eat(&TokenKind::NotAssign) {
            let rhs = self.assign_or_or(no_struct_lit)?;
            let negated = self.ast.expr(Expr::Unary { op: UnOp::BitNot, operand: rhs }, rhs.loc);
            let loc = lhs.loc.merge(rhs.loc);
            return Ok(self.ast.expr(Expr::Assign { target: lhs, value: negated }, loc));
        }

        if let Some(op) = self.peek_kind().compound_assign_op() {
            let binop = token_to_binop(&op).expect("compound_assign_op maps to a binary operator");
            self.advance();
            let rhs = self.assign_or_or(no_struct_lit)?;
            let binary = self.ast.expr(Expr::Binary { op: binop, lhs, rhs }, lhs.loc.merge(rhs.loc));
            let loc = lhs.loc.merge(rhs.loc);
            return Ok(self.ast.expr(Expr::Assign { target: lhs, value: binary }, loc));
        }

        if self.eat(&TokenKind::Or) {
            let capture = if matches!(self.peek_kind(), TokenKind::Ident(_)) {
                let (name, _) = self.expect_ident()?;
                Some(name)
            } else {
                None
            };
            self.expect(&TokenKind::LBrace)?;
            let start = self.loc();
            let stmts = self.stmt_list_until(&TokenKind::RBrace)?;
            let end = self.loc();
            self.expect(&TokenKind::RBrace)?;
            let handler = self.ast.block(stmts, start.merge(end));
            let loc = lhs.loc.merge(handler.loc);
            return Ok(self.ast.expr(Expr::OrHandler { expr: lhs, capture, handler }, loc));
        }

        Ok(lhs)
    }

    fn logor(&mut self, no_struct_lit: bool) -> Result<&'a ExprNode<'a>> {
        self.left_assoc_binop(no_struct_lit, Self::logand, &[(TokenKind::PipePipe, BinOp::LogOr)])
    }

    fn logand(&mut self, no_struct_lit: bool) -> Result<&'a ExprNode<'a>> {
        self.left_assoc_binop(no_struct_lit, Self::bitor, &[(TokenKind::AmpAmp, BinOp::LogAnd)])
    }

    fn bitor(&mut self, no_struct_lit: bool) -> Result<&'a ExprNode<'a>> {
        self.left_assoc_binop(no_struct_lit, Self::bitxor, &[(TokenKind::Pipe, BinOp::BitOr)])
    }

    fn bitxor(&mut self, no_struct_lit: bool) -> Result<&'a ExprNode<'a>> {
        self.left_assoc_binop(no_struct_lit, Self::bitand, &[(TokenKind::Caret, BinOp::BitXor)])
    }

    fn bitand(&mut self, no_struct_lit: bool) -> Result<&'a ExprNode<'a>> {
        self.left_assoc_binop(no_struct_lit, Self::equality, &[(TokenKind::Amp, BinOp::BitAnd)])
    }

    fn equality(&mut self, no_struct_lit: bool) -> Result<&'a ExprNode<'a>> {
        self.left_assoc_binop(
            no_struct_lit,
            Self::relational,
            &[(TokenKind::EqEq, BinOp::Eq), (TokenKind::Ne, BinOp::Ne)],
        )
    }

    fn relational(&mut self, no_struct_lit: bool) -> Result<&'a ExprNode<'a>> {
        self.left_assoc_binop(
            no_struct_lit,
            Self::shift,
            &[
                (TokenKind::Lt, BinOp::Lt),
                (TokenKind::Le, BinOp::Le),
                (TokenKind::Gt, BinOp::Gt),
                (TokenKind::Ge, BinOp::Ge),
            ],
        )
    }

    fn shift(&mut self, no_struct_lit: bool) -> Result<&'a ExprNode<'a>> {
        self.left_assoc_binop(
            no_struct_lit,
            Self::additive,
            &[(TokenKind::Shl, BinOp::Shl), (TokenKind::Shr, BinOp::Shr)],
        )
    }

    fn additive(&mut self, no_struct_lit: bool) -> Result<&'a ExprNode<'a>> {
        self.left_assoc_binop(
            no_struct_lit,
            Self::multiplicative,
            &[(TokenKind::Plus, BinOp::Add), (TokenKind::Minus, BinOp::Sub)],
        )
    }

    fn multiplicative(&mut self, no_struct_lit: bool) -> Result<&'a ExprNode<'a>> {
        self.left_assoc_binop(
            no_struct_lit,
            Self::prefix,
            &[
                (TokenKind::Star, BinOp::Mul),
                (TokenKind::Slash, BinOp::Div),
                (TokenKind::Percent, BinOp::Mod),
                (TokenKind::Pow, BinOp::Pow),
                (TokenKind::FloorDiv, BinOp::FloorDiv),
            ],
        )
    }

    /// Shared left-associative binary-operator loop: parses one `next` level
    /// operand, then repeatedly consumes any operator in `ops` at the same
    /// tier, folding left.
    fn left_assoc_binop(
        &mut self,
        no_struct_lit: bool,
        next: fn(&mut Self, bool) -> Result<&'a ExprNode<'a>>,
        ops: &[(TokenKind, BinOp)],
    ) -> Result<&'a ExprNode<'a>> {
        let mut lhs = next(self, no_struct_lit)?;
        'outer: loop {
            for (tok, op) in ops {
                if self.check(tok) {
                    self.advance();
                    let rhs = next(self, no_struct_lit)?;
                    let loc = lhs.loc.merge(rhs.loc);
                    lhs = self.ast.expr(Expr::Binary { op: *op, lhs, rhs }, loc);
                    continue 'outer;
                }
            }
            break;
        }
        Ok(lhs)
    }

    /// Level 3: prefix `++ -- + - * & ! ~`, right-associative.
    fn prefix(&mut self, no_struct_lit: bool) -> Result<&'a ExprNode<'a>> {
        let start = self.loc();
        if self.eat(&TokenKind::PlusPlus) {
            let operand = self.prefix(no_struct_lit)?;
            let loc = start.merge(operand.loc);
            return Ok(self.ast.expr(Expr::IncDec { op: IncDecOp::Inc, pos: IncDecPos::Pre, target: operand }, loc));
        }
        if self.eat(&TokenKind::MinusMinus) {
            let operand = self.prefix(no_struct_lit)?;
            let loc = start.merge(operand.loc);
            return Ok(self.ast.expr(Expr::IncDec { op: IncDecOp::Dec, pos: IncDecPos::Pre, target: operand }, loc));
        }
        let unop = match self.peek_kind() {
            TokenKind::Plus => Some(UnOp::Plus),
            TokenKind::Minus => Some(UnOp::Neg),
            TokenKind::Bang => Some(UnOp::Not),
            TokenKind::Tilde => Some(UnOp::BitNot),
            TokenKind::Star => Some(UnOp::Deref),
            TokenKind::Amp => Some(UnOp::AddrOf),
            _ => None,
        };
        if let Some(op) = unop {
            self.advance();
            let operand = self.prefix(no_struct_lit)?;
            let loc = start.merge(operand.loc);
            return Ok(self.ast.expr(Expr::Unary { op, operand }, loc));
        }
        self.postfix(no_struct_lit)
    }

    /// Level 2: postfix `++ --` and `...` (variadic-unpack marker).
    fn postfix(&mut self, no_struct_lit: bool) -> Result<&'a ExprNode<'a>> {
        let mut e = self.primary_chain(no_struct_lit)?;
        loop {
            let start = e.loc;
            if self.eat(&TokenKind::PlusPlus) {
                let loc = start.merge(self.prev_loc());
                e = self.ast.expr(Expr::IncDec { op: IncDecOp::Inc, pos: IncDecPos::Post, target: e }, loc);
                continue;
            }
            if self.eat(&TokenKind::MinusMinus) {
                let loc = start.merge(self.prev_loc());
                e = self.ast.expr(Expr::IncDec { op: IncDecOp::Dec, pos: IncDecPos::Post, target: e }, loc);
                continue;
            }
            if self.eat(&TokenKind::Dots) {
                let loc = start.merge(self.prev_loc());
                e = self.ast.expr(Expr::Spread(e), loc);
                continue;
            }
            break;
        }
        Ok(e)
    }

    /// Level 1: primary atom plus its immediate call/subscript/field/method
    /// postfix chain, and the literal-suffix lowering (`spec.md` §4.1):
    /// an identifier directly adjacent to a literal becomes `ident(literal)`.
    fn primary_chain(&mut self, no_struct_lit: bool) -> Result<&'a ExprNode<'a>> {
        let mut e = self.primary(no_struct_lit)?;
        loop {
            if self.check(&TokenKind::LParen) {
                let args = self.call_args()?;
                let end = self.prev_loc();
                e = self.ast.expr(Expr::Call { callee: e, args }, e.loc.merge(end));
                continue;
            }
            if self.check(&TokenKind::LBracket) {
                self.advance();
                let index = self.expr(false)?;
                let close = self.expect(&TokenKind::RBracket)?;
                e = self.ast.expr(Expr::Index { recv: e, index }, e.loc.merge(close.loc));
                continue;
            }
            if self.check(&TokenKind::Dot) {
                self.advance();
                let (name, name_loc) = self.expect_ident()?;
                if self.check(&TokenKind::LParen) {
                    let args = self.call_args()?;
                    let end = self.prev_loc();
                    e = self.ast.expr(Expr::MethodCall { recv: e, method: name, args }, e.loc.merge(end));
                } else {
                    e = self.ast.expr(Expr::Attr { recv: e, attr: name }, e.loc.merge(name_loc));
                }
                continue;
            }
            if !no_struct_lit && self.check(&TokenKind::LBrace) && matches!(e.kind, Expr::Ident(_)) {
                e = self.struct_lit(e)?;
                continue;
            }
            break;
        }
        Ok(e)
    }

    fn call_args(&mut self) -> Result<&'a [Arg<'a>]> {
        self.expect(&TokenKind::LParen)?;
        let mut args = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                args.push(self.one_arg()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
                if self.check(&TokenKind::RParen) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen)?;
        Ok(self.ast.arg_slice(args))
    }

    fn one_arg(&mut self) -> Result<Arg<'a>> {
        if let TokenKind::Ident(name) = self.peek_kind().clone() {
            if matches!(self.tokens.get(self.pos + 1).map(|t| &t.kind), Some(TokenKind::Assign)) {
                self.advance();
                self.advance();
                let sym = self.intern(&name);
                let value = self.expr(false)?;
                return Ok(Arg::Named(sym, value));
            }
        }
        let value = self.expr(false)?;
        if let Expr::Spread(inner) = value.kind {
            return Ok(Arg::Unpack(inner));
        }
        Ok(Arg::Positional(value))
    }

    fn struct_lit(&mut self, ty: &'a ExprNode<'a>) -> Result<&'a ExprNode<'a>> {
        self.expect(&TokenKind::LBrace)?;
        let mut fields = Vec::new();
        if !self.check(&TokenKind::RBrace) {
            loop {
                let (name, _) = self.expect_ident()?;
                self.expect(&TokenKind::Assign)?;
                let value = self.expr(false)?;
                fields.push(StructField { name, value });
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
                if self.check(&TokenKind::RBrace) {
                    break;
                }
            }
        }
        let close = self.expect(&TokenKind::RBrace)?;
        let fields = self.ast.struct_field_slice(fields);
        let loc = ty.loc.merge(close.loc);
        Ok(self.ast.expr(Expr::StructLit { ty, fields }, loc))
    }

    fn primary(&mut self, no_struct_lit: bool) -> Result<&'a ExprNode<'a>> {
        let loc = self.loc();
        match self.peek_kind().clone() {
            TokenKind::Int(v) => {
                self.advance();
                self.with_literal_suffix(Literal::Int(v), loc)
            }
            TokenKind::Flt(v) => {
                self.advance();
                self.with_literal_suffix(Literal::Flt(v), loc)
            }
            TokenKind::Str(s) => {
                self.advance();
                self.with_literal_suffix(Literal::Str(s), loc)
            }
            TokenKind::True => {
                self.advance();
                Ok(self.ast.expr(Expr::Literal(Literal::Bool(true)), loc))
            }
            TokenKind::False => {
                self.advance();
                Ok(self.ast.expr(Expr::Literal(Literal::Bool(false)), loc))
            }
            TokenKind::Nil => {
                self.advance();
                Ok(self.ast.expr(Expr::Literal(Literal::Nil), loc))
            }
            TokenKind::Ident(name) => {
                self.advance();
                let sym = self.intern(&name);
                self.with_ident_literal_suffix(sym, loc)
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.expr(false)?;
                let close = self.expect(&TokenKind::RParen)?;
                Ok(self.ast.expr(Expr::Paren(inner), loc.merge(close.loc)))
            }
            TokenKind::LBracket => self.vec_lit(),
            TokenKind::LBrace => self.map_lit(),
            TokenKind::Fn => self.fn_lit(),
            other => {
                let _ = no_struct_lit;
                Err(SyntaxError::new(format!("unexpected {} in expression", other.describe()), loc))
            }
        }
    }

    /// A literal immediately followed by an adjacent identifier with no
    /// intervening whitespace is lowered to `ident(literal)`.
    fn with_literal_suffix(&mut self, lit: Literal, loc: Location) -> Result<&'a ExprNode<'a>> {
        let lit_node = self.ast.expr(Expr::Literal(lit), loc);
        if let TokenKind::Ident(name) = self.peek_kind().clone() {
            let next_loc = self.loc();
            if next_loc.source == loc.source && next_loc.start == loc.end {
                self.advance();
                let sym = self.intern(&name);
                let callee_loc = next_loc;
                let callee = self.ast.expr(Expr::Ident(sym), callee_loc);
                let args = self.ast.arg_slice(vec![Arg::Positional(lit_node)]);
                return Ok(self.ast.expr(Expr::Call { callee, args }, loc.merge(callee_loc)));
            }
        }
        Ok(lit_node)
    }

    /// The mirror image: an identifier immediately followed by an adjacent
    /// literal is also lowered to `ident(literal)`.
    fn with_ident_literal_suffix(&mut self, sym: Symbol, loc: Location) -> Result<&'a ExprNode<'a>> {
        let ident_node = self.ast.expr(Expr::Ident(sym), loc);
        let adjacent_literal = match self.peek_kind().clone() {
            TokenKind::Int(v) => Some(Literal::Int(v)),
            TokenKind::Flt(v) => Some(Literal::Flt(v)),
            TokenKind::Str(s) => Some(Literal::Str(s)),
            _ => None,
        };
        if let Some(lit) = adjacent_literal {
            let next_loc = self.loc();
            if next_loc.source == loc.source && next_loc.start == loc.end {
                self.advance();
                let lit_node = self.ast.expr(Expr::Literal(lit), next_loc);
                let args = self.ast.arg_slice(vec![Arg::Positional(lit_node)]);
                return Ok(self.ast.expr(Expr::Call { callee: ident_node, args }, loc.merge(next_loc)));
            }
        }
        Ok(ident_node)
    }

    fn vec_lit(&mut self) -> Result<&'a ExprNode<'a>> {
        let start = self.expect(&TokenKind::LBracket)?;
        let mut items = Vec::new();
        if !self.check(&TokenKind::RBracket) {
            loop {
                items.push(self.expr(false)?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
                if self.check(&TokenKind::RBracket) {
                    break;
                }
            }
        }
        let close = self.expect(&TokenKind::RBracket)?;
        let items = self.ast.expr_slice(items);
        Ok(self.ast.expr(Expr::VecLit(items), start.loc.merge(close.loc)))
    }

    fn map_lit(&mut self) -> Result<&'a ExprNode<'a>> {
        let start = self.expect(&TokenKind::LBrace)?;
        let mut items = Vec::new();
        if !self.check(&TokenKind::RBrace) {
            loop {
                let key = self.expr(false)?;
                self.expect(&TokenKind::Colon)?;
                let value = self.expr(false)?;
                items.push((key, value));
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
                if self.check(&TokenKind::RBrace) {
                    break;
                }
            }
        }
        let close = self.expect(&TokenKind::RBrace)?;
        let items = self.ast.expr_pair_slice(items);
        Ok(self.ast.expr(Expr::MapLit(items), start.loc.merge(close.loc)))
    }

    /// Anonymous `fn(...) { ... }` function literal.
    fn fn_lit(&mut self) -> Result<&'a ExprNode<'a>> {
        let start = self.expect(&TokenKind::Fn)?;
        let params = self.fn_params()?;
        let body_start = self.loc();
        self.expect(&TokenKind::LBrace)?;
        let stmts = self.stmt_list_until(&TokenKind::RBrace)?;
        let body_end = self.loc();
        let close = self.expect(&TokenKind::RBrace)?;
        let body = self.ast.block(stmts, body_start.merge(body_end));
        let loc = start.loc.merge(close.loc);
        let sig = self.ast.fn_sig(crate::ast::FnSig { name: None, params, body, loc });
        Ok(self.ast.expr(Expr::FnLit(sig), loc))
    }
}

fn token_to_binop(kind: &TokenKind) -> Option<BinOp> {
    Some(match kind {
        TokenKind::Plus => BinOp::Add,
        TokenKind::Minus => BinOp::Sub,
        TokenKind::Star => BinOp::Mul,
        TokenKind::Slash => BinOp::Div,
        TokenKind::Percent => BinOp::Mod,
        TokenKind::Pow => BinOp::Pow,
        TokenKind::FloorDiv => BinOp::FloorDiv,
        TokenKind::Shl => BinOp::Shl,
        TokenKind::Shr => BinOp::Shr,
        TokenKind::Amp => BinOp::BitAnd,
        TokenKind::Pipe => BinOp::BitOr,
        TokenKind::Caret => BinOp::BitXor,
        TokenKind::AmpAmp => BinOp::LogAnd,
        TokenKind::PipePipe => BinOp::LogOr,
        _ => return None,
    })
}
