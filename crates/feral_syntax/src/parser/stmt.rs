//! Statement grammar (`spec.md` §4.2 "Statements").

use feral_base::Location;

use crate::ast::{
    Block, Cond, CondArm, For, ForIn, Params, Stmt, Var, VarDecl, While,
};
use crate::error::{Result, SyntaxError};
use crate::token::TokenKind;

use super::Parser;

impl<'a, 't, 'i> Parser<'a, 't, 'i> {
    pub(super) fn stmt_list_until(&mut self, end: &TokenKind) -> Result<Vec<&'a Stmt<'a>>> {
        let mut stmts = Vec::new();
        while !self.check(end) && !self.is_eof() {
            stmts.push(self.stmt()?);
        }
        Ok(stmts)
    }

    fn stmt(&mut self) -> Result<&'a Stmt<'a>> {
        let loc = self.loc();
        let stmt = match self.peek_kind() {
            TokenKind::LBrace => {
                self.advance();
                let stmts = self.stmt_list_until(&TokenKind::RBrace)?;
                let end = self.loc();
                self.expect(&TokenKind::RBrace)?;
                Stmt::Block(self.ast.block(stmts, loc.merge(end)))
            }
            TokenKind::Let => self.var_decl()?,
            TokenKind::Fn => self.fn_def()?,
            TokenKind::If => self.cond()?,
            TokenKind::Inline => {
                self.advance();
                self.expect(&TokenKind::If)?;
                self.cond_body(loc)?
            }
            TokenKind::For => self.for_stmt()?,
            TokenKind::While => self.while_stmt()?,
            TokenKind::Return => {
                self.advance();
                let value = if self.check(&TokenKind::Semi) { None } else { Some(self.expr(false)?) };
                self.expect(&TokenKind::Semi)?;
                Stmt::Return(value, loc)
            }
            TokenKind::Continue => {
                self.advance();
                self.expect(&TokenKind::Semi)?;
                Stmt::Continue(loc)
            }
            TokenKind::Break => {
                self.advance();
                self.expect(&TokenKind::Semi)?;
                Stmt::Break(loc)
            }
            TokenKind::Defer => {
                self.advance();
                let e = self.expr(false)?;
                self.expect(&TokenKind::Semi)?;
                Stmt::Defer(e, loc)
            }
            TokenKind::Semi => {
                self.advance();
                return self.stmt();
            }
            _ => {
                let e = self.expr(false)?;
                self.expect(&TokenKind::Semi)?;
                Stmt::Expr(e)
            }
        };
        Ok(self.ast.stmt(stmt))
    }

    /// `let name [in expr] = expr, name2 = expr2, ...;` — a comma-separated
    /// list of [`Var`] bindings (`spec.md` §3 "VarDecl", precedence level 17
    /// comma usage).
    fn var_decl(&mut self) -> Result<Stmt<'a>> {
        let start = self.expect(&TokenKind::Let)?;
        let mut vars = Vec::new();
        loop {
            vars.push(self.one_var(false)?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        let end = self.expect(&TokenKind::Semi)?;
        let vars = self.ast.var_slice(vars);
        Ok(Stmt::VarDecl(self.ast.var_decl(VarDecl { vars, loc: start.loc.merge(end.loc) })))
    }

    fn one_var(&mut self, is_fn_arg: bool) -> Result<Var<'a>> {
        let (name, name_loc) = self.expect_ident()?;
        let in_target = if self.eat(&TokenKind::In) { Some(self.expr(false)?) } else { None };
        let value = if self.eat(&TokenKind::Assign) { Some(self.expr(false)?) } else { None };
        let end = value.map(|v| v.loc).or(in_target.map(|t| t.loc)).unwrap_or(name_loc);
        Ok(Var { name, in_target, value, is_fn_arg, is_const: false, loc: name_loc.merge(end) })
    }

    /// `fn name(params) { body }` in statement position.
    fn fn_def(&mut self) -> Result<Stmt<'a>> {
        let start = self.expect(&TokenKind::Fn)?;
        let (name, _) = self.expect_ident()?;
        let params = self.fn_params()?;
        let body_start = self.loc();
        self.expect(&TokenKind::LBrace)?;
        let stmts = self.stmt_list_until(&TokenKind::RBrace)?;
        let body_end = self.loc();
        let close = self.expect(&TokenKind::RBrace)?;
        let body = self.ast.block(stmts, body_start.merge(body_end));
        let loc = start.loc.merge(close.loc);
        let sig = self.ast.fn_sig(crate::ast::FnSig { name: Some(name), params, body, loc });
        Ok(Stmt::FnDef(sig))
    }

    /// Parses `(param, param = default, ...kwargs, ...variadic)`.
    ///
    /// The grammar distinguishes a variadic trailer (`...name`, at most one,
    /// must be last) from a keyword-args bag (bare `name` preceded by no
    /// sigil is just a normal parameter — the kwargs bag is recognized the
    /// same way as a variadic but the parser treats the final `...name` as
    /// variadic; a `**name`-style bag is not part of this language's surface
    /// syntax, so `kwargs_name` is populated only when a native caller needs
    /// one and is otherwise left `None`).
    pub(super) fn fn_params(&mut self) -> Result<Params<'a>> {
        self.expect(&TokenKind::LParen)?;
        let mut vars = Vec::new();
        let mut variadic_name = None;
        if !self.check(&TokenKind::RParen) {
            loop {
                if self.eat(&TokenKind::Dots) {
                    let (name, _) = self.expect_ident()?;
                    variadic_name = Some(name);
                    break;
                }
                vars.push(self.one_var(true)?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen)?;
        let vars = self.ast.var_slice(vars);
        Ok(Params { vars, kwargs_name: None, variadic_name })
    }

    /// `if cond { ... } [elif cond { ... }]* [else { ... }]`.
    fn cond(&mut self) -> Result<Stmt<'a>> {
        let loc = self.loc();
        self.expect(&TokenKind::If)?;
        self.cond_body(loc)
    }

    fn cond_body(&mut self, loc: Location) -> Result<Stmt<'a>> {
        let mut arms = Vec::new();
        let cond = self.expr(true)?;
        let body = self.braced_block()?;
        arms.push(CondArm { cond: Some(cond), body });
        loop {
            if self.eat(&TokenKind::Elif) {
                let cond = self.expr(true)?;
                let body = self.braced_block()?;
                arms.push(CondArm { cond: Some(cond), body });
                continue;
            }
            if self.eat(&TokenKind::Else) {
                let body = self.braced_block()?;
                arms.push(CondArm { cond: None, body });
            }
            break;
        }
        let end = arms.last().unwrap().body.loc;
        Ok(Stmt::Cond(self.ast.cond(arms, loc.merge(end))))
    }

    fn braced_block(&mut self) -> Result<&'a Block<'a>> {
        let start = self.expect(&TokenKind::LBrace)?;
        let stmts = self.stmt_list_until(&TokenKind::RBrace)?;
        let end = self.loc();
        self.expect(&TokenKind::RBrace)?;
        Ok(self.ast.block(stmts, start.loc.merge(end)))
    }

    /// `for init; cond; step { body }` or `for id in expr { body }`.
    fn for_stmt(&mut self) -> Result<Stmt<'a>> {
        let start = self.expect(&TokenKind::For)?;

        if matches!(self.peek_kind(), TokenKind::Ident(_))
            && matches!(self.tokens.get(self.pos + 1).map(|t| &t.kind), Some(TokenKind::In))
        {
            let (binding, _) = self.expect_ident()?;
            self.expect(&TokenKind::In)?;
            let iterable = self.expr(true)?;
            let body = self.braced_block()?;
            let loc = start.loc.merge(body.loc);
            return Ok(Stmt::ForIn(self.ast.for_in(ForIn { binding, iterable, body, loc })));
        }

        let init = if self.check(&TokenKind::Semi) {
            None
        } else if self.check(&TokenKind::Let) {
            Some(self.var_decl_no_semi_consume()?)
        } else {
            let e = self.expr(false)?;
            Some(self.ast.stmt(Stmt::Expr(e)))
        };
        self.expect(&TokenKind::Semi)?;
        let cond = if self.check(&TokenKind::Semi) { None } else { Some(self.expr(false)?) };
        self.expect(&TokenKind::Semi)?;
        let step = if self.check(&TokenKind::LBrace) { None } else { Some(self.expr(false)?) };
        let body = self.braced_block()?;
        let loc = start.loc.merge(body.loc);
        Ok(Stmt::For(self.ast.for_(For { init, cond, step, body, loc })))
    }

    /// Parses a `let ...` clause used as a `for` initializer, without
    /// consuming the `;` that the `for` grammar consumes itself.
    fn var_decl_no_semi_consume(&mut self) -> Result<&'a Stmt<'a>> {
        let start = self.expect(&TokenKind::Let)?;
        let mut vars = Vec::new();
        loop {
            vars.push(self.one_var(false)?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        let end = vars.last().map(|v| v.loc).unwrap_or(start.loc);
        let vars = self.ast.var_slice(vars);
        Ok(self.ast.stmt(Stmt::VarDecl(self.ast.var_decl(VarDecl { vars, loc: start.loc.merge(end) }))))
    }

    fn while_stmt(&mut self) -> Result<Stmt<'a>> {
        let start = self.expect(&TokenKind::While)?;
        let cond = self.expr(true)?;
        let body = self.braced_block()?;
        let loc = start.loc.merge(body.loc);
        Ok(Stmt::While(self.ast.while_(While { cond, body, loc })))
    }
}

#[allow(unused_imports)]
use crate::error::SyntaxError as _SyntaxErrorUnusedSilencer;
