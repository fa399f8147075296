//! Recursive-descent parser: token stream → AST (`spec.md` §4.2).
//!
//! Single pass, single look-ahead token. On any syntax error the parser
//! reports at the offending token's location and aborts the whole module
//! compile — there is no error recovery or multi-error reporting.

mod expr;
mod stmt;

use feral_base::{Interner, Location};

use crate::ast::{AstArena, Block};
use crate::error::{Result, SyntaxError};
use crate::token::{Token, TokenKind};

pub struct Parser<'a, 't, 'i> {
    tokens: &'t [Token],
    pos: usize,
    ast: AstArena<'a>,
    interner: &'i mut Interner,
}

impl<'a, 't, 'i> Parser<'a, 't, 'i> {
    pub fn new(tokens: &'t [Token], ast: AstArena<'a>, interner: &'i mut Interner) -> Self {
        Self { tokens, pos: 0, ast, interner }
    }

    /// Parses a whole source file: a sequence of statements up to EOF.
    pub fn parse_module(mut self) -> Result<&'a Block<'a>> {
        let start = self.loc();
        let stmts = self.stmt_list_until(&TokenKind::Eof)?;
        let end = self.loc();
        Ok(self.ast.block(stmts, start.merge(end)))
    }

    fn cur(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.cur().kind
    }

    fn loc(&self) -> Location {
        self.cur().loc
    }

    /// The location of the most recently consumed token. Only valid to call
    /// after at least one `advance`/`eat`/`expect`.
    fn prev_loc(&self) -> Location {
        self.tokens[self.pos.saturating_sub(1)].loc
    }

    fn is_eof(&self) -> bool {
        matches!(self.cur().kind, TokenKind::Eof)
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.peek_kind()) == std::mem::discriminant(kind)
    }

    fn advance(&mut self) -> Token {
        let tok = self.cur().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(SyntaxError::new(
                format!("expected {} but found {}", kind.describe(), self.peek_kind().describe()),
                self.loc(),
            ))
        }
    }

    fn expect_ident(&mut self) -> Result<(feral_base::Symbol, Location)> {
        let loc = self.loc();
        match self.peek_kind().clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Ok((self.intern(&name), loc))
            }
            other => Err(SyntaxError::new(
                format!("expected identifier but found {}", other.describe()),
                loc,
            )),
        }
    }

    fn intern(&mut self, s: &str) -> feral_base::Symbol {
        self.interner.intern(s)
    }
}

#[cfg(test)]
mod tests {
    use feral_base::{Interner, SourceRegistry};

    use crate::ast::{Arenas, Arg, BinOp, Expr, Literal, Stmt};
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    /// Lexes and parses `src` as a whole module, panicking on any compile
    /// error — every test here exercises a grammar the parser must accept.
    macro_rules! parse_ok {
        ($arenas:ident, $src:expr) => {{
            let mut interner = Interner::new();
            let mut sources = SourceRegistry::new();
            let id = sources.load_str("test.feral", $src);
            let tokens = Lexer::new($src, id, "/tmp", "/tmp/test.feral").tokenize().unwrap();
            let ast = $arenas.ctx();
            Parser::new(&tokens, ast, &mut interner).parse_module().unwrap()
        }};
    }

    #[test]
    fn precedence_climbing_puts_multiplication_under_addition() {
        let arenas = Arenas::new();
        let block = parse_ok!(arenas, "1 + 2 * 3;");
        let Stmt::Expr(e) = block.stmts[0] else { panic!("expected an expression statement") };
        let Expr::Binary { op: BinOp::Add, lhs, rhs } = &e.kind else { panic!("expected a top-level +") };
        assert!(matches!(lhs.kind, Expr::Literal(Literal::Int(1))));
        assert!(matches!(rhs.kind, Expr::Binary { op: BinOp::Mul, .. }));
    }

    #[test]
    fn relational_binds_looser_than_additive() {
        let arenas = Arenas::new();
        let block = parse_ok!(arenas, "1 + 2 < 3;");
        let Stmt::Expr(e) = block.stmts[0] else { panic!("expected an expression statement") };
        let Expr::Binary { op: BinOp::Lt, lhs, rhs } = &e.kind else { panic!("expected a top-level <") };
        assert!(matches!(lhs.kind, Expr::Binary { op: BinOp::Add, .. }));
        assert!(matches!(rhs.kind, Expr::Literal(Literal::Int(3))));
    }

    #[test]
    fn assignment_is_right_associative() {
        let arenas = Arenas::new();
        let block = parse_ok!(arenas, "a = b = 1;");
        let Stmt::Expr(e) = block.stmts[0] else { panic!("expected an expression statement") };
        let Expr::Assign { value, .. } = &e.kind else { panic!("expected a top-level assignment") };
        assert!(matches!(value.kind, Expr::Assign { .. }), "rhs of `a = b = 1` should itself be an assignment");
    }

    /// `spec.md` §4.2's precedence table puts ternary (level 16) *looser*
    /// than `=` (level 15) — so `x = 1 ? 2 : 3` parses as `(x = 1) ? 2 : 3`,
    /// not `x = (1 ? 2 : 3)`. Surprising, but exactly what the table says,
    /// and what `ternary()` wrapping `assign_or_or()` implements.
    #[test]
    fn ternary_is_looser_than_assignment() {
        let arenas = Arenas::new();
        let block = parse_ok!(arenas, "x = 1 ? 2 : 3;");
        let Stmt::Expr(e) = block.stmts[0] else { panic!("expected an expression statement") };
        let Expr::Ternary { cond, .. } = &e.kind else { panic!("expected a top-level ternary") };
        assert!(matches!(cond.kind, Expr::Assign { .. }), "ternary's condition should be the assignment `x = 1`");
    }

    #[test]
    fn compound_assign_desugars_to_assign_of_binary() {
        let arenas = Arenas::new();
        let block = parse_ok!(arenas, "x += 1;");
        let Stmt::Expr(e) = block.stmts[0] else { panic!("expected an expression statement") };
        let Expr::Assign { target, value } = &e.kind else { panic!("expected a desugared assignment") };
        assert!(matches!(target.kind, Expr::Ident(_)));
        assert!(matches!(value.kind, Expr::Binary { op: BinOp::Add, .. }));
    }

    #[test]
    fn bitnot_compound_assign_lowers_to_assign_of_unary() {
        let arenas = Arenas::new();
        let block = parse_ok!(arenas, "x ~= y;");
        let Stmt::Expr(e) = block.stmts[0] else { panic!("expected an expression statement") };
        let Expr::Assign { value, .. } = &e.kind else { panic!("expected an assignment") };
        assert!(matches!(value.kind, Expr::Unary { op: crate::ast::UnOp::BitNot, .. }));
    }

    #[test]
    fn or_handler_captures_the_failure_value() {
        let arenas = Arenas::new();
        let block = parse_ok!(arenas, "let r = 1 / 0 or e { e };");
        let Stmt::VarDecl(decl) = block.stmts[0] else { panic!("expected a let") };
        let value = decl.vars[0].value.expect("let r = ... has a value");
        let Expr::OrHandler { expr, capture, handler } = &value.kind else { panic!("expected an or-handler") };
        assert!(matches!(expr.kind, Expr::Binary { op: BinOp::Div, .. }));
        assert!(capture.is_some());
        assert_eq!(handler.stmts.len(), 1);
    }

    #[test]
    fn defer_statement_keeps_its_expression_until_simplify_lowers_it() {
        let arenas = Arenas::new();
        let block = parse_ok!(arenas, "defer x;");
        assert!(matches!(block.stmts[0], Stmt::Defer(_, _)));
    }

    #[test]
    fn for_in_loop_parses_binding_and_iterable() {
        let arenas = Arenas::new();
        let block = parse_ok!(arenas, "for x in v { x; }");
        let Stmt::ForIn(f) = block.stmts[0] else { panic!("expected a for-in loop") };
        assert!(matches!(f.iterable.kind, Expr::Ident(_)));
        assert_eq!(f.body.stmts.len(), 1);
    }

    #[test]
    fn classic_for_loop_parses_init_cond_step() {
        let arenas = Arenas::new();
        let block = parse_ok!(arenas, "for let i = 0; i < 5; i += 1 { i; }");
        let Stmt::For(f) = block.stmts[0] else { panic!("expected a classic for loop") };
        assert!(f.init.is_some());
        assert!(matches!(f.cond.unwrap().kind, Expr::Binary { op: BinOp::Lt, .. }));
        assert!(matches!(f.step.unwrap().kind, Expr::Assign { .. }));
    }

    #[test]
    fn literal_suffix_lowers_to_a_call() {
        let arenas = Arenas::new();
        let block = parse_ok!(arenas, "10cm;");
        let Stmt::Expr(e) = block.stmts[0] else { panic!("expected an expression statement") };
        let Expr::Call { callee, args } = &e.kind else { panic!("expected a call from literal-suffix lowering") };
        assert!(matches!(callee.kind, Expr::Ident(_)));
        assert_eq!(args.len(), 1);
        assert!(matches!(args[0], Arg::Positional(_)));
    }

    #[test]
    fn call_args_distinguish_positional_keyword_and_unpack() {
        let arenas = Arenas::new();
        let block = parse_ok!(arenas, "f(1, y = 2, z...);");
        let Stmt::Expr(e) = block.stmts[0] else { panic!("expected an expression statement") };
        let Expr::Call { args, .. } = &e.kind else { panic!("expected a call") };
        assert_eq!(args.len(), 3);
        assert!(matches!(args[0], Arg::Positional(_)));
        assert!(matches!(args[1], Arg::Named(_, _)));
        assert!(matches!(args[2], Arg::Unpack(_)));
    }

    #[test]
    fn if_condition_does_not_parse_a_bare_identifier_as_a_struct_literal() {
        let arenas = Arenas::new();
        let block = parse_ok!(arenas, "if x { y; }");
        let Stmt::Cond(cond) = block.stmts[0] else { panic!("expected an if") };
        assert!(matches!(cond.arms[0].cond.unwrap().kind, Expr::Ident(_)));
    }

    #[test]
    fn struct_literal_parses_outside_a_condition_context() {
        let arenas = Arenas::new();
        let block = parse_ok!(arenas, "let s = T{a = 1};");
        let Stmt::VarDecl(decl) = block.stmts[0] else { panic!("expected a let") };
        let value = decl.vars[0].value.expect("let s = ... has a value");
        assert!(matches!(value.kind, Expr::StructLit { .. }));
    }

    #[test]
    fn multi_binding_let_is_comma_separated() {
        let arenas = Arenas::new();
        let block = parse_ok!(arenas, "let a = 1, b = 2;");
        let Stmt::VarDecl(decl) = block.stmts[0] else { panic!("expected a let") };
        assert_eq!(decl.vars.len(), 2);
    }

    #[test]
    fn default_and_variadic_function_parameters_parse() {
        let arenas = Arenas::new();
        let block = parse_ok!(arenas, "fn f(x, y = 1, ...rest) { return x; }");
        let Stmt::FnDef(sig) = block.stmts[0] else { panic!("expected a function definition") };
        assert_eq!(sig.params.vars.len(), 2);
        assert!(sig.params.vars[1].value.is_some());
        assert!(sig.params.variadic_name.is_some());
    }

    #[test]
    fn vec_and_map_literals_parse() {
        let arenas = Arenas::new();
        let block = parse_ok!(arenas, "let v = [1, 2, 3]; let m = {1: 2};");
        let Stmt::VarDecl(v) = block.stmts[0] else { panic!("expected a let") };
        assert!(matches!(v.vars[0].value.unwrap().kind, Expr::VecLit(items) if items.len() == 3));
        let Stmt::VarDecl(m) = block.stmts[1] else { panic!("expected a let") };
        assert!(matches!(m.vars[0].value.unwrap().kind, Expr::MapLit(items) if items.len() == 1));
    }

    #[test]
    fn unmatched_paren_reports_a_syntax_error_instead_of_panicking() {
        let arenas = Arenas::new();
        let mut interner = Interner::new();
        let mut sources = SourceRegistry::new();
        let src = "let x = (1 + 2;";
        let id = sources.load_str("test.feral", src);
        let tokens = Lexer::new(src, id, "/tmp", "/tmp/test.feral").tokenize().unwrap();
        let ast = arenas.ctx();
        let err = Parser::new(&tokens, ast, &mut interner).parse_module().unwrap_err();
        assert!(err.message.contains(')'));
    }
}
