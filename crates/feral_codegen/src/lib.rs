//! AST → linear bytecode emission with back-patched jump targets
//! (`spec.md` §4.4).
//!
//! Walks a simplified module (constant-folded, `defer`-lowered AST) in
//! source order, emitting one flat `Vec<Instruction>`. Jumps are emitted
//! with a placeholder `Data::Int(0)` target and patched once the real
//! offset is known, the way `logicaffeine_compile::codegen::context`
//! tracks open scopes on a stack while walking — here the "scope stack"
//! is pending continue/break patch lists instead of refinement scopes.
//!
//! ## The missing arithmetic opcodes
//!
//! `spec.md` §6's opcode set has no `ADD`/`SUB`/etc. Any binary or unary
//! operator that constant folding (`feral_simplify::fold`) didn't already
//! collapse to a literal is therefore lowered to a `CALL` against a
//! synthetic native global the VM bootstraps into every module
//! (`feral_vm`'s operator table, named by [`op_fn_name`]) — the same
//! "native-callable uniformity" contract `spec.md` §9 already asks for,
//! rather than inventing opcodes the spec doesn't list. `recv[index]`
//! reads/writes and struct construction are lowered the same way, as
//! `MEM_CALL __getitem__`/`__setitem__` and a plain `CALL` on the
//! `StructDef` value respectively.
//!
//! ## The one-value-per-expression convention
//!
//! Every expression's codegen leaves exactly one `Value` on the VM's
//! operand stack, including assignment (`CREATE`/`CREATE_IN`/`STORE` all
//! push the stored value back after binding, by `feral_vm` convention).
//! This keeps `Stmt::Expr` codegen uniform (`emit expr; UNLOAD 1`) and
//! lets assignment appear anywhere an expression can, without a `DUP`
//! opcode the spec doesn't provide.

mod expr;
mod stmt;

use feral_base::{Interner, Location};
use feral_bytecode::instruction::{Data, Instruction};
use feral_bytecode::opcode::Opcode;
use feral_syntax::ast::Block;

/// The name of the synthetic native global a given operator lowers to a
/// `CALL` against. `feral_vm` registers one native function per name
/// listed here into every module's globals at startup.
pub fn op_fn_name(op: feral_syntax::ast::BinOp) -> &'static str {
    use feral_syntax::ast::BinOp::*;
    match op {
        Add => "__op_add",
        Sub => "__op_sub",
        Mul => "__op_mul",
        Div => "__op_div",
        Mod => "__op_mod",
        Pow => "__op_pow",
        FloorDiv => "__op_floordiv",
        Shl => "__op_shl",
        Shr => "__op_shr",
        BitAnd => "__op_bitand",
        BitOr => "__op_bitor",
        BitXor => "__op_bitxor",
        Lt => "__op_lt",
        Le => "__op_le",
        Gt => "__op_gt",
        Ge => "__op_ge",
        Eq => "__op_eq",
        Ne => "__op_ne",
        // LogAnd/LogOr never reach here — they're lowered to short-circuit
        // jumps directly in `expr::compile_expr`.
        LogAnd | LogOr => unreachable!("logical operators are short-circuit compiled, not CALLed"),
    }
}

pub fn unary_op_fn_name(op: feral_syntax::ast::UnOp) -> &'static str {
    use feral_syntax::ast::UnOp::*;
    match op {
        Neg => "__op_neg",
        Plus => "__op_uplus",
        Not => "__op_not",
        BitNot => "__op_bitnot",
        Deref | AddrOf => "__op_identity",
    }
}

pub const GETITEM: &str = "__getitem__";
pub const SETITEM: &str = "__setitem__";
pub const VEC_NEW: &str = "__vec_new";
pub const MAP_NEW: &str = "__map_new";

/// Tracks the pending `CONTINUE`/`BREAK` instruction indices inside one
/// loop, patched once that loop's `step`/end offsets are known.
struct LoopFrame {
    continue_patches: Vec<usize>,
    break_patches: Vec<usize>,
}

pub struct Codegen<'i> {
    code: Vec<Instruction>,
    interner: &'i mut Interner,
    loops: Vec<LoopFrame>,
}

impl<'i> Codegen<'i> {
    pub fn new(interner: &'i mut Interner) -> Self {
        Self { code: Vec::new(), interner, loops: Vec::new() }
    }

    /// Compiles a whole module's top-level block, returning its flat
    /// instruction stream.
    pub fn compile_module(mut self, block: &Block) -> Vec<Instruction> {
        stmt::compile_block(&mut self, block);
        log::debug!("emitted {} instructions", self.code.len());
        self.code
    }

    fn emit(&mut self, op: Opcode, loc: Location, data: Data) -> usize {
        self.code.push(Instruction::new(op, loc, data));
        self.code.len() - 1
    }

    fn here(&self) -> usize {
        self.code.len()
    }

    fn patch(&mut self, idx: usize, target: usize) {
        self.code[idx].data = Data::Int(target as i64);
    }

}

/// `MEM_CALL`'s payload packs both the method name and the per-arg
/// `argInfo` string the opcode table describes; `\u{1}` (not a valid
/// feral identifier byte) separates the two so `feral_vm` can split on
/// it unambiguously.
pub fn mem_call_payload(method_name: &str, arg_info: &str) -> String {
    format!("{method_name}\u{1}{arg_info}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use feral_base::{Interner as Itn, Location as Loc, SourceId, Symbol};
    use feral_bytecode::opcode::Opcode as Op;
    use feral_syntax::ast::{Arenas, Expr, Literal, Stmt};

    fn loc() -> Loc {
        Loc::new(SourceId::from_raw(0), 0, 1)
    }

    #[test]
    fn literal_expression_statement_emits_load_and_unload() {
        let arenas = Arenas::new();
        let ast = arenas.ctx();
        let lit = ast.expr(Expr::Literal(Literal::Int(7)), loc());
        let stmt = ast.stmt(Stmt::Expr(lit));
        let block = ast.block(vec![stmt], loc());

        let mut interner = Itn::new();
        let code = Codegen::new(&mut interner).compile_module(block);

        assert_eq!(code.len(), 2);
        assert_eq!(code[0].op, Op::LoadData);
        assert_eq!(code[1].op, Op::Unload);
    }

    #[test]
    fn while_loop_wraps_push_loop_pop_loop_with_patched_jump() {
        use feral_syntax::ast::While;

        let arenas = Arenas::new();
        let ast = arenas.ctx();
        let cond = ast.expr(Expr::Literal(Literal::Bool(true)), loc());
        let body_expr = ast.expr(Expr::Literal(Literal::Int(1)), loc());
        let body_stmt = ast.stmt(Stmt::Expr(body_expr));
        let body = ast.block(vec![body_stmt], loc());
        let w = ast.while_(While { cond, body, loc: loc() });
        let top = ast.stmt(Stmt::While(w));
        let block = ast.block(vec![top], loc());

        let mut interner = Itn::new();
        let code = Codegen::new(&mut interner).compile_module(block);

        assert_eq!(code.first().unwrap().op, Op::PushBlock);
        assert!(code.iter().any(|i| i.op == Op::PushLoop));
        assert!(code.iter().any(|i| i.op == Op::PopLoop));
        assert!(code.iter().any(|i| i.op == Op::JmpFalsePop));
        assert!(code.iter().any(|i| i.op == Op::Jmp));

        // the JmpFalsePop must land past PopLoop, inside the module's range
        let jf = code.iter().position(|i| i.op == Op::JmpFalsePop).unwrap();
        let target = code[jf].data.as_addr();
        assert!(target <= code.len());
    }

    #[test]
    fn if_else_patches_both_arms_to_shared_end() {
        use feral_syntax::ast::{Cond, CondArm};

        let arenas = Arenas::new();
        let ast = arenas.ctx();
        let cond_expr = ast.expr(Expr::Literal(Literal::Bool(true)), loc());
        let then_expr = ast.expr(Expr::Literal(Literal::Int(1)), loc());
        let then_stmt = ast.stmt(Stmt::Expr(then_expr));
        let then_body = ast.block(vec![then_stmt], loc());
        let else_expr = ast.expr(Expr::Literal(Literal::Int(2)), loc());
        let else_stmt = ast.stmt(Stmt::Expr(else_expr));
        let else_body = ast.block(vec![else_stmt], loc());
        let arms = vec![
            CondArm { cond: Some(cond_expr), body: then_body },
            CondArm { cond: None, body: else_body },
        ];
        let cond = ast.cond(arms, loc());
        let top = ast.stmt(Stmt::Cond(cond));
        let block = ast.block(vec![top], loc());

        let mut interner = Itn::new();
        let code = Codegen::new(&mut interner).compile_module(block);

        let jf = code.iter().position(|i| i.op == Op::JmpFalsePop).unwrap();
        let je = code.iter().position(|i| i.op == Op::Jmp).unwrap();
        assert_eq!(code[jf].data.as_addr(), code[je].data.as_addr());
    }

    #[test]
    fn index_assignment_lowers_to_setitem_mem_call() {
        let arenas = Arenas::new();
        let ast = arenas.ctx();
        let recv = ast.expr(Expr::Ident(Symbol::EMPTY), loc());
        let index = ast.expr(Expr::Literal(Literal::Int(0)), loc());
        let value = ast.expr(Expr::Literal(Literal::Int(9)), loc());
        let target = ast.expr(Expr::Index { recv, index }, loc());
        let assign = ast.expr(Expr::Assign { target, value }, loc());
        let stmt = ast.stmt(Stmt::Expr(assign));
        let block = ast.block(vec![stmt], loc());

        let mut interner = Itn::new();
        let code = Codegen::new(&mut interner).compile_module(block);

        let mem_call = code.iter().find(|i| i.op == Op::MemCall).expect("expected a MEM_CALL");
        let payload = mem_call.data.as_str();
        assert!(payload.starts_with(crate::SETITEM));
    }

    #[test]
    fn call_with_mixed_args_encodes_reverse_order_arg_info() {
        use feral_syntax::ast::Arg;

        let arenas = Arenas::new();
        let ast = arenas.ctx();
        let mut interner = Itn::new();
        let kw_name = interner.intern("label");

        let callee = ast.expr(Expr::Ident(interner.intern("f")), loc());
        let pos = ast.expr(Expr::Literal(Literal::Int(1)), loc());
        let kw_val = ast.expr(Expr::Literal(Literal::Str("x".into())), loc());
        let args = ast.arg_slice(vec![Arg::Positional(pos), Arg::Named(kw_name, kw_val)]);
        let call = ast.expr(Expr::Call { callee, args }, loc());
        let stmt = ast.stmt(Stmt::Expr(call));
        let block = ast.block(vec![stmt], loc());

        let code = Codegen::new(&mut interner).compile_module(block);
        let call_instr = code.iter().find(|i| i.op == Op::Call).expect("expected a CALL");
        assert_eq!(call_instr.data.as_str(), "10");
    }

    #[test]
    fn fn_literal_with_default_param_emits_create_fn_with_arg_info() {
        use feral_syntax::ast::{FnSig, Params, Var};

        let arenas = Arenas::new();
        let ast = arenas.ctx();
        let mut interner = Itn::new();
        let pname = interner.intern("n");
        let default = ast.expr(Expr::Literal(Literal::Int(0)), loc());
        let vars = ast.var_slice(vec![Var {
            name: pname,
            in_target: None,
            value: Some(default),
            is_fn_arg: true,
            is_const: false,
            loc: loc(),
        }]);
        let params = Params { vars, kwargs_name: None, variadic_name: None };
        let body = ast.block(vec![], loc());
        let sig = ast.fn_sig(FnSig { name: None, params, body, loc: loc() });
        let fn_expr = ast.expr(Expr::FnLit(sig), loc());
        let stmt = ast.stmt(Stmt::Expr(fn_expr));
        let block = ast.block(vec![stmt], loc());

        let code = Codegen::new(&mut interner).compile_module(block);

        assert!(code.iter().any(|i| i.op == Op::BlockTill));
        let create_fn = code.iter().find(|i| i.op == Op::CreateFn).expect("expected CREATE_FN");
        // argInfo: [0]=kwbag('0'), [1]=variadic('0'), [2]=the one param, defaulted -> '1'
        assert_eq!(create_fn.data.as_str(), "001");
    }

    #[test]
    fn for_in_loop_uses_hidden_iterator_and_next_mem_call() {
        use feral_syntax::ast::ForIn;

        let arenas = Arenas::new();
        let ast = arenas.ctx();
        let mut interner = Itn::new();
        let binding = interner.intern("item");
        let iterable = ast.expr(Expr::Ident(interner.intern("xs")), loc());
        let body = ast.block(vec![], loc());
        let f = ast.for_in(ForIn { binding, iterable, body, loc: loc() });
        let stmt = ast.stmt(Stmt::ForIn(f));
        let block = ast.block(vec![stmt], loc());

        let code = Codegen::new(&mut interner).compile_module(block);

        let next_call = code
            .iter()
            .find(|i| i.op == Op::MemCall && i.data.as_str().starts_with("next"))
            .expect("expected a MEM_CALL to next");
        assert!(next_call.data.as_str().contains('\u{1}'));
        assert!(code.iter().any(|i| i.op == Op::JmpNil));
    }
}
