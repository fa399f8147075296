//! Expression codegen (`spec.md` §4.4's "Core encodings").

use feral_base::Location;
use feral_bytecode::instruction::Data;
use feral_bytecode::opcode::Opcode;
use feral_syntax::ast::{Arg, BinOp, Expr, ExprNode, Literal, UnOp};

use crate::stmt::compile_or_handler_body;
use crate::{mem_call_payload, op_fn_name, unary_op_fn_name, Codegen, GETITEM, MAP_NEW, SETITEM, VEC_NEW};

/// Compiles `expr`, leaving exactly one `Value` on the stack.
pub fn compile_expr(cg: &mut Codegen<'_>, expr: &ExprNode) {
    match &expr.kind {
        Expr::Literal(lit) => {
            let data = literal_data(lit);
            cg.emit(Opcode::LoadData, expr.loc, data);
        }
        Expr::Ident(name) => {
            cg.emit(Opcode::LoadData, expr.loc, Data::Iden(*name));
        }
        Expr::Paren(inner) => compile_expr(cg, inner),

        Expr::Unary { op, operand } => {
            compile_expr(cg, operand);
            let name = unary_op_fn_name(*op);
            emit_call_to_native(cg, expr.loc, name, 1);
        }

        Expr::Binary { op: BinOp::LogAnd, lhs, rhs } => {
            compile_expr(cg, lhs);
            let jf = cg.emit(Opcode::JmpFalse, expr.loc, Data::Int(0));
            cg.emit(Opcode::Unload, expr.loc, Data::Int(1));
            compile_expr(cg, rhs);
            let end = cg.here();
            cg.patch(jf, end);
        }
        Expr::Binary { op: BinOp::LogOr, lhs, rhs } => {
            compile_expr(cg, lhs);
            let jt = cg.emit(Opcode::JmpTrue, expr.loc, Data::Int(0));
            cg.emit(Opcode::Unload, expr.loc, Data::Int(1));
            compile_expr(cg, rhs);
            let end = cg.here();
            cg.patch(jt, end);
        }
        Expr::Binary { op, lhs, rhs } => {
            compile_expr(cg, lhs);
            compile_expr(cg, rhs);
            let name = op_fn_name(*op);
            emit_call_to_native(cg, expr.loc, name, 2);
        }

        Expr::Ternary { cond, then, else_ } => {
            compile_expr(cg, cond);
            let jf = cg.emit(Opcode::JmpFalsePop, expr.loc, Data::Int(0));
            compile_expr(cg, then);
            let jend = cg.emit(Opcode::Jmp, expr.loc, Data::Int(0));
            let else_start = cg.here();
            cg.patch(jf, else_start);
            compile_expr(cg, else_);
            let end = cg.here();
            cg.patch(jend, end);
        }

        Expr::Assign { target, value } => compile_assign(cg, expr.loc, target, value),

        Expr::IncDec { op, pos, target } => compile_inc_dec(cg, expr.loc, *op, *pos, target),

        Expr::Spread(inner) => compile_expr(cg, inner),

        Expr::Index { recv, index } => {
            compile_expr(cg, index);
            compile_expr(cg, recv);
            cg.emit(Opcode::MemCall, expr.loc, Data::Str(mem_call_payload(GETITEM, "0")));
        }

        Expr::Attr { recv, attr } => {
            compile_expr(cg, recv);
            cg.emit(Opcode::Attr, expr.loc, Data::Iden(*attr));
        }

        Expr::Call { callee, args } => {
            compile_args(cg, args);
            compile_expr(cg, callee);
            let info = arg_info(args);
            cg.emit(Opcode::Call, expr.loc, Data::Str(info));
        }

        Expr::MethodCall { recv, method, args } => {
            compile_args(cg, args);
            compile_expr(cg, recv);
            let info = arg_info(args);
            let name = cg_resolve(cg, *method);
            cg.emit(Opcode::MemCall, expr.loc, Data::Str(mem_call_payload(&name, &info)));
        }

        Expr::VecLit(items) => {
            for it in items.iter().rev() {
                compile_expr(cg, it);
            }
            let info: String = std::iter::repeat('0').take(items.len()).collect();
            let sym = cg.interner.intern(VEC_NEW);
            cg.emit(Opcode::LoadData, expr.loc, Data::Iden(sym));
            cg.emit(Opcode::Call, expr.loc, Data::Str(info));
        }

        Expr::MapLit(pairs) => {
            for (k, v) in pairs.iter().rev() {
                compile_expr(cg, v);
                compile_expr(cg, k);
            }
            let info: String = std::iter::repeat('0').take(pairs.len() * 2).collect();
            let sym = cg.interner.intern(MAP_NEW);
            cg.emit(Opcode::LoadData, expr.loc, Data::Iden(sym));
            cg.emit(Opcode::Call, expr.loc, Data::Str(info));
        }

        Expr::StructLit { ty, fields } => {
            for f in fields.iter().rev() {
                compile_expr(cg, f.value);
                let name = cg.interner.resolve(f.name).to_string();
                cg.emit(Opcode::LoadData, expr.loc, Data::Str(name));
            }
            compile_expr(cg, ty);
            let info: String = std::iter::repeat('1').take(fields.len()).collect();
            cg.emit(Opcode::Call, expr.loc, Data::Str(info));
        }

        Expr::FnLit(sig) => {
            crate::stmt::compile_fn_literal(cg, sig);
        }

        Expr::OrHandler { expr: guarded, capture, handler } => {
            let push_try = cg.emit(Opcode::PushTry, expr.loc, Data::Int(0));
            compile_expr(cg, guarded);
            cg.emit(Opcode::PopTry, expr.loc, Data::Nil);
            let jend = cg.emit(Opcode::Jmp, expr.loc, Data::Int(0));
            let handler_start = cg.here();
            cg.patch(push_try, handler_start);
            if let Some(name) = capture {
                cg.emit(Opcode::Create, expr.loc, Data::Iden(*name));
                cg.emit(Opcode::Unload, expr.loc, Data::Int(1));
            } else {
                cg.emit(Opcode::Unload, expr.loc, Data::Int(1));
            }
            compile_or_handler_body(cg, handler);
            let end = cg.here();
            cg.patch(jend, end);
        }
    }
}

fn cg_resolve(cg: &Codegen<'_>, sym: feral_base::Symbol) -> String {
    cg.interner.resolve(sym).to_string()
}

fn literal_data(lit: &Literal) -> Data {
    match lit {
        Literal::Int(n) => Data::Int(*n),
        Literal::Flt(f) => Data::Flt(*f),
        Literal::Str(s) => Data::Str(s.clone()),
        Literal::Bool(b) => Data::Bool(*b),
        Literal::Nil => Data::Nil,
    }
}

fn emit_call_to_native(cg: &mut Codegen<'_>, loc: Location, name: &str, argc: usize) {
    let sym = cg.interner.intern(name);
    cg.emit(Opcode::LoadData, loc, Data::Iden(sym));
    let info: String = std::iter::repeat('0').take(argc).collect();
    cg.emit(Opcode::Call, loc, Data::Str(info));
}

/// Encodes one character per argument, describing the args in the same
/// right-to-left order they're pushed (`spec.md` §4.4): `0` positional,
/// `1` keyword, `2` unpack.
fn arg_info(args: &[Arg]) -> String {
    args.iter()
        .rev()
        .map(|a| match a {
            Arg::Positional(_) => '0',
            Arg::Named(_, _) => '1',
            Arg::Unpack(_) => '2',
        })
        .collect()
}

fn compile_args(cg: &mut Codegen<'_>, args: &[Arg]) {
    for arg in args.iter().rev() {
        match arg {
            Arg::Positional(e) => compile_expr(cg, e),
            Arg::Unpack(e) => compile_expr(cg, e),
            Arg::Named(name, e) => {
                compile_expr(cg, e);
                let text = cg.interner.resolve(*name).to_string();
                cg.emit(Opcode::LoadData, e.loc, Data::Str(text));
            }
        }
    }
}

fn compile_assign(cg: &mut Codegen<'_>, loc: Location, target: &ExprNode, value: &ExprNode) {
    match &target.kind {
        Expr::Ident(name) => {
            compile_expr(cg, value);
            let text = cg.interner.resolve(*name).to_string();
            cg.emit(Opcode::LoadData, loc, Data::Str(text));
            cg.emit(Opcode::Store, loc, Data::Nil);
        }
        Expr::Attr { recv, attr } => {
            compile_expr(cg, value);
            compile_expr(cg, recv);
            let name = cg.interner.resolve(*attr).to_string();
            cg.emit(Opcode::LoadData, loc, Data::Str(name));
            cg.emit(Opcode::CreateIn, loc, Data::Nil);
        }
        Expr::Index { recv, index } => {
            compile_expr(cg, value);
            compile_expr(cg, index);
            compile_expr(cg, recv);
            cg.emit(Opcode::MemCall, loc, Data::Str(mem_call_payload(SETITEM, "00")));
        }
        _ => panic!("codegen bug: assignment target is not an lvalue"),
    }
}

fn compile_inc_dec(
    cg: &mut Codegen<'_>,
    loc: Location,
    op: feral_syntax::ast::IncDecOp,
    pos: feral_syntax::ast::IncDecPos,
    target: &ExprNode,
) {
    use feral_syntax::ast::{IncDecOp, IncDecPos};

    let name = match &target.kind {
        Expr::Ident(name) => *name,
        _ => panic!("codegen bug: ++/-- target is not an identifier"),
    };

    if matches!(pos, IncDecPos::Post) {
        cg.emit(Opcode::LoadData, loc, Data::Iden(name));
    }
    cg.emit(Opcode::LoadData, loc, Data::Iden(name));
    cg.emit(Opcode::LoadData, loc, Data::Int(1));
    let op_name = match op {
        IncDecOp::Inc => "__op_add",
        IncDecOp::Dec => "__op_sub",
    };
    emit_call_to_native(cg, loc, op_name, 2);
    let text = cg.interner.resolve(name).to_string();
    cg.emit(Opcode::LoadData, loc, Data::Str(text));
    cg.emit(Opcode::Store, loc, Data::Nil);
    if matches!(pos, IncDecPos::Post) {
        cg.emit(Opcode::Unload, loc, Data::Int(1));
    }
}
