//! Statement and block codegen (`spec.md` §4.4).

use feral_bytecode::instruction::Data;
use feral_bytecode::opcode::Opcode;
use feral_syntax::ast::{Block, FnSig, Stmt, Var};

use crate::expr::compile_expr;
use crate::{Codegen, LoopFrame};

/// Number of variable bindings a block directly introduces — the `n` in
/// `PUSH_BLOCK n` (`spec.md` §4.4: "n = number of variables declared
/// inside the block (known at codegen)"). Only counts bindings made
/// directly in this block's own statement list, not inside nested
/// blocks/loops/conditionals, which push their own scope.
fn count_block_vars(block: &Block) -> usize {
    block
        .stmts
        .iter()
        .map(|s| match s {
            Stmt::VarDecl(decl) => decl.vars.len(),
            Stmt::FnDef(_) => 1,
            _ => 0,
        })
        .sum()
}

pub fn compile_block(cg: &mut Codegen<'_>, block: &Block) {
    let n = count_block_vars(block);
    cg.emit(Opcode::PushBlock, block.loc, Data::Int(n as i64));
    for &stmt in block.stmts {
        compile_stmt(cg, stmt);
    }
    cg.emit(Opcode::PopBlock, block.loc, Data::Int(n as i64));
}

/// Compiles an `or`-handler's body, leaving its last statement's value on
/// the stack instead of discarding it (`spec.md` §4.4: "its last value
/// becomes the expression value"). Every other statement in the body
/// still goes through the usual push-then-`UNLOAD` discipline; only the
/// final one is special-cased. A trailing non-`Expr` statement (or an
/// empty body) has no value to offer, so `nil` is pushed instead.
pub fn compile_or_handler_body(cg: &mut Codegen<'_>, block: &Block) {
    let n = count_block_vars(block);
    cg.emit(Opcode::PushBlock, block.loc, Data::Int(n as i64));
    match block.stmts.split_last() {
        Some((&last, rest)) => {
            for &stmt in rest {
                compile_stmt(cg, stmt);
            }
            if let Stmt::Expr(e) = last {
                compile_expr(cg, e);
            } else {
                compile_stmt(cg, last);
                cg.emit(Opcode::LoadData, block.loc, Data::Nil);
            }
        }
        None => {
            cg.emit(Opcode::LoadData, block.loc, Data::Nil);
        }
    }
    cg.emit(Opcode::PopBlock, block.loc, Data::Int(n as i64));
}

fn compile_stmt(cg: &mut Codegen<'_>, stmt: &Stmt) {
    match stmt {
        Stmt::Expr(e) => {
            compile_expr(cg, e);
            cg.emit(Opcode::Unload, e.loc, Data::Int(1));
        }
        Stmt::VarDecl(decl) => {
            for var in decl.vars {
                compile_var_binding(cg, var);
            }
        }
        Stmt::FnDef(sig) => {
            compile_fn_literal(cg, sig);
            let name = sig.name.expect("FnDef always names its function");
            cg.emit(Opcode::Create, sig.loc, Data::Iden(name));
            cg.emit(Opcode::Unload, sig.loc, Data::Int(1));
        }
        Stmt::Cond(cond) => compile_cond(cg, cond),
        Stmt::For(f) => compile_for(cg, f),
        Stmt::ForIn(f) => compile_for_in(cg, f),
        Stmt::While(w) => compile_while(cg, w),
        Stmt::Return(value, loc) => {
            match value {
                Some(e) => compile_expr(cg, e),
                None => {
                    cg.emit(Opcode::LoadData, *loc, Data::Nil);
                }
            }
            cg.emit(Opcode::Return, *loc, Data::Bool(value.is_some()));
        }
        Stmt::Continue(loc) => {
            let idx = cg.emit(Opcode::Continue, *loc, Data::Int(0));
            cg.loops.last_mut().expect("continue outside a loop").continue_patches.push(idx);
        }
        Stmt::Break(loc) => {
            let idx = cg.emit(Opcode::Break, *loc, Data::Int(0));
            cg.loops.last_mut().expect("break outside a loop").break_patches.push(idx);
        }
        // `Defer` never reaches codegen: `feral_simplify` removes every
        // `Defer` node before this pass runs.
        Stmt::Defer(_, loc) => {
            panic!("codegen bug: un-lowered defer reached codegen at {loc:?}")
        }
        Stmt::Block(b) => compile_block(cg, b),
    }
}

fn compile_var_binding(cg: &mut Codegen<'_>, var: &Var) {
    let value = var.value.expect("a let binding always has an initializer expression");
    compile_expr(cg, value);
    match var.in_target {
        Some(target) => {
            compile_expr(cg, target);
            let name = cg.interner.resolve(var.name).to_string();
            cg.emit(Opcode::LoadData, var.loc, Data::Str(name));
            cg.emit(Opcode::CreateIn, var.loc, Data::Nil);
        }
        None => {
            cg.emit(Opcode::Create, var.loc, Data::Iden(var.name));
        }
    }
    cg.emit(Opcode::Unload, var.loc, Data::Int(1));
}

fn compile_cond(cg: &mut Codegen<'_>, cond: &feral_syntax::ast::Cond) {
    let mut end_patches = Vec::new();
    let mut prev_false_patch: Option<usize> = None;

    for arm in cond.arms {
        if let Some(p) = prev_false_patch.take() {
            let here = cg.here();
            cg.patch(p, here);
        }
        match arm.cond {
            Some(c) => {
                compile_expr(cg, c);
                let jf = cg.emit(Opcode::JmpFalsePop, c.loc, Data::Int(0));
                compile_block(cg, arm.body);
                let je = cg.emit(Opcode::Jmp, arm.body.loc, Data::Int(0));
                end_patches.push(je);
                prev_false_patch = Some(jf);
            }
            None => {
                compile_block(cg, arm.body);
            }
        }
    }
    if let Some(p) = prev_false_patch {
        let here = cg.here();
        cg.patch(p, here);
    }
    let end = cg.here();
    for p in end_patches {
        cg.patch(p, end);
    }
}

fn compile_for(cg: &mut Codegen<'_>, f: &feral_syntax::ast::For) {
    cg.emit(Opcode::PushLoop, f.loc, Data::Nil);
    if let Some(init) = f.init {
        compile_stmt(cg, init);
    }
    cg.loops.push(LoopFrame { continue_patches: Vec::new(), break_patches: Vec::new() });

    let l1 = cg.here();
    let jend = f.cond.map(|c| {
        compile_expr(cg, c);
        cg.emit(Opcode::JmpFalsePop, c.loc, Data::Int(0))
    });

    compile_block(cg, f.body);

    let lcont = cg.here();
    if let Some(step) = f.step {
        compile_expr(cg, step);
        cg.emit(Opcode::Unload, step.loc, Data::Int(1));
    }
    cg.emit(Opcode::Jmp, f.loc, Data::Int(l1 as i64));

    let lend = cg.here();
    if let Some(jend) = jend {
        cg.patch(jend, lend);
    }
    cg.emit(Opcode::PopLoop, f.loc, Data::Nil);

    let frame = cg.loops.pop().expect("loop frame pushed above");
    for p in frame.continue_patches {
        cg.patch(p, lcont);
    }
    for p in frame.break_patches {
        cg.patch(p, lend);
    }
}

fn compile_while(cg: &mut Codegen<'_>, w: &feral_syntax::ast::While) {
    let synthetic = feral_syntax::ast::For { init: None, cond: Some(w.cond), step: None, body: w.body, loc: w.loc };
    compile_for(cg, &synthetic);
}

/// `for x in iter body` lowers to the hidden-iterator `while` form
/// described in `spec.md` §4.4/§9: evaluate `iter` once via its `.each()`-
/// style iterator-producing call already present in the AST (the
/// surface form `for x in v.each() {}` from `spec.md` §8 scenario 5
/// already hands codegen a plain expression; this lowering only adds the
/// hidden `next()` pump), store it in a hidden variable, then loop
/// `let x = hidden.next(); if x is nil, stop; body`.
fn compile_for_in(cg: &mut Codegen<'_>, f: &feral_syntax::ast::ForIn) {
    cg.emit(Opcode::PushLoop, f.loc, Data::Nil);

    let hidden = feral_base::Symbol::EMPTY;
    compile_expr(cg, f.iterable);
    cg.emit(Opcode::Create, f.loc, Data::Iden(hidden));
    cg.emit(Opcode::Unload, f.loc, Data::Int(1));

    cg.loops.push(LoopFrame { continue_patches: Vec::new(), break_patches: Vec::new() });

    let l1 = cg.here();
    cg.emit(Opcode::LoadData, f.loc, Data::Iden(hidden));
    cg.emit(Opcode::MemCall, f.loc, Data::Str(crate::mem_call_payload("next", "")));
    cg.emit(Opcode::Create, f.loc, Data::Iden(f.binding));
    cg.emit(Opcode::Unload, f.loc, Data::Int(1));
    cg.emit(Opcode::LoadData, f.loc, Data::Iden(f.binding));
    let jend = cg.emit(Opcode::JmpNil, f.loc, Data::Int(0));

    compile_block(cg, f.body);

    let lcont = cg.here();
    cg.emit(Opcode::Jmp, f.loc, Data::Int(l1 as i64));

    let lend = cg.here();
    cg.patch(jend, lend);
    cg.emit(Opcode::PopLoop, f.loc, Data::Nil);

    let frame = cg.loops.pop().expect("loop frame pushed above");
    for p in frame.continue_patches {
        cg.patch(p, lcont);
    }
    for p in frame.break_patches {
        cg.patch(p, lend);
    }
}

/// Compiles a function signature/body in place (`spec.md` §4.4 "Function
/// literal"): a `BLOCK_TILL` skip-jump, the body emitted inline, then
/// each defaulted parameter's default-value expression, then
/// `CREATE_FN argInfo`. Leaves the constructed `Fn` value on the stack.
pub fn compile_fn_literal(cg: &mut Codegen<'_>, sig: &FnSig) {
    let block_till = cg.emit(Opcode::BlockTill, sig.loc, Data::Int(0));
    compile_block(cg, sig.body);
    let end = cg.here();
    cg.patch(block_till, end);

    for var in sig.params.vars.iter().rev() {
        if let Some(default) = var.value {
            compile_expr(cg, default);
        }
        let name = cg.interner.resolve(var.name).to_string();
        cg.emit(Opcode::LoadData, var.loc, Data::Str(name));
    }
    if let Some(va) = sig.params.variadic_name {
        let name = cg.interner.resolve(va).to_string();
        cg.emit(Opcode::LoadData, sig.loc, Data::Str(name));
    }
    if let Some(kw) = sig.params.kwargs_name {
        let name = cg.interner.resolve(kw).to_string();
        cg.emit(Opcode::LoadData, sig.loc, Data::Str(name));
    }

    let arg_info = fn_arg_info(sig);
    cg.emit(Opcode::CreateFn, sig.loc, Data::Str(arg_info));
}

/// `argInfo[0]` is `'1'` iff there's a keyword-args bag, `[1]` iff
/// variadic, the rest one char per parameter in reverse source order:
/// `'1'` defaulted, `'0'` required (`spec.md` §4.4).
fn fn_arg_info(sig: &FnSig) -> String {
    let mut s = String::new();
    s.push(if sig.params.kwargs_name.is_some() { '1' } else { '0' });
    s.push(if sig.params.variadic_name.is_some() { '1' } else { '0' });
    for var in sig.params.vars.iter().rev() {
        s.push(if var.value.is_some() { '1' } else { '0' });
    }
    s
}

