//! The bytecode dispatch loop (`spec.md` §4.6 "Execution engine").
//!
//! Modeled on Rust's own call stack rather than the source VM's explicit
//! `exec_stack_t`/`FRAME_DEPTH_AT_PUSH` bookkeeping (`original_source/src/VM/VM.cpp`):
//! every nested feral-fn call is a recursive [`execute`] invocation, a
//! `Return` is a Rust `return`, and a failed call propagates as
//! `Err(RuntimeError)` up through ordinary `?`. This produces the same
//! externally observable behavior — one value left on the caller's stack
//! per call, `or`-handlers catching the innermost enclosing try record —
//! without hand-rolling what the call stack already gives for free.

use std::cell::RefCell;
use std::rc::Rc;

use feral_bytecode::instruction::{Data, Instruction};
use feral_bytecode::opcode::Opcode;
use feral_value::func::{FnBody, FnData, ModuleId, NativeHost};
use feral_value::ops;
use feral_value::struct_def::{StructData, StructDefData};
use feral_value::value::{MapData, Value, VecData};
use indexmap::IndexMap;

use crate::error::RuntimeError;
use crate::module::Module;
use crate::Vm;

/// What a single opcode handler asks the dispatch loop to do next.
enum Flow {
    Advance,
    Jump(usize),
    Return(Value),
}

/// One live `or`-handler: the catch target plus the stack/block depth to
/// unwind back to (`spec.md` §4.6 "PUSH_TRY/POP_TRY").
struct TryRecord {
    target: usize,
    stack_depth: usize,
    block_depth: usize,
}

/// Runs `module`'s bytecode over `[begin, end)`, returning the single
/// value the range leaves behind (a function body's implicit `nil`
/// return, or an explicit `RETURN`'s operand).
///
/// Each invocation owns its own operand stack and try-record stack, so
/// nested calls (feral-fn calls, recursive structure, `execute` called
/// again for a function body) never see each other's partial state.
pub fn execute(vm: &mut Vm, module: ModuleId, begin: usize, end: usize) -> Result<Value, RuntimeError> {
    let mut ip = begin;
    let mut stack: Vec<Value> = Vec::new();
    let mut try_stack: Vec<TryRecord> = Vec::new();
    let mut pending_fn_ranges: Vec<(usize, usize)> = Vec::new();

    loop {
        if vm.exit_requested {
            return Ok(Value::Nil);
        }
        if ip >= end {
            return Ok(Value::Nil);
        }
        // Recorded on every iteration (not just on entry) so that a native
        // call's `import(...)` resolves relative specs against whichever
        // module is actually stepping right now, even after a nested
        // `execute()` for a callee in a different module has returned
        // control back up to this loop.
        vm.current_module.set(module);
        let instr = vm.module(module).bytecode[ip].clone();
        log::trace!("{module:?}:{ip} {:?} (stack depth {})", instr.op, stack.len());
        match step(vm, module, &instr, &mut stack, &mut try_stack, &mut pending_fn_ranges, ip) {
            Ok(Flow::Advance) => ip += 1,
            Ok(Flow::Jump(target)) => ip = target,
            Ok(Flow::Return(v)) => return Ok(v),
            Err(err) => {
                if let Some(rec) = try_stack.pop() {
                    log::debug!("caught '{}' at {module:?}:{ip}, resuming handler at {}", err.message, rec.target);
                    stack.truncate(rec.stack_depth);
                    vm.module(module).vars.borrow_mut().resize_blocks_to(rec.block_depth);
                    stack.push(err.capture_value());
                    ip = rec.target;
                } else {
                    log::warn!("uncaught runtime failure at {module:?}:{ip}: {}", err.message);
                    return Err(err);
                }
            }
        }
    }
}

fn step(
    vm: &mut Vm,
    module: ModuleId,
    instr: &Instruction,
    stack: &mut Vec<Value>,
    try_stack: &mut Vec<TryRecord>,
    pending_fn_ranges: &mut Vec<(usize, usize)>,
    ip: usize,
) -> Result<Flow, RuntimeError> {
    match instr.op {
        Opcode::LoadData => {
            let value = load_data(vm, module, &instr.data, instr.loc)?;
            stack.push(value);
            Ok(Flow::Advance)
        }

        Opcode::Unload => {
            let n = instr.data.as_int() as usize;
            let new_len = stack.len().saturating_sub(n);
            stack.truncate(new_len);
            Ok(Flow::Advance)
        }

        Opcode::Create => {
            let name = instr.data.as_iden();
            let value = stack.last().expect("CREATE expects a value on the stack").clone();
            bind_in_scope(vm, module, name, value);
            Ok(Flow::Advance)
        }

        Opcode::CreateIn => {
            let name_str = pop_str(stack, instr.loc, "CREATE_IN")?;
            let target = stack.pop().expect("CREATE_IN expects a target on the stack");
            let value = stack.last().expect("CREATE_IN expects a value on the stack").clone();
            let name = vm.interner.borrow_mut().intern(&name_str);
            match &target {
                // `let name in SomeType = fn` installs a type method rather
                // than an attribute (`spec.md` §4.4 "CREATE_IN either
                // attaches an attribute ... or installs a type-method").
                Value::TypeId(ty) if value.is_callable() => {
                    vm.type_methods.add(*ty, name, value);
                }
                _ if target.is_attribute_based() => {
                    ops::attribute_set(&target, name, value, true)
                        .map_err(|()| RuntimeError::new(instr.loc, "cyclic container insert"))?;
                }
                _ => {
                    return Err(RuntimeError::new(
                        instr.loc,
                        format!("cannot declare '{name_str}' in a {}", target.type_name()),
                    ));
                }
            }
            Ok(Flow::Advance)
        }

        Opcode::Store => {
            let name_str = pop_str(stack, instr.loc, "STORE")?;
            let value = stack.last().expect("STORE expects a value on the stack").clone();
            let name = vm.interner.borrow_mut().intern(&name_str);
            store_existing(vm, module, name, &name_str, value, instr.loc)?;
            Ok(Flow::Advance)
        }

        Opcode::PushBlock => {
            let n = instr.data.as_int() as usize;
            vm.module(module).vars.borrow_mut().push_block(n);
            Ok(Flow::Advance)
        }
        Opcode::PopBlock => {
            let n = instr.data.as_int() as usize;
            vm.module(module).vars.borrow_mut().pop_block(n);
            Ok(Flow::Advance)
        }

        Opcode::PushLoop => {
            vm.module(module).vars.borrow_mut().push_loop();
            Ok(Flow::Advance)
        }
        Opcode::PopLoop => {
            vm.module(module).vars.borrow_mut().pop_loop();
            Ok(Flow::Advance)
        }

        Opcode::Continue => {
            vm.module(module).vars.borrow_mut().continue_loop();
            Ok(Flow::Jump(instr.data.as_addr()))
        }
        Opcode::Break => Ok(Flow::Jump(instr.data.as_addr())),

        Opcode::Jmp => Ok(Flow::Jump(instr.data.as_addr())),

        Opcode::JmpNil => {
            let v = stack.pop().expect("JMP_NIL expects a value on the stack");
            if matches!(v, Value::Nil) {
                Ok(Flow::Jump(instr.data.as_addr()))
            } else {
                Ok(Flow::Advance)
            }
        }
        Opcode::JmpTrue => {
            let v = stack.last().expect("JMP_TRUE expects a value on the stack");
            if v.to_bool() {
                Ok(Flow::Jump(instr.data.as_addr()))
            } else {
                Ok(Flow::Advance)
            }
        }
        Opcode::JmpFalse => {
            let v = stack.last().expect("JMP_FALSE expects a value on the stack");
            if !v.to_bool() {
                Ok(Flow::Jump(instr.data.as_addr()))
            } else {
                Ok(Flow::Advance)
            }
        }
        Opcode::JmpTruePop => {
            let v = stack.pop().expect("JMP_TRUE_POP expects a value on the stack");
            if v.to_bool() {
                Ok(Flow::Jump(instr.data.as_addr()))
            } else {
                Ok(Flow::Advance)
            }
        }
        Opcode::JmpFalsePop => {
            let v = stack.pop().expect("JMP_FALSE_POP expects a value on the stack");
            if !v.to_bool() {
                Ok(Flow::Jump(instr.data.as_addr()))
            } else {
                Ok(Flow::Advance)
            }
        }

        Opcode::PushTry => {
            try_stack.push(TryRecord {
                target: instr.data.as_addr(),
                stack_depth: stack.len(),
                block_depth: vm.module(module).vars.borrow().block_depth(),
            });
            Ok(Flow::Advance)
        }
        Opcode::PopTry => {
            try_stack.pop();
            Ok(Flow::Advance)
        }

        Opcode::Return => {
            let include_value = instr.data.as_bool();
            let v = if include_value {
                stack.pop().expect("RETURN with a value expects one on the stack")
            } else {
                Value::Nil
            };
            Ok(Flow::Return(v))
        }

        Opcode::BlockTill => {
            let target = instr.data.as_addr();
            pending_fn_ranges.push((ip + 1, target));
            Ok(Flow::Jump(target))
        }

        Opcode::CreateFn => {
            let value = create_fn(vm, module, instr, stack, pending_fn_ranges)?;
            stack.push(value);
            Ok(Flow::Advance)
        }

        Opcode::Attr => {
            let recv = stack.pop().expect("ATTR expects a receiver on the stack");
            let name = instr.data.as_iden();
            let value = resolve_attr(vm, &recv, name).ok_or_else(|| {
                RuntimeError::new(
                    instr.loc,
                    format!("no such attribute '{}' on {}", vm.interner.borrow().resolve(name), recv.type_name()),
                )
            })?;
            stack.push(value);
            Ok(Flow::Advance)
        }

        Opcode::Call => {
            let callee = stack.pop().expect("CALL expects a callee on the stack");
            let (positional, kwargs) = decode_args(stack, instr.data.as_str(), instr.loc)?;
            let result = call_value(vm, instr.loc, callee, positional, kwargs)?;
            stack.push(result);
            Ok(Flow::Advance)
        }

        Opcode::MemCall => {
            let recv = stack.pop().expect("MEM_CALL expects a receiver on the stack");
            let (name_str, arg_info) =
                instr.data.as_str().split_once('\u{1}').expect("codegen always embeds a separator in MEM_CALL payloads");
            let (positional, kwargs) = decode_args(stack, arg_info, instr.loc)?;
            let result = mem_call(vm, instr.loc, recv, name_str, positional, kwargs)?;
            stack.push(result);
            Ok(Flow::Advance)
        }
    }
}

fn pop_str(stack: &mut Vec<Value>, loc: feral_base::Location, who: &str) -> Result<Rc<str>, RuntimeError> {
    match stack.pop() {
        Some(Value::Str(s)) => Ok(s),
        Some(other) => Err(RuntimeError::new(loc, format!("codegen bug: {who} expected a string name, found {}", other.type_name()))),
        None => Err(RuntimeError::new(loc, format!("codegen bug: {who} expected a name on the stack"))),
    }
}

fn load_data(vm: &mut Vm, module: ModuleId, data: &Data, loc: feral_base::Location) -> Result<Value, RuntimeError> {
    Ok(match data {
        Data::Nil => Value::Nil,
        Data::Int(n) => Value::Int(*n),
        Data::Flt(f) => Value::Flt(*f),
        Data::Bool(b) => Value::Bool(*b),
        Data::Str(s) => Value::Str(Rc::from(s.as_str())),
        Data::Iden(sym) => {
            let m = vm.module(module);
            if let Some(v) = m.vars.borrow().get(*sym) {
                v
            } else if let Some(v) = m.globals.borrow().get(sym).cloned() {
                v
            } else {
                let name = vm.interner.borrow().resolve(*sym).to_string();
                return Err(RuntimeError::new(loc, format!("name '{name}' is not defined")));
            }
        }
    })
}

/// Binds `name` in the current frame, and — when that frame is the
/// module's top-level scope — mirrors the binding into the module's
/// `globals` map too, so a different module's `import("this").name` sees
/// it (`spec.md` §3 "ModuleRef" / "Per module: globals").
fn bind_in_scope(vm: &Vm, module: ModuleId, name: feral_base::Symbol, value: Value) {
    let m = vm.module(module);
    m.vars.borrow_mut().set_attr(name, value.clone());
    if m.vars.borrow().frame_depth() == 1 {
        m.globals.borrow_mut().insert(name, value);
    }
}

fn store_existing(
    vm: &Vm,
    module: ModuleId,
    name: feral_base::Symbol,
    name_str: &str,
    value: Value,
    loc: feral_base::Location,
) -> Result<(), RuntimeError> {
    let m = vm.module(module);
    if m.vars.borrow_mut().assign_existing(name, value.clone()) {
        if m.vars.borrow().frame_depth() == 1 {
            m.globals.borrow_mut().insert(name, value);
        }
        return Ok(());
    }
    if m.globals.borrow().contains_key(&name) {
        m.globals.borrow_mut().insert(name, value);
        return Ok(());
    }
    Err(RuntimeError::new(loc, format!("name '{name_str}' is not defined")))
}

/// Decodes a `CALL`/`MEM_CALL` argument region off `stack` (`spec.md`
/// §4.4's right-to-left `argInfo` encoding). Iterating `arg_info` in
/// reverse undoes codegen's own reversal, yielding positional args and
/// keyword args in their original source order.
fn decode_args(
    stack: &mut Vec<Value>,
    arg_info: &str,
    loc: feral_base::Location,
) -> Result<(Vec<Value>, IndexMap<String, Value>), RuntimeError> {
    let mut positional = Vec::new();
    let mut kwargs = IndexMap::new();
    for flag in arg_info.chars().rev() {
        match flag {
            '0' => {
                let v = stack.pop().expect("codegen balanced the stack for a positional arg");
                positional.push(v);
            }
            '1' => {
                let name_v = stack.pop().expect("codegen balanced the stack for a keyword arg name");
                let value = stack.pop().expect("codegen balanced the stack for a keyword arg value");
                let Value::Str(name) = name_v else {
                    return Err(RuntimeError::new(loc, "codegen bug: keyword argument name is not a string"));
                };
                kwargs.insert(name.to_string(), value);
            }
            '2' => {
                let v = stack.pop().expect("codegen balanced the stack for an unpack arg");
                match v {
                    Value::Vec(data) => positional.extend(data.borrow().items.iter().cloned()),
                    Value::Map(data) => {
                        for (k, val) in data.borrow().items.iter() {
                            kwargs.insert(k.clone(), val.clone());
                        }
                    }
                    other => return Err(RuntimeError::new(loc, format!("cannot unpack a value of type {}", other.type_name()))),
                }
            }
            other => return Err(RuntimeError::new(loc, format!("codegen bug: unknown arg_info flag {other:?}"))),
        }
    }
    Ok((positional, kwargs))
}

fn resolve_attr(vm: &Vm, recv: &Value, name: feral_base::Symbol) -> Option<Value> {
    if recv.is_attribute_based() {
        if let Some(v) = ops::attribute_get(recv, name) {
            return Some(v);
        }
    }
    vm.type_methods.get(recv.type_id(), name)
}

/// `CREATE_FN`'s argInfo decode (`spec.md` §4.4): `argInfo[0]` is the
/// kwargs-bag flag, `[1]` the variadic flag, the remainder one char per
/// parameter in reverse source order. Popping the remainder in reverse
/// (source order) matches the exact push sequence `compile_fn_literal`
/// emits: each param's name then (if defaulted) its default value,
/// innermost (last source param) pushed first.
fn create_fn(
    vm: &mut Vm,
    module: ModuleId,
    instr: &Instruction,
    stack: &mut Vec<Value>,
    pending_fn_ranges: &mut Vec<(usize, usize)>,
) -> Result<Value, RuntimeError> {
    let arg_info = instr.data.as_str();
    let mut chars = arg_info.chars();
    let has_kwargs = chars.next() == Some('1');
    let has_variadic = chars.next() == Some('1');
    let param_flags = &arg_info[2..];

    let kwargs_name = if has_kwargs {
        let s = pop_str(stack, instr.loc, "CREATE_FN kwargs name")?;
        Some(vm.interner.borrow_mut().intern(&s))
    } else {
        None
    };
    let variadic_name = if has_variadic {
        let s = pop_str(stack, instr.loc, "CREATE_FN variadic name")?;
        Some(vm.interner.borrow_mut().intern(&s))
    } else {
        None
    };

    let mut params = Vec::new();
    let mut defaults = IndexMap::new();
    for flag in param_flags.chars().rev() {
        let name_str = pop_str(stack, instr.loc, "CREATE_FN param name")?;
        let sym = vm.interner.borrow_mut().intern(&name_str);
        params.push(sym);
        if flag == '1' {
            let default = stack.pop().expect("CREATE_FN expects a default value for a defaulted param");
            defaults.insert(sym, default);
        }
    }

    let (begin, end) = pending_fn_ranges.pop().expect("BLOCK_TILL always precedes its matching CREATE_FN");

    Ok(Value::Fn(Rc::new(FnData {
        name: None,
        params,
        variadic: variadic_name,
        kwargs: kwargs_name,
        defaults,
        body: FnBody::Feral { module, begin, end },
    })))
}

fn call_value(
    vm: &mut Vm,
    loc: feral_base::Location,
    callee: Value,
    positional: Vec<Value>,
    kwargs: IndexMap<String, Value>,
) -> Result<Value, RuntimeError> {
    match callee {
        Value::Fn(fndata) => call_fn_data(vm, loc, &fndata, positional, kwargs),
        Value::StructDef(def) => construct_struct(vm, loc, &def, positional, kwargs),
        other => Err(RuntimeError::new(loc, format!("{} is not callable", other.type_name()))),
    }
}

fn mem_call(
    vm: &mut Vm,
    loc: feral_base::Location,
    recv: Value,
    method_name: &str,
    positional: Vec<Value>,
    kwargs: IndexMap<String, Value>,
) -> Result<Value, RuntimeError> {
    // `next()` on an iterator is handled directly: there is no
    // user-visible StructDef backing IteratorState for it to be
    // registered as a type-method against.
    if method_name == "next" {
        if let Value::Iterator(state) = &recv {
            return Ok(state.borrow_mut().next());
        }
    }

    let method_sym = vm.interner.borrow_mut().intern(method_name);

    if recv.is_attribute_based() {
        if let Some(callable) = ops::attribute_get(&recv, method_sym) {
            return call_value(vm, loc, callable, positional, kwargs);
        }
    }

    match vm.type_methods.get(recv.type_id(), method_sym) {
        Some(callable) => {
            let mut bound = Vec::with_capacity(positional.len() + 1);
            bound.push(recv.clone());
            bound.extend(positional);
            call_value(vm, loc, callable, bound, kwargs)
        }
        None => Err(RuntimeError::new(loc, format!("no method '{method_name}' on {}", recv.type_name()))),
    }
}

fn call_fn_data(
    vm: &mut Vm,
    loc: feral_base::Location,
    fndata: &Rc<FnData>,
    mut positional: Vec<Value>,
    kwargs: IndexMap<String, Value>,
) -> Result<Value, RuntimeError> {
    match &fndata.body {
        FnBody::Native(nf) => {
            let host: &mut dyn NativeHost = vm;
            match nf(host, loc, &positional, &kwargs) {
                Some(v) => Ok(v),
                None => Err(vm.take_pending_error(loc)),
            }
        }
        FnBody::Feral { module: fn_module, begin, end } => {
            let fn_module = *fn_module;
            let (begin, end) = (*begin, *end);

            let kwargs_syms: IndexMap<feral_base::Symbol, Value> = kwargs
                .into_iter()
                .map(|(k, v)| (vm.interner.borrow_mut().intern(&k), v))
                .collect();
            let mut kwargs_syms = kwargs_syms;

            positional.reverse();
            let mut bindings: Vec<(feral_base::Symbol, Value)> = Vec::with_capacity(fndata.params.len());
            for &param in &fndata.params {
                let value = if let Some(v) = positional.pop() {
                    v
                } else if let Some(v) = kwargs_syms.shift_remove(&param) {
                    v
                } else if let Some(v) = fndata.defaults.get(&param) {
                    v.clone()
                } else {
                    let name = vm.interner.borrow().resolve(param).to_string();
                    return Err(RuntimeError::new(loc, format!("missing required argument '{name}'")));
                };
                bindings.push((param, value));
            }
            positional.reverse();

            if let Some(variadic) = fndata.variadic {
                bindings.push((variadic, Value::Vec(Rc::new(RefCell::new(VecData { items: positional, refs: true })))));
            } else if !positional.is_empty() {
                return Err(RuntimeError::new(loc, "too many positional arguments"));
            }

            if let Some(kwbag) = fndata.kwargs {
                let items: IndexMap<String, Value> = kwargs_syms
                    .into_iter()
                    .map(|(s, v)| (vm.interner.borrow().resolve(s).to_string(), v))
                    .collect();
                bindings.push((kwbag, Value::Map(Rc::new(RefCell::new(MapData { items, refs: true })))));
            } else if let Some((leftover, _)) = kwargs_syms.iter().next() {
                let name = vm.interner.borrow().resolve(*leftover).to_string();
                return Err(RuntimeError::new(loc, format!("unexpected keyword argument '{name}'")));
            }

            if vm.recurse_count >= vm.recurse_max {
                return Err(RuntimeError::new(loc, "maximum recursion depth exceeded"));
            }
            vm.recurse_count += 1;
            log::debug!("calling feral fn at {fn_module:?}:[{begin},{end}) (depth {})", vm.recurse_count);

            let target_module = vm.module(fn_module);
            target_module.vars.borrow_mut().push_frame();
            for (name, value) in bindings {
                target_module.vars.borrow_mut().set_attr(name, value);
            }

            let result = execute(vm, fn_module, begin, end);

            vm.module(fn_module).vars.borrow_mut().pop_frame();
            vm.recurse_count -= 1;
            result
        }
    }
}

/// Constructs a [`StructData`] instance from a [`StructDefData`]
/// (`spec.md` §3 "StructDef ... callable — its call constructs a Struct
/// instance"). Accepts positional args bound in declared-field order
/// (for a plain `Point(1, 2)` call) as well as keyword args (the shape
/// `Expr::StructLit` always compiles down to); either way, any field
/// left unbound falls back to its declared default, and an entirely
/// unbound required field is a runtime error.
fn construct_struct(
    vm: &mut Vm,
    loc: feral_base::Location,
    def: &Rc<StructDefData>,
    positional: Vec<Value>,
    kwargs: IndexMap<String, Value>,
) -> Result<Value, RuntimeError> {
    let mut kwargs_syms: IndexMap<feral_base::Symbol, Value> =
        kwargs.into_iter().map(|(k, v)| (vm.interner.borrow_mut().intern(&k), v)).collect();

    let mut positional = positional.into_iter();
    let mut attrs = IndexMap::new();
    for &field in &def.fields {
        let value = if let Some(v) = positional.next() {
            v
        } else if let Some(v) = kwargs_syms.shift_remove(&field) {
            v
        } else if let Some(v) = def.defaults.get(&field) {
            v.clone()
        } else {
            let name = vm.interner.borrow().resolve(field).to_string();
            return Err(RuntimeError::new(loc, format!("missing field '{name}' in struct construction")));
        };
        attrs.insert(field, value);
    }

    if positional.next().is_some() {
        return Err(RuntimeError::new(loc, "too many positional arguments in struct construction"));
    }
    if let Some((leftover, _)) = kwargs_syms.iter().next() {
        let name = vm.interner.borrow().resolve(*leftover).to_string();
        return Err(RuntimeError::new(loc, format!("unknown field '{name}' in struct construction")));
    }

    Ok(Value::Struct(Rc::new(RefCell::new(StructData { type_id: def.type_id, attrs }))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use feral_base::Location;
    use std::path::PathBuf;

    /// A fresh `Vm` plus a `Location` pointing at an empty source unit, for
    /// building hand-assembled instruction streams.
    fn new_vm_and_loc() -> (Vm, Location) {
        let mut vm = Vm::new();
        let source = vm.sources.load_str("test.fr", "");
        let loc = Location::new(source, 0, 0);
        (vm, loc)
    }

    fn register(vm: &mut Vm, bytecode: Vec<Instruction>) -> ModuleId {
        let id = vm.next_module_id();
        let module = Module::new(id, PathBuf::from("test.fr"), PathBuf::from("."), bytecode, true);
        vm.register_module(module, PathBuf::from("test.fr"));
        id
    }

    #[test]
    fn create_binds_value_and_mirrors_into_module_globals() {
        let (mut vm, loc) = new_vm_and_loc();
        let x = vm.interner.borrow_mut().intern("x");
        let bytecode = vec![
            Instruction::new(Opcode::LoadData, loc, Data::Int(1)),
            Instruction::new(Opcode::Create, loc, Data::Iden(x)),
            Instruction::new(Opcode::Unload, loc, Data::Int(1)),
            Instruction::new(Opcode::LoadData, loc, Data::Iden(x)),
            Instruction::new(Opcode::Return, loc, Data::Bool(true)),
        ];
        let len = bytecode.len();
        let id = register(&mut vm, bytecode);
        let result = execute(&mut vm, id, 0, len).unwrap();
        assert!(matches!(result, Value::Int(1)));
        assert!(matches!(vm.module(id).globals.borrow().get(&x), Some(Value::Int(1))));
    }

    #[test]
    fn store_to_undefined_name_is_a_runtime_error() {
        let (mut vm, loc) = new_vm_and_loc();
        let bytecode = vec![
            Instruction::new(Opcode::LoadData, loc, Data::Int(1)),
            Instruction::new(Opcode::LoadData, loc, Data::Str("x".to_string())),
            Instruction::new(Opcode::Store, loc, Data::Nil),
            Instruction::new(Opcode::Return, loc, Data::Bool(false)),
        ];
        let len = bytecode.len();
        let id = register(&mut vm, bytecode);
        let err = execute(&mut vm, id, 0, len).unwrap_err();
        assert!(err.message.contains("not defined"));
    }

    #[test]
    fn store_falls_back_to_module_globals_when_no_frame_binding() {
        let (mut vm, loc) = new_vm_and_loc();
        let x = vm.interner.borrow_mut().intern("x");
        let bytecode = vec![
            Instruction::new(Opcode::LoadData, loc, Data::Int(2)),
            Instruction::new(Opcode::LoadData, loc, Data::Str("x".to_string())),
            Instruction::new(Opcode::Store, loc, Data::Nil),
            Instruction::new(Opcode::Return, loc, Data::Bool(true)),
        ];
        let len = bytecode.len();
        let id = register(&mut vm, bytecode);
        // `x` lives only in the module's globals (never bound via CREATE in
        // the current frame), exercising STORE's second fallback branch.
        vm.module(id).globals.borrow_mut().insert(x, Value::Int(1));
        let result = execute(&mut vm, id, 0, len).unwrap();
        assert!(matches!(result, Value::Int(2)));
        assert!(matches!(vm.module(id).globals.borrow().get(&x), Some(Value::Int(2))));
    }

    #[test]
    fn jmp_false_pop_skips_the_branch_when_condition_is_false() {
        let (mut vm, loc) = new_vm_and_loc();
        let bytecode = vec![
            Instruction::new(Opcode::LoadData, loc, Data::Bool(false)),
            Instruction::new(Opcode::JmpFalsePop, loc, Data::Int(4)),
            Instruction::new(Opcode::LoadData, loc, Data::Int(1)),
            Instruction::new(Opcode::Return, loc, Data::Bool(true)),
            Instruction::new(Opcode::LoadData, loc, Data::Int(2)),
            Instruction::new(Opcode::Return, loc, Data::Bool(true)),
        ];
        let len = bytecode.len();
        let id = register(&mut vm, bytecode);
        let result = execute(&mut vm, id, 0, len).unwrap();
        assert!(matches!(result, Value::Int(2)));
    }

    #[test]
    fn push_try_catches_a_failure_and_resumes_at_the_handler() {
        let (mut vm, loc) = new_vm_and_loc();
        let boom = vm.interner.borrow_mut().intern("boom");
        // Reading an undefined name fails inside the protected region;
        // PUSH_TRY's handler should catch it, push the captured error
        // value (a Str, since a plain name-lookup failure carries no
        // payload), and resume at the handler instead of propagating.
        let bytecode = vec![
            Instruction::new(Opcode::PushTry, loc, Data::Int(3)),
            Instruction::new(Opcode::LoadData, loc, Data::Iden(boom)),
            Instruction::new(Opcode::Return, loc, Data::Bool(true)),
            Instruction::new(Opcode::Return, loc, Data::Bool(true)),
        ];
        let len = bytecode.len();
        let id = register(&mut vm, bytecode);
        let result = execute(&mut vm, id, 0, len).unwrap();
        match result {
            Value::Str(s) => assert!(s.contains("not defined")),
            other => panic!("expected the captured error as a Str, got {other:?}"),
        }
    }

    #[test]
    fn calling_a_user_defined_function_binds_its_parameter() {
        let (mut vm, loc) = new_vm_and_loc();
        let n = vm.interner.borrow_mut().intern("n");
        let identity = vm.interner.borrow_mut().intern("identity");

        // [0] BLOCK_TILL -> 3           (fn body occupies [1, 3))
        // [1]   LOAD_DATA Iden(n)
        // [2]   RETURN true
        // [3] LOAD_DATA Str("n")        (param name, pushed for CREATE_FN)
        // [4] CREATE_FN "000"           (no kwargs, no variadic, one required param)
        // [5] CREATE Iden(identity)
        // [6] UNLOAD 1
        // [7] LOAD_DATA Int(5)          (argument, pushed before the callee)
        // [8] LOAD_DATA Iden(identity)  (callee, on top for CALL to pop)
        // [9] CALL "0"                  (one positional arg)
        // [10] RETURN true
        let bytecode = vec![
            Instruction::new(Opcode::BlockTill, loc, Data::Int(3)),
            Instruction::new(Opcode::LoadData, loc, Data::Iden(n)),
            Instruction::new(Opcode::Return, loc, Data::Bool(true)),
            Instruction::new(Opcode::LoadData, loc, Data::Str("n".to_string())),
            Instruction::new(Opcode::CreateFn, loc, Data::Str("000".to_string())),
            Instruction::new(Opcode::Create, loc, Data::Iden(identity)),
            Instruction::new(Opcode::Unload, loc, Data::Int(1)),
            Instruction::new(Opcode::LoadData, loc, Data::Int(5)),
            Instruction::new(Opcode::LoadData, loc, Data::Iden(identity)),
            Instruction::new(Opcode::Call, loc, Data::Str("0".to_string())),
            Instruction::new(Opcode::Return, loc, Data::Bool(true)),
        ];
        let len = bytecode.len();
        let id = register(&mut vm, bytecode);
        let result = execute(&mut vm, id, 0, len).unwrap();
        assert!(matches!(result, Value::Int(5)));
    }

    #[test]
    fn decode_args_reads_positional_keyword_and_unpack_flags_in_source_order() {
        let (_vm, loc) = new_vm_and_loc();
        let mut extra_map = MapData { items: IndexMap::new(), refs: true };
        extra_map.items.insert("extra".to_string(), Value::Int(99));

        // Source order: positional(1), keyword(kw=20), unpack({"extra": 99}).
        // Codegen pushes right-to-left, one value per '0', (value, name) per
        // '1', and the bag itself per '2' — so the stack bottom-to-top here
        // is [unpack_map, kw_value, kw_name, positional_value].
        let mut stack = vec![
            Value::Map(Rc::new(RefCell::new(extra_map))),
            Value::Int(20),
            Value::Str(Rc::from("kw")),
            Value::Int(1),
        ];
        let (positional, kwargs) = decode_args(&mut stack, "210", loc).unwrap();
        assert!(matches!(positional.as_slice(), [Value::Int(1)]));
        assert!(matches!(kwargs.get("kw"), Some(Value::Int(20))));
        assert!(matches!(kwargs.get("extra"), Some(Value::Int(99))));
        assert!(stack.is_empty());
    }

    fn point_def(vm: &mut Vm) -> Rc<StructDefData> {
        let x = vm.interner.borrow_mut().intern("x");
        let y = vm.interner.borrow_mut().intern("y");
        let mut defaults = IndexMap::new();
        defaults.insert(y, Value::Int(0));
        Rc::new(StructDefData { type_id: feral_value::typeid::TypeId(100), name: vm.interner.borrow_mut().intern("Point"), fields: vec![x, y], defaults })
    }

    #[test]
    fn construct_struct_binds_positional_args_in_field_order() {
        let (mut vm, loc) = new_vm_and_loc();
        let def = point_def(&mut vm);
        let value = construct_struct(&mut vm, loc, &def, vec![Value::Int(1), Value::Int(2)], IndexMap::new()).unwrap();
        match value {
            Value::Struct(s) => {
                let s = s.borrow();
                assert_eq!(s.type_id, feral_value::typeid::TypeId(100));
                assert!(matches!(s.attrs.get(&def.fields[0]), Some(Value::Int(1))));
                assert!(matches!(s.attrs.get(&def.fields[1]), Some(Value::Int(2))));
            }
            other => panic!("expected a Struct, got {other:?}"),
        }
    }

    #[test]
    fn construct_struct_falls_back_to_declared_default_when_field_unbound() {
        let (mut vm, loc) = new_vm_and_loc();
        let def = point_def(&mut vm);
        let value = construct_struct(&mut vm, loc, &def, vec![Value::Int(5)], IndexMap::new()).unwrap();
        match value {
            Value::Struct(s) => {
                let s = s.borrow();
                assert!(matches!(s.attrs.get(&def.fields[0]), Some(Value::Int(5))));
                assert!(matches!(s.attrs.get(&def.fields[1]), Some(Value::Int(0))));
            }
            other => panic!("expected a Struct, got {other:?}"),
        }
    }

    #[test]
    fn construct_struct_errors_on_missing_required_field() {
        let (mut vm, loc) = new_vm_and_loc();
        let def = Rc::new(StructDefData {
            type_id: feral_value::typeid::TypeId(101),
            name: vm.interner.borrow_mut().intern("NoDefaults"),
            fields: vec![vm.interner.borrow_mut().intern("a")],
            defaults: IndexMap::new(),
        });
        let err = construct_struct(&mut vm, loc, &def, Vec::new(), IndexMap::new()).unwrap_err();
        assert!(err.message.contains("missing field"));
    }

    #[test]
    fn construct_struct_errors_on_too_many_positional_args() {
        let (mut vm, loc) = new_vm_and_loc();
        let def = point_def(&mut vm);
        let err = construct_struct(&mut vm, loc, &def, vec![Value::Int(1), Value::Int(2), Value::Int(3)], IndexMap::new()).unwrap_err();
        assert!(err.message.contains("too many positional"));
    }

    #[test]
    fn construct_struct_errors_on_unknown_keyword_field() {
        let (mut vm, loc) = new_vm_and_loc();
        let def = point_def(&mut vm);
        let mut kwargs = IndexMap::new();
        kwargs.insert("z".to_string(), Value::Int(9));
        let err = construct_struct(&mut vm, loc, &def, vec![Value::Int(1), Value::Int(2)], kwargs).unwrap_err();
        assert!(err.message.contains("unknown field"));
    }

    #[test]
    fn construct_struct_binds_keyword_args_by_name() {
        let (mut vm, loc) = new_vm_and_loc();
        let def = point_def(&mut vm);
        let mut kwargs = IndexMap::new();
        kwargs.insert("y".to_string(), Value::Int(7));
        kwargs.insert("x".to_string(), Value::Int(3));
        let value = construct_struct(&mut vm, loc, &def, Vec::new(), kwargs).unwrap();
        match value {
            Value::Struct(s) => {
                let s = s.borrow();
                assert!(matches!(s.attrs.get(&def.fields[0]), Some(Value::Int(3))));
                assert!(matches!(s.attrs.get(&def.fields[1]), Some(Value::Int(7))));
            }
            other => panic!("expected a Struct, got {other:?}"),
        }
    }
}
