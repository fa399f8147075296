//! The synthetic native globals `feral_codegen` lowers every operator,
//! literal-collection, and struct-construction expression to
//! (`feral_codegen::lib` doc comment: "the VM bootstraps into every
//! module"), plus the handful of core-language builtins that aren't
//! opcodes either (`import`, `raise`, `exit`, `struct`).
//!
//! Every native here is a plain function over [`Value`]s and the
//! [`NativeHost`] contract — none of them need a concrete `Vm`, which is
//! exactly the point of the native-callable uniformity design
//! (`spec.md` §9).
//!
//! ## Arithmetic promotion
//!
//! `spec.md` §4.3 calls int/float mixes "float-promoting": any binary
//! arithmetic operator with at least one `Flt` operand converts both
//! operands to `f64` and returns a `Flt`. This deliberately does not
//! follow `original_source/library/core/int.hpp`'s `ARITHI_FUNC` macro,
//! which truncates a float right-hand side down to `int` and stays in
//! integer arithmetic when the left operand is `int` — an asymmetric
//! quirk of the arbitrary-precision original that contradicts its own
//! float-dispatched arm and that `spec.md` already resolves by stating
//! the promotion rule directly. Recorded in `DESIGN.md`.

use std::cell::RefCell;
use std::rc::Rc;

use feral_base::{Interner, Location, Symbol};
use feral_value::func::{FnBody, FnData, NativeFn, NativeHost};
use feral_value::struct_def::StructDefData;
use feral_value::typeid::TypeIdAllocator;
use feral_value::value::{MapData, VecData, Value};
use indexmap::IndexMap;

use crate::typemethods::TypeMethodTable;

fn native(f: impl Fn(&mut dyn NativeHost, Location, &[Value], &IndexMap<String, Value>) -> Option<Value> + 'static) -> Value {
    let nf: NativeFn = Rc::new(f);
    Value::Fn(Rc::new(FnData {
        name: None,
        params: vec![],
        variadic: None,
        kwargs: None,
        defaults: IndexMap::new(),
        body: FnBody::Native(nf),
    }))
}

fn arith_pair(a: &Value, b: &Value) -> Option<(f64, f64)> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Some((*x as f64, *y as f64)),
        (Value::Int(x), Value::Flt(y)) => Some((*x as f64, *y)),
        (Value::Flt(x), Value::Int(y)) => Some((*x, *y as f64)),
        (Value::Flt(x), Value::Flt(y)) => Some((*x, *y)),
        _ => None,
    }
}

/// `true` if either operand is `Flt` — the float-promotion trigger.
fn either_float(a: &Value, b: &Value) -> bool {
    matches!(a, Value::Flt(_)) || matches!(b, Value::Flt(_))
}

fn type_err(host: &mut dyn NativeHost, loc: Location, op: &str, a: &Value, b: &Value) -> Option<Value> {
    host.fail(loc, format!("unsupported operand types for {op}: {} and {}", a.type_name(), b.type_name()));
    None
}

fn int_binop(
    host: &mut dyn NativeHost,
    loc: Location,
    name: &str,
    args: &[Value],
    int_op: impl Fn(i64, i64) -> Option<i64>,
    flt_op: impl Fn(f64, f64) -> f64,
) -> Option<Value> {
    let (a, b) = (&args[0], &args[1]);
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => match int_op(*x, *y) {
            Some(r) => Some(Value::Int(r)),
            None => {
                host.fail(loc, "division by zero".to_string());
                None
            }
        },
        _ if either_float(a, b) => {
            let (x, y) = arith_pair(a, b)?;
            Some(Value::Flt(flt_op(x, y)))
        }
        _ => type_err(host, loc, name, a, b),
    }
}

fn op_add(host: &mut dyn NativeHost, loc: Location, args: &[Value], _kw: &IndexMap<String, Value>) -> Option<Value> {
    let (a, b) = (&args[0], &args[1]);
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => Some(Value::Str(Rc::from(format!("{x}{y}")))),
        _ => int_binop(host, loc, "+", args, |x, y| x.checked_add(y).or(Some(x.wrapping_add(y))), |x, y| x + y),
    }
}

fn op_sub(host: &mut dyn NativeHost, loc: Location, args: &[Value], _kw: &IndexMap<String, Value>) -> Option<Value> {
    int_binop(host, loc, "-", args, |x, y| Some(x.wrapping_sub(y)), |x, y| x - y)
}

fn op_mul(host: &mut dyn NativeHost, loc: Location, args: &[Value], _kw: &IndexMap<String, Value>) -> Option<Value> {
    let (a, b) = (&args[0], &args[1]);
    match (a, b) {
        (Value::Str(s), Value::Int(n)) | (Value::Int(n), Value::Str(s)) => Some(Value::Str(repeat_str(s, *n))),
        _ => int_binop(host, loc, "*", args, |x, y| Some(x.wrapping_mul(y)), |x, y| x * y),
    }
}

/// Repeating by a negative count yields the empty string (`spec.md` §9
/// Open Question decision: "treat string multiplication by a negative
/// integer as producing the empty string").
fn repeat_str(s: &str, n: i64) -> Rc<str> {
    if n <= 0 {
        Rc::from("")
    } else {
        Rc::from(s.repeat(n as usize))
    }
}

fn op_div(host: &mut dyn NativeHost, loc: Location, args: &[Value], _kw: &IndexMap<String, Value>) -> Option<Value> {
    int_binop(
        host,
        loc,
        "/",
        args,
        |x, y| if y == 0 { None } else { Some(x.wrapping_div(y)) },
        |x, y| x / y,
    )
}

fn op_mod(host: &mut dyn NativeHost, loc: Location, args: &[Value], _kw: &IndexMap<String, Value>) -> Option<Value> {
    int_binop(
        host,
        loc,
        "%",
        args,
        |x, y| if y == 0 { None } else { Some(x.wrapping_rem(y)) },
        |x, y| x % y,
    )
}

fn op_floordiv(host: &mut dyn NativeHost, loc: Location, args: &[Value], _kw: &IndexMap<String, Value>) -> Option<Value> {
    int_binop(
        host,
        loc,
        "//",
        args,
        |x, y| {
            if y == 0 {
                None
            } else {
                let q = x.wrapping_div(y);
                Some(if (x % y != 0) && ((x < 0) != (y < 0)) { q - 1 } else { q })
            }
        },
        |x, y| (x / y).floor(),
    )
}

fn op_pow(host: &mut dyn NativeHost, loc: Location, args: &[Value], _kw: &IndexMap<String, Value>) -> Option<Value> {
    let (a, b) = (&args[0], &args[1]);
    match (a, b) {
        (Value::Int(x), Value::Int(y)) if *y >= 0 => Some(Value::Int(x.wrapping_pow(*y as u32))),
        _ if matches!(a, Value::Int(_) | Value::Flt(_)) && matches!(b, Value::Int(_) | Value::Flt(_)) => {
            let (x, y) = arith_pair(a, b)?;
            Some(Value::Flt(x.powf(y)))
        }
        _ => type_err(host, loc, "**", a, b),
    }
}

fn int_only_binop(
    host: &mut dyn NativeHost,
    loc: Location,
    name: &str,
    args: &[Value],
    f: impl Fn(i64, i64) -> i64,
) -> Option<Value> {
    match (&args[0], &args[1]) {
        (Value::Int(x), Value::Int(y)) => Some(Value::Int(f(*x, *y))),
        (a, b) => type_err(host, loc, name, a, b),
    }
}

fn op_shl(host: &mut dyn NativeHost, loc: Location, args: &[Value], _kw: &IndexMap<String, Value>) -> Option<Value> {
    int_only_binop(host, loc, "<<", args, |x, y| x.wrapping_shl((y as u32) & 63))
}

fn op_shr(host: &mut dyn NativeHost, loc: Location, args: &[Value], _kw: &IndexMap<String, Value>) -> Option<Value> {
    int_only_binop(host, loc, ">>", args, |x, y| x.wrapping_shr((y as u32) & 63))
}

fn op_bitand(host: &mut dyn NativeHost, loc: Location, args: &[Value], _kw: &IndexMap<String, Value>) -> Option<Value> {
    int_only_binop(host, loc, "&", args, |x, y| x & y)
}

fn op_bitor(host: &mut dyn NativeHost, loc: Location, args: &[Value], _kw: &IndexMap<String, Value>) -> Option<Value> {
    int_only_binop(host, loc, "|", args, |x, y| x | y)
}

fn op_bitxor(host: &mut dyn NativeHost, loc: Location, args: &[Value], _kw: &IndexMap<String, Value>) -> Option<Value> {
    int_only_binop(host, loc, "^", args, |x, y| x ^ y)
}

fn numeric_cmp(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => Some(x.cmp(y)),
        _ => arith_pair(a, b).and_then(|(x, y)| x.partial_cmp(&y)),
    }
}

fn cmp_op(
    host: &mut dyn NativeHost,
    loc: Location,
    name: &str,
    args: &[Value],
    f: impl Fn(std::cmp::Ordering) -> bool,
) -> Option<Value> {
    let (a, b) = (&args[0], &args[1]);
    match numeric_cmp(a, b) {
        Some(ord) => Some(Value::Bool(f(ord))),
        None => type_err(host, loc, name, a, b),
    }
}

fn op_lt(host: &mut dyn NativeHost, loc: Location, args: &[Value], _kw: &IndexMap<String, Value>) -> Option<Value> {
    cmp_op(host, loc, "<", args, |o| o.is_lt())
}
fn op_le(host: &mut dyn NativeHost, loc: Location, args: &[Value], _kw: &IndexMap<String, Value>) -> Option<Value> {
    cmp_op(host, loc, "<=", args, |o| o.is_le())
}
fn op_gt(host: &mut dyn NativeHost, loc: Location, args: &[Value], _kw: &IndexMap<String, Value>) -> Option<Value> {
    cmp_op(host, loc, ">", args, |o| o.is_gt())
}
fn op_ge(host: &mut dyn NativeHost, loc: Location, args: &[Value], _kw: &IndexMap<String, Value>) -> Option<Value> {
    cmp_op(host, loc, ">=", args, |o| o.is_ge())
}

fn op_eq(_host: &mut dyn NativeHost, _loc: Location, args: &[Value], _kw: &IndexMap<String, Value>) -> Option<Value> {
    Some(Value::Bool(feral_value::ops::values_equal(&args[0], &args[1])))
}

fn op_ne(_host: &mut dyn NativeHost, _loc: Location, args: &[Value], _kw: &IndexMap<String, Value>) -> Option<Value> {
    Some(Value::Bool(!feral_value::ops::values_equal(&args[0], &args[1])))
}

fn op_neg(host: &mut dyn NativeHost, loc: Location, args: &[Value], _kw: &IndexMap<String, Value>) -> Option<Value> {
    match &args[0] {
        Value::Int(n) => Some(Value::Int(n.wrapping_neg())),
        Value::Flt(f) => Some(Value::Flt(-f)),
        v => {
            host.fail(loc, format!("unsupported operand type for unary -: {}", v.type_name()));
            None
        }
    }
}

fn op_uplus(host: &mut dyn NativeHost, loc: Location, args: &[Value], _kw: &IndexMap<String, Value>) -> Option<Value> {
    match &args[0] {
        Value::Int(_) | Value::Flt(_) => Some(args[0].clone()),
        v => {
            host.fail(loc, format!("unsupported operand type for unary +: {}", v.type_name()));
            None
        }
    }
}

fn op_not(_host: &mut dyn NativeHost, _loc: Location, args: &[Value], _kw: &IndexMap<String, Value>) -> Option<Value> {
    Some(Value::Bool(!args[0].to_bool()))
}

fn op_bitnot(host: &mut dyn NativeHost, loc: Location, args: &[Value], _kw: &IndexMap<String, Value>) -> Option<Value> {
    match &args[0] {
        Value::Int(n) => Some(Value::Int(!n)),
        v => {
            host.fail(loc, format!("unsupported operand type for unary ~: {}", v.type_name()));
            None
        }
    }
}

fn op_identity(_host: &mut dyn NativeHost, _loc: Location, args: &[Value], _kw: &IndexMap<String, Value>) -> Option<Value> {
    Some(args[0].clone())
}

fn vec_new(_host: &mut dyn NativeHost, _loc: Location, args: &[Value], _kw: &IndexMap<String, Value>) -> Option<Value> {
    Some(Value::Vec(Rc::new(RefCell::new(VecData { items: args.to_vec(), refs: true }))))
}

fn map_new(host: &mut dyn NativeHost, loc: Location, args: &[Value], _kw: &IndexMap<String, Value>) -> Option<Value> {
    let mut items = IndexMap::new();
    for pair in args.chunks(2) {
        let [k, v] = pair else {
            host.fail(loc, "map literal has an unpaired key".to_string());
            return None;
        };
        let Value::Str(key) = k else {
            host.fail(loc, format!("map key must be a string, found {}", k.type_name()));
            return None;
        };
        items.insert(key.to_string(), v.clone());
    }
    Some(Value::Map(Rc::new(RefCell::new(MapData { items, refs: true }))))
}

/// `struct(name, fields, defaults)` mints a fresh [`StructDefData`]
/// (`spec.md` §3 "StructDef ... a freshly-allocated type id"). This
/// redesigns `original_source/library/lang.cpp`'s `create_struct`, which
/// builds an attribute bag directly from keyword arguments and never
/// allocates a per-definition type id at all — `spec.md`'s explicit
/// StructDef/Struct split requires a real two-phase "define, then
/// construct" builtin that the original's one-shot native doesn't have.
fn make_struct_fn(interner: Rc<RefCell<Interner>>, type_ids: Rc<RefCell<TypeIdAllocator>>) -> Value {
    native(move |host, loc, args, _kw| {
        let Some(Value::Str(name_str)) = args.first() else {
            host.fail(loc, "struct(name, fields, defaults): name must be a string".to_string());
            return None;
        };
        let Some(Value::Vec(fields_data)) = args.get(1) else {
            host.fail(loc, "struct(name, fields, defaults): fields must be a vec of strings".to_string());
            return None;
        };
        let mut fields = Vec::new();
        for f in fields_data.borrow().items.iter() {
            let Value::Str(fname) = f else {
                host.fail(loc, "struct field names must be strings".to_string());
                return None;
            };
            fields.push(interner.borrow_mut().intern(fname));
        }
        let mut defaults = IndexMap::new();
        if let Some(Value::Map(d)) = args.get(2) {
            for (k, v) in d.borrow().items.iter() {
                defaults.insert(interner.borrow_mut().intern(k), v.clone());
            }
        }
        let name = interner.borrow_mut().intern(name_str);
        let type_id = type_ids.borrow_mut().alloc();
        Some(Value::StructDef(Rc::new(StructDefData { type_id, name, fields, defaults })))
    })
}

fn builtin_import(host: &mut dyn NativeHost, loc: Location, args: &[Value], _kw: &IndexMap<String, Value>) -> Option<Value> {
    let Some(Value::Str(spec)) = args.first() else {
        host.fail(loc, "import(spec): spec must be a string".to_string());
        return None;
    };
    host.import_module(loc, spec)
}

fn builtin_raise(host: &mut dyn NativeHost, loc: Location, args: &[Value], _kw: &IndexMap<String, Value>) -> Option<Value> {
    let value = args.first().cloned().unwrap_or(Value::Nil);
    host.raise_value(loc, value);
    None
}

fn builtin_exit(host: &mut dyn NativeHost, _loc: Location, args: &[Value], _kw: &IndexMap<String, Value>) -> Option<Value> {
    let code = match args.first() {
        Some(Value::Int(n)) => *n as i32,
        _ => 0,
    };
    host.request_exit(code);
    Some(Value::Nil)
}

/// Registers every synthetic operator/collection-constructor native plus
/// the core-language builtins (`import`, `raise`, `exit`, `struct`) a
/// fresh module's globals need (`feral_codegen`'s doc comment: "the VM
/// bootstraps into every module").
pub fn register_globals(
    interner: Rc<RefCell<Interner>>,
    type_ids: Rc<RefCell<TypeIdAllocator>>,
) -> Vec<(Symbol, Value)> {
    let mut out = vec![
        ("__op_add", native(op_add)),
        ("__op_sub", native(op_sub)),
        ("__op_mul", native(op_mul)),
        ("__op_div", native(op_div)),
        ("__op_mod", native(op_mod)),
        ("__op_pow", native(op_pow)),
        ("__op_floordiv", native(op_floordiv)),
        ("__op_shl", native(op_shl)),
        ("__op_shr", native(op_shr)),
        ("__op_bitand", native(op_bitand)),
        ("__op_bitor", native(op_bitor)),
        ("__op_bitxor", native(op_bitxor)),
        ("__op_lt", native(op_lt)),
        ("__op_le", native(op_le)),
        ("__op_gt", native(op_gt)),
        ("__op_ge", native(op_ge)),
        ("__op_eq", native(op_eq)),
        ("__op_ne", native(op_ne)),
        ("__op_neg", native(op_neg)),
        ("__op_uplus", native(op_uplus)),
        ("__op_not", native(op_not)),
        ("__op_bitnot", native(op_bitnot)),
        ("__op_identity", native(op_identity)),
        ("__vec_new", native(vec_new)),
        ("__map_new", native(map_new)),
        ("import", native(builtin_import)),
        ("raise", native(builtin_raise)),
        ("exit", native(builtin_exit)),
    ]
    .into_iter()
    .map(|(name, v)| (interner.borrow_mut().intern(name), v))
    .collect::<Vec<_>>();

    out.push((interner.borrow_mut().intern("struct"), make_struct_fn(Rc::clone(&interner), type_ids)));

    let type_globals = [
        ("Nil", feral_value::typeid::TypeId::NIL),
        ("Bool", feral_value::typeid::TypeId::BOOL),
        ("Int", feral_value::typeid::TypeId::INT),
        ("Flt", feral_value::typeid::TypeId::FLT),
        ("Str", feral_value::typeid::TypeId::STR),
        ("Bytes", feral_value::typeid::TypeId::BYTES),
        ("Vec", feral_value::typeid::TypeId::VEC),
        ("Map", feral_value::typeid::TypeId::MAP),
        ("Fn", feral_value::typeid::TypeId::FN),
        ("Iterator", feral_value::typeid::TypeId::ITERATOR),
    ];
    for (name, id) in type_globals {
        out.push((interner.borrow_mut().intern(name), Value::TypeId(id)));
    }
    out
}

fn getitem(host: &mut dyn NativeHost, loc: Location, args: &[Value], _kw: &IndexMap<String, Value>) -> Option<Value> {
    let (recv, index) = (&args[0], &args[1]);
    match (recv, index) {
        (Value::Vec(data), Value::Int(i)) => {
            let items = &data.borrow().items;
            let idx = normalize_index(*i, items.len())?;
            match items.get(idx) {
                Some(v) => Some(v.clone()),
                None => {
                    host.fail(loc, format!("index {i} out of range"));
                    None
                }
            }
        }
        (Value::Map(data), Value::Str(key)) => match data.borrow().items.get(key.as_ref()) {
            Some(v) => Some(v.clone()),
            None => {
                host.fail(loc, format!("no such key '{key}'"));
                None
            }
        },
        (Value::Str(s), Value::Int(i)) => {
            let chars: Vec<char> = s.chars().collect();
            let idx = normalize_index(*i, chars.len())?;
            match chars.get(idx) {
                Some(c) => Some(Value::Str(Rc::from(c.to_string()))),
                None => {
                    host.fail(loc, format!("index {i} out of range"));
                    None
                }
            }
        }
        _ => {
            host.fail(loc, format!("{} does not support indexing", recv.type_name()));
            None
        }
    }
}

fn normalize_index(i: i64, len: usize) -> Option<usize> {
    let idx = if i < 0 { i + len as i64 } else { i };
    if idx < 0 {
        None
    } else {
        Some(idx as usize)
    }
}

fn setitem(host: &mut dyn NativeHost, loc: Location, args: &[Value], _kw: &IndexMap<String, Value>) -> Option<Value> {
    let (recv, index, value) = (&args[0], &args[1], &args[2]);
    match (recv, index) {
        (Value::Vec(data), Value::Int(i)) => {
            let len = data.borrow().items.len();
            let Some(idx) = normalize_index(*i, len).filter(|idx| *idx < len) else {
                host.fail(loc, format!("index {i} out of range"));
                return None;
            };
            if feral_value::cycle::would_cycle(recv, value) {
                host.fail(loc, "cyclic container insert".to_string());
                return None;
            }
            let refs = data.borrow().refs;
            let to_store = if refs { value.clone() } else { value.copy() };
            data.borrow_mut().items[idx] = to_store;
            Some(Value::Nil)
        }
        (Value::Map(_), Value::Str(key)) => match feral_value::ops::map_insert(recv, key.to_string(), value.clone()) {
            Ok(()) => Some(Value::Nil),
            Err(()) => {
                host.fail(loc, "cyclic container insert".to_string());
                None
            }
        },
        _ => {
            host.fail(loc, format!("{} does not support item assignment", recv.type_name()));
            None
        }
    }
}

fn each(host: &mut dyn NativeHost, loc: Location, args: &[Value], _kw: &IndexMap<String, Value>) -> Option<Value> {
    match &args[0] {
        Value::Vec(data) => Some(Value::Iterator(Rc::new(RefCell::new(feral_value::value::IteratorState::Vec {
            data: Rc::clone(data),
            next_idx: 0,
        })))),
        Value::Map(data) => Some(Value::Iterator(Rc::new(RefCell::new(feral_value::value::IteratorState::Map {
            data: Rc::clone(data),
            next_idx: 0,
        })))),
        v => {
            host.fail(loc, format!("{} is not iterable", v.type_name()));
            None
        }
    }
}

/// Installs `__getitem__`/`__setitem__`/`each` against `Vec`, `Map`, and
/// (where it makes sense) `Str` (`spec.md` §3 "Type-method tables are
/// keyed by numeric type id"). These resolve through `MEM_CALL` exactly
/// like a user-installed `CREATE_IN` method would, since `Vec`/`Map`
/// aren't attribute-based values for `ATTR`/`MEM_CALL`'s attribute-set
/// lookup to find them on.
pub fn register_type_methods(interner: &mut Interner, table: &mut TypeMethodTable) {
    use feral_value::typeid::TypeId;

    let getitem_name = interner.intern(feral_codegen::GETITEM);
    let setitem_name = interner.intern(feral_codegen::SETITEM);
    let each_name = interner.intern("each");

    table.add(TypeId::VEC, getitem_name, native(getitem));
    table.add(TypeId::VEC, setitem_name, native(setitem));
    table.add(TypeId::VEC, each_name, native(each));

    table.add(TypeId::MAP, getitem_name, native(getitem));
    table.add(TypeId::MAP, setitem_name, native(setitem));
    table.add(TypeId::MAP, each_name, native(each));

    table.add(TypeId::STR, getitem_name, native(getitem));
}

#[cfg(test)]
mod tests {
    use super::*;
    use feral_base::SourceId;

    struct NoopHost {
        failed: Option<String>,
    }
    impl NativeHost for NoopHost {
        fn fail(&mut self, _loc: Location, message: String) {
            self.failed = Some(message);
        }
        fn request_exit(&mut self, _code: i32) {}
        fn raise_value(&mut self, _loc: Location, _value: Value) {}
        fn import_module(&mut self, _loc: Location, _spec: &str) -> Option<Value> {
            None
        }
    }

    fn loc() -> Location {
        Location::new(SourceId::from_raw(0), 0, 1)
    }

    #[test]
    fn add_promotes_int_plus_float_to_float() {
        let mut host = NoopHost { failed: None };
        let kw = IndexMap::new();
        let result = op_add(&mut host, loc(), &[Value::Int(1), Value::Flt(2.5)], &kw);
        assert!(matches!(result, Some(Value::Flt(f)) if f == 3.5));
    }

    #[test]
    fn div_by_zero_fails_for_ints() {
        let mut host = NoopHost { failed: None };
        let kw = IndexMap::new();
        let result = op_div(&mut host, loc(), &[Value::Int(1), Value::Int(0)], &kw);
        assert!(result.is_none());
        assert_eq!(host.failed.as_deref(), Some("division by zero"));
    }

    #[test]
    fn string_repeat_by_negative_count_is_empty() {
        assert_eq!(repeat_str("ab", -3).as_ref(), "");
    }

    #[test]
    fn string_repeat_by_positive_count() {
        assert_eq!(repeat_str("ab", 3).as_ref(), "ababab");
    }

    #[test]
    fn eq_compares_int_and_float_by_value() {
        let kw = IndexMap::new();
        let mut host = NoopHost { failed: None };
        let result = op_eq(&mut host, loc(), &[Value::Int(2), Value::Flt(2.0)], &kw);
        assert!(matches!(result, Some(Value::Bool(true))));
    }

    #[test]
    fn getitem_vec_supports_negative_index() {
        let mut host = NoopHost { failed: None };
        let kw = IndexMap::new();
        let v = Value::Vec(Rc::new(RefCell::new(VecData {
            items: vec![Value::Int(1), Value::Int(2), Value::Int(3)],
            refs: true,
        })));
        let result = getitem(&mut host, loc(), &[v, Value::Int(-1)], &kw);
        assert!(matches!(result, Some(Value::Int(3))));
    }
}
