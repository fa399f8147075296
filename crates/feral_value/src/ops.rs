//! Container-insert and attribute-access operations that sit above a bare
//! field write: honoring the `refs`/`iref` sharing flag and rejecting
//! cycles (`spec.md` §3 invariants 3 and 4).

use feral_base::Symbol;

use crate::cycle::would_cycle;
use crate::value::{MapData, VecData, Value};

/// Appends `item` to `vec`. If `vec`'s `refs` flag is `false` the item is
/// copied first (`spec.md` §3 "flag `refs` controls whether insertion
/// shares or deep-copies"); either way, a would-be cycle is rejected
/// rather than inserted.
///
/// Returns `Err(())` when the insert would create a cycle; the caller
/// (`feral_vm`) turns that into a `RuntimeError` at the call site, since
/// only it has the `Location` to attach.
pub fn vec_push(vec: &Value, item: Value) -> Result<(), ()> {
    let Value::Vec(data) = vec else { panic!("vec_push on non-Vec value") };
    if would_cycle(vec, &item) {
        return Err(());
    }
    let to_store = if data.borrow().refs { item } else { item.copy() };
    data.borrow_mut().items.push(to_store);
    Ok(())
}

/// Inserts `key -> value` into `map`, honoring `refs`/cycle-rejection the
/// same way as [`vec_push`].
pub fn map_insert(map: &Value, key: String, value: Value) -> Result<(), ()> {
    let Value::Map(data) = map else { panic!("map_insert on non-Map value") };
    if would_cycle(map, &value) {
        return Err(());
    }
    let to_store = if data.borrow().refs { value } else { value.copy() };
    data.borrow_mut().items.insert(key, to_store);
    Ok(())
}

/// `spec.md` §3 invariant: "erasing a missing key from a Map is a no-op"
/// (Open Question decision recorded in `DESIGN.md`).
pub fn map_erase(map: &Value, key: &str) {
    let Value::Map(data) = map else { panic!("map_erase on non-Map value") };
    data.borrow_mut().items.shift_remove(key);
}

/// Reads an attribute off any attribute-based value (`spec.md` Glossary
/// "Attribute-based Value"). `None` means "no such attribute", which the
/// VM turns into a `RuntimeError`.
pub fn attribute_get(v: &Value, name: Symbol) -> Option<Value> {
    match v {
        Value::Struct(data) => data.borrow().attrs.get(&name).cloned(),
        Value::ModuleRef(data) => data.borrow().get(&name).cloned(),
        _ => None,
    }
}

/// Writes an attribute on an attribute-based value. `iref` mirrors the
/// `refs` flag on containers: when `false` the stored value is a fresh
/// copy rather than a shared handle (`spec.md` §3 invariant 3).
///
/// Returns `Err(())` if `v` isn't attribute-based or the write would
/// create a reference cycle.
pub fn attribute_set(v: &Value, name: Symbol, value: Value, iref: bool) -> Result<(), ()> {
    if would_cycle(v, &value) {
        return Err(());
    }
    let to_store = if iref { value } else { value.copy() };
    match v {
        Value::Struct(data) => {
            data.borrow_mut().attrs.insert(name, to_store);
            Ok(())
        }
        Value::ModuleRef(data) => {
            data.borrow_mut().insert(name, to_store);
            Ok(())
        }
        _ => Err(()),
    }
}

/// Structural equality used by the `EQ`/`NEQ` opcodes: scalars compare by
/// value, aggregates by contents (not by pointer identity — `spec.md`
/// draws no distinction between two structurally-identical vecs built
/// separately).
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Nil, Value::Nil) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Flt(x), Value::Flt(y)) => x == y,
        (Value::Int(x), Value::Flt(y)) | (Value::Flt(y), Value::Int(x)) => (*x as f64) == *y,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Bytes(x), Value::Bytes(y)) => *x.borrow() == *y.borrow(),
        (Value::TypeId(x), Value::TypeId(y)) => x == y,
        (Value::Vec(x), Value::Vec(y)) => {
            let (x, y) = (x.borrow(), y.borrow());
            x.items.len() == y.items.len() && x.items.iter().zip(y.items.iter()).all(|(a, b)| values_equal(a, b))
        }
        (Value::Map(x), Value::Map(y)) => {
            let (x, y) = (x.borrow(), y.borrow());
            x.items.len() == y.items.len()
                && x.items.iter().all(|(k, v)| y.items.get(k).is_some_and(|v2| values_equal(v, v2)))
        }
        (Value::Struct(x), Value::Struct(y)) => std::rc::Rc::ptr_eq(x, y),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn empty_vec(refs: bool) -> Value {
        Value::Vec(Rc::new(RefCell::new(VecData { items: vec![], refs })))
    }

    fn empty_map(refs: bool) -> Value {
        Value::Map(Rc::new(RefCell::new(MapData { items: Default::default(), refs })))
    }

    #[test]
    fn push_rejects_self_cycle() {
        let v = empty_vec(true);
        assert!(vec_push(&v, v.clone()).is_err());
    }

    #[test]
    fn push_without_refs_copies() {
        let v = empty_vec(false);
        let item = empty_vec(true);
        vec_push(&v, item.clone()).unwrap();
        if let Value::Vec(data) = &v {
            if let Value::Vec(stored) = &data.borrow().items[0] {
                assert!(!Rc::ptr_eq(stored, match &item {
                    Value::Vec(r) => r,
                    _ => unreachable!(),
                }));
            }
        }
    }

    #[test]
    fn map_erase_missing_key_is_noop() {
        let m = empty_map(true);
        map_erase(&m, "nope");
    }

    #[test]
    fn int_and_float_compare_equal_by_value() {
        assert!(values_equal(&Value::Int(2), &Value::Flt(2.0)));
    }
}
