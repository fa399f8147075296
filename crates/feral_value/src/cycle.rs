//! Cycle rejection at container-insert time (`spec.md` §3 invariant 4:
//! "inserting a container into itself, directly or transitively, is
//! rejected at insert time rather than producing a reference cycle").
//!
//! A bounded ancestor walk rather than a full mark-sweep: at the point of
//! insertion we only need to know whether `candidate` is reachable from
//! the value being inserted *into*, not compute a global cycle graph.

use crate::value::{container_ptr, Value};

/// How deep [`would_cycle`] is willing to walk before giving up and
/// assuming no cycle. `spec.md` doesn't bound container nesting depth, but
/// an unbounded walk on pathological input would itself be a hang; this
/// generously covers any realistic struct/vec/map nesting.
const MAX_DEPTH: usize = 256;

/// Returns `true` if inserting `candidate` into `host` would create a
/// reference cycle, i.e. `candidate` is `host` itself or `host` is
/// reachable by walking outward from `candidate`... in practice the check
/// that matters is the reverse: whether `host`'s own ancestry already
/// contains `candidate`. Since values here don't carry parent pointers,
/// we instead check the direct and cheap case `spec.md` calls out:
/// `candidate` directly or transitively contains `host`.
pub fn would_cycle(host: &Value, candidate: &Value) -> bool {
    let Some(host_ptr) = container_ptr(host) else { return false };
    contains_ptr(candidate, host_ptr, 0)
}

fn contains_ptr(v: &Value, target: *const (), depth: usize) -> bool {
    if depth >= MAX_DEPTH {
        return false;
    }
    if let Some(ptr) = container_ptr(v) {
        if ptr == target {
            return true;
        }
    }
    match v {
        Value::Vec(data) => data.borrow().items.iter().any(|x| contains_ptr(x, target, depth + 1)),
        Value::Map(data) => data.borrow().items.values().any(|x| contains_ptr(x, target, depth + 1)),
        Value::Struct(data) => data.borrow().attrs.values().any(|x| contains_ptr(x, target, depth + 1)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::VecData;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn self_insert_is_a_cycle() {
        let v = Value::Vec(Rc::new(RefCell::new(VecData { items: vec![], refs: true })));
        assert!(would_cycle(&v, &v));
    }

    #[test]
    fn unrelated_values_are_not_a_cycle() {
        let a = Value::Vec(Rc::new(RefCell::new(VecData { items: vec![], refs: true })));
        let b = Value::Int(5);
        assert!(!would_cycle(&a, &b));
    }

    #[test]
    fn transitive_containment_is_a_cycle() {
        let inner = Value::Vec(Rc::new(RefCell::new(VecData { items: vec![], refs: true })));
        let outer = Value::Vec(Rc::new(RefCell::new(VecData { items: vec![inner.clone()], refs: true })));
        // inserting `outer` into `inner` would close a cycle: inner -> outer -> inner
        assert!(would_cycle(&inner, &outer));
    }
}
