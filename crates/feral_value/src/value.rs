//! The tagged-variant runtime `Value` (`spec.md` §3 "Value"), replacing the
//! source implementation's `var_base_t` virtual-base hierarchy the way
//! `DESIGN.md` describes: one enum whose universal operations (type id,
//! to-string, to-bool, attribute get/set, callable?) are free functions
//! matched on the tag instead of virtual methods.

use std::cell::RefCell;
use std::rc::Rc;

use feral_base::Symbol;
use indexmap::IndexMap;

use crate::func::FnData;
use crate::struct_def::{StructData, StructDefData};
use crate::typeid::TypeId;

/// A `Vec` value's backing storage. `refs` mirrors `spec.md` §3's
/// "flag `refs` controls whether insertion shares or deep-copies" — when
/// `false`, [`crate::ops::insert_checked`] copies the value being
/// inserted instead of sharing the handle.
#[derive(Debug, Default)]
pub struct VecData {
    pub items: Vec<Value>,
    pub refs: bool,
}

/// A `Map` value's backing storage: insertion-ordered `Str -> Value`.
#[derive(Debug, Default)]
pub struct MapData {
    pub items: IndexMap<String, Value>,
    pub refs: bool,
}

/// Opaque iteration state backing `for x in iter` (`spec.md` §3
/// "IteratorState"). The only contract this Value kind participates in is
/// `next()`, handled specially by `MEM_CALL`/`ATTR` dispatch in `feral_vm`
/// rather than via the struct-style attribute/type-method tables, since
/// there is no user-visible `StructDef` backing it.
#[derive(Debug)]
pub enum IteratorState {
    Vec { data: Rc<RefCell<VecData>>, next_idx: usize },
    Map { data: Rc<RefCell<MapData>>, next_idx: usize },
}

impl IteratorState {
    /// Advances the iterator, returning `Nil` at end (`spec.md` §4.4's
    /// "its `next()` method returns nil at end").
    pub fn next(&mut self) -> Value {
        match self {
            IteratorState::Vec { data, next_idx } => {
                let items = &data.borrow().items;
                if *next_idx < items.len() {
                    let v = items[*next_idx].clone();
                    *next_idx += 1;
                    v
                } else {
                    Value::Nil
                }
            }
            IteratorState::Map { data, next_idx } => {
                let items = &data.borrow().items;
                if *next_idx < items.len() {
                    let (k, v) = items.get_index(*next_idx).expect("index in bounds");
                    let pair = VecData { items: vec![Value::Str(Rc::from(k.as_str())), v.clone()], refs: true };
                    *next_idx += 1;
                    Value::Vec(Rc::new(RefCell::new(pair)))
                } else {
                    Value::Nil
                }
            }
        }
    }
}

/// A runtime value (`spec.md` §3). Every aggregate variant is a shared
/// `Rc` handle; `Rc::strong_count` stands in for the spec's "ref count"
/// (`spec.md` §9's Design Notes explicitly permit this representation).
#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Flt(f64),
    Str(Rc<str>),
    Bytes(Rc<RefCell<Vec<u8>>>),
    TypeId(TypeId),
    Vec(Rc<RefCell<VecData>>),
    Map(Rc<RefCell<MapData>>),
    Fn(Rc<FnData>),
    /// Wraps a module's globals so `import("x").y` is an attribute read
    /// (`spec.md` §3 "ModuleRef").
    ModuleRef(Rc<RefCell<IndexMap<Symbol, Value>>>),
    StructDef(Rc<StructDefData>),
    Struct(Rc<RefCell<StructData>>),
    Iterator(Rc<RefCell<IteratorState>>),
}

impl Value {
    pub fn type_id(&self) -> TypeId {
        match self {
            Value::Nil => TypeId::NIL,
            Value::Bool(_) => TypeId::BOOL,
            Value::Int(_) => TypeId::INT,
            Value::Flt(_) => TypeId::FLT,
            Value::Str(_) => TypeId::STR,
            Value::Bytes(_) => TypeId::BYTES,
            Value::TypeId(_) => TypeId::TYPEID,
            Value::Vec(_) => TypeId::VEC,
            Value::Map(_) => TypeId::MAP,
            Value::Fn(_) => TypeId::FN,
            Value::ModuleRef(_) => TypeId::MODULE_REF,
            Value::StructDef(_) => TypeId::STRUCT_DEF,
            Value::Struct(s) => s.borrow().type_id,
            Value::Iterator(_) => TypeId::ITERATOR,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Flt(_) => "flt",
            Value::Str(_) => "str",
            Value::Bytes(_) => "bytes",
            Value::TypeId(_) => "typeid",
            Value::Vec(_) => "vec",
            Value::Map(_) => "map",
            Value::Fn(_) => "fn",
            Value::ModuleRef(_) => "module",
            Value::StructDef(_) => "structdef",
            Value::Struct(_) => "struct",
            Value::Iterator(_) => "iterator",
        }
    }

    /// `spec.md` §3 "to-bool" universal capability.
    pub fn to_bool(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Flt(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Bytes(b) => !b.borrow().is_empty(),
            Value::Vec(v) => !v.borrow().items.is_empty(),
            Value::Map(m) => !m.borrow().items.is_empty(),
            _ => true,
        }
    }

    /// `spec.md` §3 "to-string" universal capability.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Nil => "nil".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Flt(f) => {
                if f.fract() == 0.0 && f.is_finite() {
                    format!("{f:.1}")
                } else {
                    f.to_string()
                }
            }
            Value::Str(s) => s.to_string(),
            Value::Bytes(b) => format!("{:?}", b.borrow()),
            Value::TypeId(t) => format!("<typeid {}>", t.0),
            Value::Vec(v) => {
                let items = &v.borrow().items;
                let parts: Vec<String> = items.iter().map(|x| x.to_display_string()).collect();
                format!("[{}]", parts.join(", "))
            }
            Value::Map(m) => {
                let items = &m.borrow().items;
                let parts: Vec<String> =
                    items.iter().map(|(k, v)| format!("{k}: {}", v.to_display_string())).collect();
                format!("{{{}}}", parts.join(", "))
            }
            Value::Fn(f) => match f.name {
                Some(_) => "<fn>".to_string(),
                None => "<anonymous fn>".to_string(),
            },
            Value::ModuleRef(_) => "<module>".to_string(),
            Value::StructDef(_) => "<structdef>".to_string(),
            Value::Struct(_) => "<struct>".to_string(),
            Value::Iterator(_) => "<iterator>".to_string(),
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Fn(_) | Value::StructDef(_))
    }

    /// Whether this value participates in `.name` attribute reads/writes
    /// (`spec.md` Glossary "Attribute-based Value").
    pub fn is_attribute_based(&self) -> bool {
        matches!(self, Value::Struct(_) | Value::Iterator(_) | Value::ModuleRef(_))
    }

    /// The current reference count, used by `spec.md` §8's ref-count
    /// testable properties. `1` for non-`Rc`-backed scalars, since they
    /// have no shared ownership to count.
    pub fn ref_count(&self) -> usize {
        match self {
            Value::Str(s) => Rc::strong_count(s),
            Value::Bytes(b) => Rc::strong_count(b),
            Value::Vec(v) => Rc::strong_count(v),
            Value::Map(m) => Rc::strong_count(m),
            Value::Fn(f) => Rc::strong_count(f),
            Value::ModuleRef(m) => Rc::strong_count(m),
            Value::StructDef(s) => Rc::strong_count(s),
            Value::Struct(s) => Rc::strong_count(s),
            Value::Iterator(i) => Rc::strong_count(i),
            _ => 1,
        }
    }

    /// `spec.md` §3 invariant 2: "`copy` always yields a fresh
    /// ref-count-1 Value; it may share interior storage for immutable
    /// scalars". Scalars and `Str`/`TypeId`/`Fn` are immutable once
    /// created, so sharing their interior storage is observationally
    /// identical to a deep copy; `Vec`/`Map`/`Struct` are deep-cloned so
    /// mutating the copy never aliases the original.
    pub fn copy(&self) -> Value {
        match self {
            Value::Nil => Value::Nil,
            Value::Bool(b) => Value::Bool(*b),
            Value::Int(n) => Value::Int(*n),
            Value::Flt(f) => Value::Flt(*f),
            Value::Str(s) => Value::Str(Rc::from(s.as_ref())),
            Value::Bytes(b) => Value::Bytes(Rc::new(RefCell::new(b.borrow().clone()))),
            Value::TypeId(t) => Value::TypeId(*t),
            Value::Vec(v) => {
                let inner = v.borrow();
                let items = inner.items.iter().map(|x| x.copy()).collect();
                Value::Vec(Rc::new(RefCell::new(VecData { items, refs: inner.refs })))
            }
            Value::Map(m) => {
                let inner = m.borrow();
                let items = inner.items.iter().map(|(k, v)| (k.clone(), v.copy())).collect();
                Value::Map(Rc::new(RefCell::new(MapData { items, refs: inner.refs })))
            }
            Value::Fn(f) => Value::Fn(Rc::new((**f).clone())),
            Value::ModuleRef(m) => Value::ModuleRef(Rc::new(RefCell::new(m.borrow().clone()))),
            Value::StructDef(s) => Value::StructDef(Rc::clone(s)),
            Value::Struct(s) => {
                let inner = s.borrow();
                let attrs = inner.attrs.iter().map(|(k, v)| (*k, v.copy())).collect();
                Value::Struct(Rc::new(RefCell::new(StructData { type_id: inner.type_id, attrs })))
            }
            Value::Iterator(_) => self.clone(),
        }
    }
}

/// Identifies the underlying `Rc` allocation for container-like variants,
/// used by [`crate::cycle`] to detect self-reference by pointer identity.
/// `None` for non-aggregate values, which can never participate in a
/// cycle.
pub fn container_ptr(v: &Value) -> Option<*const ()> {
    match v {
        Value::Vec(rc) => Some(Rc::as_ptr(rc) as *const ()),
        Value::Map(rc) => Some(Rc::as_ptr(rc) as *const ()),
        Value::Struct(rc) => Some(Rc::as_ptr(rc) as *const ()),
        Value::ModuleRef(rc) => Some(Rc::as_ptr(rc) as *const ()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_of_scalar_has_ref_count_one() {
        let v = Value::Int(5);
        assert_eq!(v.copy().ref_count(), 1);
    }

    #[test]
    fn copy_of_vec_has_ref_count_one_and_is_independent() {
        let v = Value::Vec(Rc::new(RefCell::new(VecData { items: vec![Value::Int(1)], refs: true })));
        let copy = v.copy();
        assert_eq!(copy.ref_count(), 1);
        if let Value::Vec(inner) = &copy {
            inner.borrow_mut().items.push(Value::Int(2));
        }
        if let Value::Vec(orig) = &v {
            assert_eq!(orig.borrow().items.len(), 1);
        }
    }

    #[test]
    fn to_bool_matches_spec_truthiness() {
        assert!(!Value::Nil.to_bool());
        assert!(!Value::Int(0).to_bool());
        assert!(Value::Int(1).to_bool());
        assert!(!Value::Str(Rc::from("")).to_bool());
        assert!(Value::Str(Rc::from("x")).to_bool());
    }

    #[test]
    fn vec_iterator_yields_items_then_nil() {
        let data = Rc::new(RefCell::new(VecData { items: vec![Value::Int(1), Value::Int(2)], refs: true }));
        let mut it = IteratorState::Vec { data, next_idx: 0 };
        assert!(matches!(it.next(), Value::Int(1)));
        assert!(matches!(it.next(), Value::Int(2)));
        assert!(matches!(it.next(), Value::Nil));
    }
}
