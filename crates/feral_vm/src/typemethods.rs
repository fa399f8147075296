//! Type-id-keyed method tables (`spec.md` §3 "Type-method tables are keyed
//! by numeric type id; user struct definitions allocate fresh ids").
//!
//! Grounded on `original_source/src/VM/VM.cpp`'s `add_typefn`/`get_typefn`:
//! one bag of callables per type id, plus a universal "all types" bag
//! (`var_all_t` in the source) consulted when a type has no method of its
//! own under that name.

use indexmap::IndexMap;

use feral_base::Symbol;
use feral_value::typeid::TypeId;
use feral_value::value::Value;

#[derive(Default)]
pub struct TypeMethodTable {
    by_type: IndexMap<TypeId, IndexMap<Symbol, Value>>,
    universal: IndexMap<Symbol, Value>,
}

/// The pseudo type-id for methods registered against every type
/// (`spec.md`'s "universal type-method table", `var_all_t` in the source).
pub const ALL_TYPES: TypeId = TypeId(u32::MAX);

impl TypeMethodTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, ty: TypeId, name: Symbol, f: Value) {
        if ty == ALL_TYPES {
            self.universal.insert(name, f);
        } else {
            self.by_type.entry(ty).or_default().insert(name, f);
        }
    }

    /// Resolves `name` for `ty`, falling back to the universal table
    /// (`spec.md` §4.6 "MEM_CALL ... then via the universal type-method
    /// table").
    pub fn get(&self, ty: TypeId, name: Symbol) -> Option<Value> {
        if let Some(bag) = self.by_type.get(&ty) {
            if let Some(v) = bag.get(&name) {
                return Some(v.clone());
            }
        }
        self.universal.get(&name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feral_value::func::{FnBody, FnData, ModuleId};
    use std::rc::Rc;

    fn dummy_fn() -> Value {
        Value::Fn(Rc::new(FnData {
            name: None,
            params: vec![],
            variadic: None,
            kwargs: None,
            defaults: Default::default(),
            body: FnBody::Feral { module: ModuleId(0), begin: 0, end: 0 },
        }))
    }

    #[test]
    fn per_type_method_takes_priority_over_universal() {
        let mut table = TypeMethodTable::new();
        let mut interner = feral_base::Interner::new();
        let name = interner.intern("next");
        table.add(ALL_TYPES, name, dummy_fn());
        table.add(TypeId::VEC, name, dummy_fn());
        assert!(table.get(TypeId::VEC, name).is_some());
        assert!(table.get(TypeId::STR, name).is_some());
    }

    #[test]
    fn missing_method_on_unregistered_type_is_none() {
        let table = TypeMethodTable::new();
        let mut interner = feral_base::Interner::new();
        let name = interner.intern("whatever");
        assert!(table.get(TypeId::INT, name).is_none());
    }
}
