//! Callable values: feral-fn bytecode ranges and native function pointers
//! unified as two arms of one `Fn` value (`spec.md` §9 "Native-callable
//! uniformity" design note), so `MEM_CALL` dispatch never needs to know
//! which kind of callable it resolved to.

use std::rc::Rc;

use feral_base::{Location, Symbol};
use indexmap::IndexMap;

use crate::value::Value;

/// Identifies a `feral_vm::Module` without this crate depending on
/// `feral_vm` — the dependency only runs the other way (`feral_vm` depends
/// on `feral_value`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleId(pub u32);

/// The native-function contract (`spec.md` §6): for a method-style native
/// resolved through `MEM_CALL` (e.g. `each`, `__getitem__`), `args[0]` is
/// the receiver and the rest are the call's own arguments. A native bound
/// to a plain `CALL` — an operator (`__op_add`) or a module-level builtin
/// (`import`, `raise`) — has no receiver slot at all and reads its
/// operands positionally from `args[0..]`. Either way, returning `None`
/// signals failure, and the native must have called [`NativeHost::fail`]
/// (or [`NativeHost::raise_value`]) first.
///
/// Implemented as a trait over `&mut dyn NativeHost` rather than a
/// concrete `Vm` type so `feral_value` never depends on `feral_vm`.
pub trait NativeHost {
    /// Records a runtime failure at `loc` with `message`. Mirrors
    /// `vm.fail(location, message)` in `spec.md` §6's native contract.
    fn fail(&mut self, loc: Location, message: String);

    /// Equivalent of the `sys.exit(n)` native (`spec.md` §4.6 "Exit").
    fn request_exit(&mut self, code: i32);

    /// Records a runtime failure at `loc` whose payload is an arbitrary
    /// `Value` rather than a string message, for the `raise(v)` native
    /// (`spec.md` §4.6 "Exceptions") — an `or`-handler's capture receives
    /// `value` verbatim instead of a rendered message.
    fn raise_value(&mut self, loc: Location, value: Value);

    /// Resolves and loads `spec` as a module (`spec.md` §5 "import"),
    /// returning its `ModuleRef` value on success. On failure the host has
    /// already called [`NativeHost::fail`] and `None` is returned.
    fn import_module(&mut self, loc: Location, spec: &str) -> Option<Value>;
}

pub type NativeFn =
    Rc<dyn Fn(&mut dyn NativeHost, Location, &[Value], &IndexMap<String, Value>) -> Option<Value>>;

/// Either arm of a `Fn` value (`spec.md` §3 "Fn: either 'feral' ... or
/// 'native' ...").
#[derive(Clone)]
pub enum FnBody {
    Feral { module: ModuleId, begin: usize, end: usize },
    Native(NativeFn),
}

impl std::fmt::Debug for FnBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FnBody::Feral { module, begin, end } => {
                f.debug_struct("Feral").field("module", module).field("begin", begin).field("end", end).finish()
            }
            FnBody::Native(_) => f.write_str("Native(..)"),
        }
    }
}

/// A callable value's full signature plus body (`spec.md` §3 "Fn").
/// `defaults` holds pre-evaluated default `Value`s, one per defaulted
/// parameter — codegen emits the default-value expressions once, at
/// `CREATE_FN` time, not at every call.
#[derive(Debug, Clone)]
pub struct FnData {
    pub name: Option<Symbol>,
    pub params: Vec<Symbol>,
    pub variadic: Option<Symbol>,
    pub kwargs: Option<Symbol>,
    pub defaults: IndexMap<Symbol, Value>,
    pub body: FnBody,
}

impl FnData {
    pub fn is_native(&self) -> bool {
        matches!(self.body, FnBody::Native(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn feral_fn() -> FnData {
        FnData {
            name: None,
            params: Vec::new(),
            variadic: None,
            kwargs: None,
            defaults: IndexMap::new(),
            body: FnBody::Feral { module: ModuleId(0), begin: 0, end: 0 },
        }
    }

    fn native_fn() -> FnData {
        FnData {
            name: None,
            params: Vec::new(),
            variadic: None,
            kwargs: None,
            defaults: IndexMap::new(),
            body: FnBody::Native(Rc::new(|_host, _loc, _args, _kwargs| Some(Value::Nil))),
        }
    }

    #[test]
    fn is_native_distinguishes_the_two_fn_body_arms() {
        assert!(!feral_fn().is_native());
        assert!(native_fn().is_native());
    }

    #[test]
    fn module_id_equality_is_by_value() {
        assert_eq!(ModuleId(3), ModuleId(3));
        assert_ne!(ModuleId(3), ModuleId(4));
    }
}
