//! A compiled, cached unit of bytecode (`spec.md` §3 "Module").
//!
//! One `Module` per canonical source path, created once by
//! [`crate::loader`] and kept alive for the life of the `Vm`
//! (`spec.md`: "live until process shutdown").

use std::path::PathBuf;

use feral_bytecode::Instruction;
use feral_value::func::ModuleId;
use feral_value::value::Value;

use indexmap::IndexMap;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use feral_base::Symbol;

use crate::vars::Vars;

/// A module's globals, wrapped the way [`feral_value::value::Value::ModuleRef`]
/// needs them so `import("x").y` is a plain attribute read (`spec.md` §3
/// "ModuleRef").
pub type Globals = Rc<RefCell<IndexMap<Symbol, Value>>>;

/// A compiled source unit plus the two pieces of state that belong to it
/// while it runs: its globals (`spec.md` §3 "Vars. Per module: globals")
/// and its own call-frame stack. A function defined in module A always
/// executes against A's frames, even when called from module B — this is
/// what `crate::call`'s module switch accomplishes.
pub struct Module {
    pub id: ModuleId,
    pub path: PathBuf,
    pub dir: PathBuf,
    pub bytecode: Vec<Instruction>,
    pub globals: Globals,
    pub vars: RefCell<Vars>,
    /// Set once the top-level block has executed, so re-loading a module
    /// never re-runs it (`spec.md` §4.7 "Re-loading a module during
    /// execution must never re-run its top-level block"). A `Cell` rather
    /// than a plain `bool` since every `Module` lives behind an `Rc` once
    /// registered with the `Vm`.
    pub initialized: Cell<bool>,
    /// `deinit_<basename>` resolved from a loaded native module, run at
    /// shutdown in reverse registration order (`spec.md` §3 "Module").
    pub native_deinit: RefCell<Option<Rc<dyn Fn()>>>,
    pub is_main: bool,
}

impl Module {
    pub fn new(id: ModuleId, path: PathBuf, dir: PathBuf, bytecode: Vec<Instruction>, is_main: bool) -> Self {
        Self {
            id,
            path,
            dir,
            bytecode,
            globals: Rc::new(RefCell::new(IndexMap::new())),
            vars: RefCell::new(Vars::new()),
            initialized: Cell::new(false),
            native_deinit: RefCell::new(None),
            is_main,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module() -> Module {
        Module::new(ModuleId(0), PathBuf::from("a.fr"), PathBuf::from("."), Vec::new(), true)
    }

    #[test]
    fn starts_uninitialized_with_empty_globals() {
        let m = module();
        assert!(!m.initialized.get());
        assert!(m.globals.borrow().is_empty());
    }

    #[test]
    fn initialized_flag_latches_once_set() {
        let m = module();
        m.initialized.set(true);
        assert!(m.initialized.get());
    }

    #[test]
    fn globals_handle_is_shared_with_every_clone() {
        let m = module();
        let handle = Rc::clone(&m.globals);
        let x = feral_base::Interner::new().intern("x");
        handle.borrow_mut().insert(x, Value::Int(7));
        assert!(matches!(m.globals.borrow().get(&x), Some(Value::Int(7))));
    }

    #[test]
    fn native_deinit_runs_exactly_once_when_taken() {
        let m = module();
        let ran = Rc::new(Cell::new(0));
        let ran2 = Rc::clone(&ran);
        *m.native_deinit.borrow_mut() = Some(Rc::new(move || ran2.set(ran2.get() + 1)));

        let hook = m.native_deinit.borrow_mut().take();
        assert!(m.native_deinit.borrow().is_none());
        if let Some(hook) = hook {
            hook();
        }
        assert_eq!(ran.get(), 1);
    }
}
