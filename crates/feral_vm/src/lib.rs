//! # feral-vm
//!
//! The execution engine, module loader, and native-function host
//! (`spec.md` §4.6 "Execution engine", §4.7 "Module loader", §6 "Native
//! function contract" / "Module-initializer contract").
//!
//! [`Vm`] is the one long-lived object a `feral_cli` invocation (or an
//! embedder) owns: it holds every process-wide singleton `spec.md` §5
//! describes — the source registry, the module table, the type-id →
//! type-method table — as plain fields rather than literal statics, so
//! that more than one `Vm` can coexist in one process (see `DESIGN.md`'s
//! Open Question decision). Everything else in this crate — [`exec`]'s
//! dispatch loop, [`loader`]'s module resolution, [`builtins`]'s
//! synthetic operator natives — operates on `&mut Vm`.

pub mod builtins;
pub mod error;
pub mod exec;
pub mod loader;
pub mod module;
pub mod typemethods;
pub mod vars;

pub use error::RuntimeError;
pub use loader::LoadError;
pub use module::Module;

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use feral_base::{Interner, Location, SourceRegistry};
use feral_value::func::{ModuleId, NativeHost};
use feral_value::typeid::TypeIdAllocator;
use feral_value::value::Value;

use typemethods::TypeMethodTable;

/// What a native function left behind for [`Vm::take_pending_error`] to
/// turn into a [`RuntimeError`] once its `None` return reaches the
/// dispatch loop (`spec.md` §6: "Returning none signals failure, and the
/// native must have called `vm.fail(location, message)` first").
enum PendingFailure {
    Fail(String),
    Raise(Value),
}

/// The one VM instance a running program owns (`spec.md` §5).
///
/// Every method that mutates shared state other than a single `Module`'s
/// own scratch space (`vars`/`globals`, reached through interior
/// mutability) takes `&mut self` — the dispatch loop in [`exec`] is the
/// only place that needs a `Vm` at all, and it already has exclusive
/// access for the duration of one `execute()` call.
pub struct Vm {
    pub sources: SourceRegistry,
    pub interner: Rc<RefCell<Interner>>,
    pub type_ids: Rc<RefCell<TypeIdAllocator>>,
    pub type_methods: TypeMethodTable,

    modules: Vec<Module>,
    by_path: HashMap<PathBuf, ModuleId>,

    /// Loaded native (shared-library) modules, kept alive for the life of
    /// the `Vm` so their `NativeFn` pointers stay valid (`spec.md` §3
    /// "Native library handles: loaded once per canonical path, unloaded
    /// after the deinit hook returns"). Each `Module`'s own
    /// `native_deinit` field is what [`Vm::shutdown`] actually invokes;
    /// this only keeps the `Library` handle itself alive.
    native_libs: Vec<libloading::Library>,

    /// `FERAL_PATHS`-provided roots plus the install prefix, searched in
    /// that order for a bare module name (`spec.md` §4.7 step 1, §6
    /// "Environment variables").
    pub search_paths: Vec<PathBuf>,

    /// The module whose bytecode the innermost [`exec::execute`] call is
    /// currently stepping, updated every dispatch-loop iteration. Read by
    /// [`Vm::import_module`] to resolve a `.`-relative import spec
    /// against the *calling* module's directory, not whichever module
    /// happened to load first.
    current_module: Cell<ModuleId>,

    pub recurse_count: u32,
    pub recurse_max: u32,

    pub exit_requested: bool,
    pub exit_code: i32,

    pending: Option<PendingFailure>,
}

impl Vm {
    /// Builds a fresh `Vm` with its synthetic operator natives' type
    /// method table populated (`spec.md` §9 "Native-callable uniformity")
    /// and its module search path seeded from `FERAL_PATHS` (`spec.md`
    /// §6 "Environment variables").
    pub fn new() -> Self {
        let interner = Rc::new(RefCell::new(Interner::new()));
        let mut type_methods = TypeMethodTable::new();
        {
            let mut interner_mut = interner.borrow_mut();
            builtins::register_type_methods(&mut interner_mut, &mut type_methods);
        }
        Self {
            sources: SourceRegistry::new(),
            interner,
            type_ids: Rc::new(RefCell::new(TypeIdAllocator::new())),
            type_methods,
            modules: Vec::new(),
            by_path: HashMap::new(),
            native_libs: Vec::new(),
            search_paths: search_paths_from_env(),
            current_module: Cell::new(ModuleId(0)),
            recurse_count: 0,
            recurse_max: 2048,
            exit_requested: false,
            exit_code: 0,
            pending: None,
        }
    }

    pub fn module(&self, id: ModuleId) -> &Module {
        &self.modules[id.0 as usize]
    }

    /// Every module loaded so far, in load order (`feral_cli`'s `-r` dump
    /// flag walks this to show bytecode for imported modules too, not
    /// just the main one).
    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.iter()
    }

    /// Compiles and runs `path` as the program's main module, returning
    /// the process exit code: `0` on a clean finish, the argument to
    /// `exit(n)` if one ran, or `1` on an uncaught runtime failure
    /// (`spec.md` §6 "CLI surface" "Exit code").
    pub fn run_main(&mut self, path: &Path) -> i32 {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        match loader::resolve_source_path(path, &cwd) {
            Ok(resolved) => match self.load(&resolved, true) {
                Ok(_) => {
                    if self.exit_requested {
                        self.exit_code
                    } else {
                        0
                    }
                }
                Err(err) => {
                    self.report_load_error(&err);
                    1
                }
            },
            Err(err) => {
                eprintln!("{err}");
                1
            }
        }
    }

    /// Compiles and runs `text` as the main module under `display_path`
    /// without reading it from disk (`feral_cli`'s `-e`/`--eval`).
    pub fn run_text(&mut self, text: &str, display_path: &Path) -> i32 {
        match loader::load_text(self, display_path, text.to_string(), true) {
            Ok(_) => {
                if self.exit_requested {
                    self.exit_code
                } else {
                    0
                }
            }
            Err(err) => {
                self.report_load_error(&err);
                1
            }
        }
    }

    fn report_load_error(&self, err: &LoadError) {
        match err {
            LoadError::Runtime(re) => {
                let (line, col) = self.sources.line_col(re.loc).unwrap_or((0, 0));
                let path = self.sources.get(re.loc.source).path().display();
                eprintln!("{path} {line}[{col}]: error: {}", re.message);
                eprintln!("{}", self.sources.render_caret(re.loc));
            }
            LoadError::Syntax(se) => {
                let (line, col) = self.sources.line_col(se.loc).unwrap_or((0, 0));
                let path = self.sources.get(se.loc.source).path().display();
                eprintln!("{path} {line}[{col}]: error: {}", se.message);
                eprintln!("{}", self.sources.render_caret(se.loc));
            }
            other => eprintln!("error: {other}"),
        }
    }

    /// Loads `canonical_path` as a source module (internal entry point
    /// shared by [`Vm::run_main`] and [`Vm::import_module`]); see
    /// [`loader`] for the resolution rules.
    pub(crate) fn load(&mut self, canonical_path: &Path, is_main: bool) -> Result<ModuleId, LoadError> {
        loader::load(self, canonical_path, is_main)
    }

    pub(crate) fn register_module(&mut self, module: Module, canonical_path: PathBuf) -> ModuleId {
        let id = module.id;
        self.modules.push(module);
        self.by_path.insert(canonical_path, id);
        id
    }

    pub(crate) fn lookup_loaded(&self, canonical_path: &Path) -> Option<ModuleId> {
        self.by_path.get(canonical_path).copied()
    }

    pub(crate) fn next_module_id(&self) -> ModuleId {
        ModuleId(self.modules.len() as u32)
    }

    pub(crate) fn remember_native_lib(&mut self, lib: libloading::Library) {
        self.native_libs.push(lib);
    }

    /// Runs every loaded native module's `deinit_<basename>` hook, in
    /// reverse registration order, then drops every loaded shared-library
    /// handle (`spec.md` §3 "Module", §5 "Resource lifetimes").
    pub fn shutdown(&mut self) {
        for module in self.modules.iter().rev() {
            if let Some(hook) = module.native_deinit.borrow_mut().take() {
                hook();
            }
        }
        self.native_libs.clear();
    }

    /// Records a native-call failure for [`Vm::take_pending_error`] to
    /// pick up; implements [`NativeHost::fail`].
    fn record_fail(&mut self, message: String) {
        self.pending = Some(PendingFailure::Fail(message));
    }

    /// Converts a native call's `None` return into a [`RuntimeError`],
    /// consuming whatever [`NativeHost::fail`]/[`NativeHost::raise_value`]
    /// left behind. `loc` is the calling instruction's location — the one
    /// that ends up attached to the error and reported to the user
    /// (`spec.md` §7 "Any opcode that fails reports at `ins.location`").
    pub fn take_pending_error(&mut self, loc: Location) -> RuntimeError {
        match self.pending.take() {
            Some(PendingFailure::Fail(message)) => RuntimeError::new(loc, message),
            Some(PendingFailure::Raise(value)) => RuntimeError::with_payload(loc, value),
            None => RuntimeError::new(loc, "native function failed without reporting a message"),
        }
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeHost for Vm {
    fn fail(&mut self, _loc: Location, message: String) {
        self.record_fail(message);
    }

    fn request_exit(&mut self, code: i32) {
        self.exit_requested = true;
        self.exit_code = code;
    }

    fn raise_value(&mut self, _loc: Location, value: Value) {
        self.pending = Some(PendingFailure::Raise(value));
    }

    fn import_module(&mut self, loc: Location, spec: &str) -> Option<Value> {
        let current = self.current_module.get();
        let from_dir = self.module(current).dir.clone();
        match loader::resolve_and_load(self, spec, &from_dir) {
            Ok(id) => Some(Value::ModuleRef(Rc::clone(&self.module(id).globals))),
            Err(err) => {
                self.fail(loc, err.to_string());
                None
            }
        }
    }
}

/// `FERAL_PATHS` is colon/semicolon-separated (`spec.md` §6); each root
/// contributes `<root>/include/feral` and `<root>/lib/feral` the way the
/// install prefix itself does (`spec.md` §4.7 step 1).
fn search_paths_from_env() -> Vec<PathBuf> {
    let mut out = Vec::new();
    if let Ok(raw) = std::env::var("FERAL_PATHS") {
        for root in raw.split([':', ';']).filter(|s| !s.is_empty()) {
            let root = PathBuf::from(root);
            out.push(root.join("include").join("feral"));
            out.push(root.join("lib").join("feral"));
        }
    }
    out
}
