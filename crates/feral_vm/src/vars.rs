//! Runtime variable stacks: per-call frames of block scopes and loop
//! markers (`spec.md` §3 "Vars", §4.5).
//!
//! Grounded on `original_source/src/VM/Vars.cpp`'s `vars_frame_t` /
//! `vars_stack_t` / `vars_t` layering: a block scope is an insertion-ordered
//! map, a call frame is a stack of block scopes, and `Vars` is a stack of
//! call frames. Lookup walks innermost block outward through the *current*
//! frame only — it never crosses frames, which is what gives the language
//! lexical (not dynamic) scoping.
//!
//! Module-level globals do not live here: each [`crate::module::Module`]
//! owns its own globals map (`spec.md` §3 "ModuleRef" needs `import("x").y`
//! to read a specific module's globals, not whichever module happens to be
//! current), and the VM resolves a name against the *running* module's
//! globals when a frame lookup misses — see `crate::exec`.
//!
//! The spec also describes a per-scope "defer stack"; `feral_simplify`
//! lowers every `defer` into explicit statements at codegen time
//! (`spec.md` §9 "Defer lowered in simplify"), so there is no runtime
//! defer-stack concern left for `Vars` to own.

use indexmap::IndexMap;

use feral_base::Symbol;
use feral_value::value::Value;

/// One `{ ... }` block's bindings, in declaration order.
#[derive(Debug, Default)]
struct BlockScope {
    vars: IndexMap<Symbol, Value>,
}

/// Records where a loop's block stack stood at `PUSH_LOOP` time, so
/// `continue`/`break` can unwind back to it (`spec.md` §4.5 "Loop
/// marker").
#[derive(Debug, Clone, Copy)]
struct LoopMarker {
    block_depth: usize,
}

/// One in-progress function call: its stack of block scopes and the loop
/// markers taken inside it (`spec.md` §3 "Frame").
#[derive(Debug, Default)]
struct Frame {
    blocks: Vec<BlockScope>,
    loops: Vec<LoopMarker>,
}

impl Frame {
    fn get(&self, name: Symbol) -> Option<Value> {
        for block in self.blocks.iter().rev() {
            if let Some(v) = block.vars.get(&name) {
                return Some(v.clone());
            }
        }
        None
    }

    fn set_attr(&mut self, name: Symbol, value: Value) {
        self.blocks.last_mut().expect("a frame always has at least one block").vars.insert(name, value);
    }
}

/// The stack of in-progress call frames (`spec.md` §3 "Vars").
pub struct Vars {
    frames: Vec<Frame>,
}

impl Vars {
    pub fn new() -> Self {
        // The bottom frame is the module's top-level block scope, mirroring
        // `vars_t`'s always-present `m_fn_vars[0]`.
        Self { frames: vec![Frame { blocks: vec![BlockScope::default()], loops: vec![] }] }
    }

    /// Looks up `name` in the current frame only, searching innermost block
    /// outward (`spec.md` §4.5 "getAttr(name)"). A miss here does not mean
    /// `name` is unbound — the caller still owes a lookup against the
    /// running module's globals.
    pub fn get(&self, name: Symbol) -> Option<Value> {
        self.frames.last().expect("at least one frame always exists").get(name)
    }

    /// Binds `name` in the innermost block of the current frame, the
    /// target of `CREATE` (`spec.md` §4.5 "setAttr").
    pub fn set_attr(&mut self, name: Symbol, value: Value) {
        self.frames.last_mut().expect("at least one frame always exists").set_attr(name, value);
    }

    /// Reassigns an existing binding in place, walking innermost block to
    /// outermost of the current frame only (`STORE`'s local-frame
    /// resolution pass). Returns whether a binding was found; the caller
    /// falls back to the running module's globals when this is `false`.
    pub fn assign_existing(&mut self, name: Symbol, value: Value) -> bool {
        let frame = self.frames.last_mut().expect("at least one frame always exists");
        for block in frame.blocks.iter_mut().rev() {
            if let Some(slot) = block.vars.get_mut(&name) {
                *slot = value;
                return true;
            }
        }
        false
    }

    /// `pushFrame` (`spec.md` §4.5): a new frame with one empty block (the
    /// function body scope).
    pub fn push_frame(&mut self) {
        self.frames.push(Frame { blocks: vec![BlockScope::default()], loops: vec![] });
    }

    /// `popFrame`. Any blocks/loops still open in the popped frame are
    /// dropped with it — the invariant in `spec.md` §4.5 guarantees
    /// codegen never leaves any open on a normal return, but an unwound
    /// error path may.
    pub fn pop_frame(&mut self) {
        self.frames.pop();
    }

    /// `pushBlock(n)`. `n` is purely an informational preallocation hint
    /// (`spec.md` §4.5); the map grows on demand regardless.
    pub fn push_block(&mut self, n: usize) {
        let mut scope = BlockScope::default();
        scope.vars.reserve(n);
        self.frames.last_mut().expect("at least one frame always exists").blocks.push(scope);
    }

    /// `popBlock(n)`: pops `n` blocks from the current frame.
    pub fn pop_block(&mut self, n: usize) {
        let frame = self.frames.last_mut().expect("at least one frame always exists");
        for _ in 0..n {
            frame.blocks.pop();
        }
    }

    /// `pushLoop`: records the current block-stack depth.
    pub fn push_loop(&mut self) {
        let frame = self.frames.last_mut().expect("at least one frame always exists");
        let depth = frame.blocks.len();
        frame.loops.push(LoopMarker { block_depth: depth });
    }

    /// `popLoop`: pops the loop marker and truncates blocks back to the
    /// depth recorded at `pushLoop` (the loop body's own `PUSH_BLOCK` is
    /// popped by its own `POP_BLOCK`, so this is normally a no-op; it
    /// exists to make an unwound `break`'s truncation exact).
    pub fn pop_loop(&mut self) {
        let frame = self.frames.last_mut().expect("at least one frame always exists");
        if let Some(marker) = frame.loops.pop() {
            frame.blocks.truncate(marker.block_depth);
        }
    }

    /// `continueLoop`: truncates blocks back to the depth recorded at the
    /// current (innermost) loop's `pushLoop`, without popping the marker.
    pub fn continue_loop(&mut self) {
        let frame = self.frames.last_mut().expect("at least one frame always exists");
        if let Some(marker) = frame.loops.last() {
            frame.blocks.truncate(marker.block_depth);
        }
    }

    /// Current frame's open block count, for resizing back after an error
    /// unwinds mid-frame without crossing a full `popFrame`.
    pub fn block_depth(&self) -> usize {
        self.frames.last().expect("at least one frame always exists").blocks.len()
    }

    pub fn resize_blocks_to(&mut self, depth: usize) {
        self.frames.last_mut().expect("at least one frame always exists").blocks.truncate(depth);
    }

    pub fn frame_depth(&self) -> usize {
        self.frames.len()
    }
}

impl Default for Vars {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feral_base::Symbol;

    fn sym(n: u32) -> Symbol {
        // Tests only need distinct symbols to compare; real symbols come
        // from an `Interner`, but `Symbol` round-trips through `index()`
        // only in one direction, so we build via a throwaway interner.
        let mut interner = feral_base::Interner::new();
        interner.intern(&format!("v{n}"))
    }

    #[test]
    fn inner_block_shadows_outer() {
        let mut vars = Vars::new();
        let x = sym(0);
        vars.set_attr(x, Value::Int(1));
        vars.push_block(0);
        vars.set_attr(x, Value::Int(2));
        assert!(matches!(vars.get(x), Some(Value::Int(2))));
        vars.pop_block(1);
        assert!(matches!(vars.get(x), Some(Value::Int(1))));
    }

    #[test]
    fn frames_do_not_see_each_others_blocks() {
        let mut vars = Vars::new();
        let x = sym(1);
        vars.set_attr(x, Value::Int(9));
        vars.push_frame();
        assert!(vars.get(x).is_none());
        vars.pop_frame();
        assert!(matches!(vars.get(x), Some(Value::Int(9))));
    }

    #[test]
    fn a_new_frame_does_not_see_the_calling_frames_locals() {
        let mut vars = Vars::new();
        let x = sym(2);
        vars.set_attr(x, Value::Int(42));
        vars.push_frame();
        assert!(vars.get(x).is_none());
        vars.pop_frame();
        assert!(matches!(vars.get(x), Some(Value::Int(42))));
    }

    #[test]
    fn continue_loop_truncates_without_popping_marker() {
        let mut vars = Vars::new();
        vars.push_loop();
        vars.push_block(0);
        vars.continue_loop();
        assert_eq!(vars.block_depth(), 1);
        vars.pop_loop();
    }
}
