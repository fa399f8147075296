//! # feral-bytecode
//!
//! The opcode set, instruction record, and compiled-bytecode on-disk
//! format (`spec.md` §3 "Instruction", §6 "Bytecode" / "Compiled-bytecode
//! on-disk format"). This crate knows nothing about the AST, the
//! simplifier, or the VM's runtime value model — it is the wire format
//! those crates agree on.

pub mod format;
pub mod instruction;
pub mod opcode;

pub use format::{CompiledModule, CompiledProgram};
pub use instruction::{Data, DataTag, Instruction};
pub use opcode::Opcode;
