#![cfg_attr(docsrs, feature(doc_cfg))]

//! # feral-base
//!
//! Pure structural atoms for the feral ecosystem.
//!
//! This crate provides the foundational types used throughout feral:
//!
//! - [`Arena`] — Bump allocation for stable AST references
//! - [`Interner`]/[`Symbol`] — String interning for O(1) equality
//! - [`Span`] — Source location tracking
//! - [`SpannedError`]/[`Result`] — Errors with source positions
//! - [`SourceRegistry`]/[`SourceId`]/[`Location`] — Owned source buffers and line/column mapping
//!
//! # Design Principles
//!
//! This crate has **no knowledge of feral's grammar or bytecode**. It provides
//! only generic, reusable infrastructure that the lexer, parser, codegen, and
//! VM crates build upon.
//!
//! # Example
//!
//! ```
//! use feral_base::{Arena, Interner, Span};
//!
//! let arena: Arena<&str> = Arena::new();
//! let mut interner = Interner::new();
//!
//! let hello = interner.intern("hello");
//! let span = Span::new(0, 5);
//!
//! let allocated = arena.alloc("hello");
//! assert_eq!(*allocated, "hello");
//! ```

pub mod arena;
pub mod intern;
pub mod span;
pub mod error;
pub mod source;

pub use arena::Arena;
pub use intern::{Interner, Symbol, SymbolEq};
pub use span::Span;
pub use error::{SpannedError, Result};
pub use source::{Location, SourceId, SourceRegistry, SourceUnit};
