//! Lexer, AST, and recursive-descent parser for feral (`spec.md` §4.1-4.2).
//!
//! The pipeline this crate implements is purely textual → structural:
//! source text goes in, an arena-allocated [`ast::Module`] comes out (or a
//! [`error::SyntaxError`]). Constant folding, `defer` lowering, and
//! bytecode emission are later, separate crates.

pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod token;

pub use ast::{Arenas, AstArena, Module};
pub use error::{Result, SyntaxError};
pub use lexer::Lexer;
pub use parser::Parser;
pub use token::{Token, TokenKind};

use feral_base::{Interner, SourceId};

/// Lexes and parses one source file in a single call, the entry point
/// `feral_vm`'s module loader uses for every unit it compiles
/// (`spec.md` §4.7).
pub fn parse_source<'a>(
    text: &'a str,
    source: SourceId,
    src_dir: &'a str,
    src_path: &'a str,
    arenas: &'a Arenas<'a>,
    interner: &mut Interner,
) -> Result<Module<'a>> {
    let tokens = Lexer::new(text, source, src_dir, src_path).tokenize()?;
    let ast = arenas.ctx();
    let parser = Parser::new(&tokens, ast, interner);
    let block = parser.parse_module()?;
    log::trace!("parsed module at {src_path}");
    Ok(Module { block })
}
