//! `-t`/`-p`/`-b` dump renderers (`spec.md` §6 "CLI surface").
//!
//! All three print a debug view of their respective stage's output; none
//! of them pretty-print in any language-faithful "unparse" sense; the
//! point is to see what the compiler saw, not to regenerate source.

use feral_base::Interner;
use feral_bytecode::instruction::{Data, Instruction};
use feral_syntax::ast::Block;
use feral_syntax::token::Token;

pub fn dump_tokens(tokens: &[Token]) {
    for tok in tokens {
        println!("{tok:?}");
    }
}

pub fn dump_ast(block: &Block) {
    println!("{block:#?}");
}

pub fn dump_bytecode(code: &[Instruction], interner: &Interner) {
    for (i, ins) in code.iter().enumerate() {
        let payload = match &ins.data {
            Data::Nil => String::new(),
            Data::Int(n) => format!(" {n}"),
            Data::Flt(f) => format!(" {f}"),
            Data::Bool(b) => format!(" {b}"),
            Data::Str(s) => format!(" {s:?}"),
            Data::Iden(sym) => format!(" {}", interner.resolve(*sym)),
        };
        println!("{i:>5}  {:?}{payload}", ins.op);
    }
}
