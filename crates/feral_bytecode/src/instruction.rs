//! The instruction record (`spec.md` §3 "Instruction"): an opcode, its
//! source [`Location`], and one data payload variant.

use feral_base::{Location, Symbol};

use crate::opcode::Opcode;

/// The one-of payload an instruction may carry (`spec.md` §6 "Instruction
/// data payload discriminator"). `Nil` doubles as "no payload" for opcodes
/// that need none (`POP_TRY`, `PUSH_LOOP`, `POP_LOOP`) since it already
/// carries zero bytes on disk.
#[derive(Debug, Clone, PartialEq)]
pub enum Data {
    Nil,
    Int(i64),
    Flt(f64),
    Bool(bool),
    Str(String),
    Iden(Symbol),
}

impl Data {
    /// Reads this payload as a jump target / scope count. Codegen only
    /// ever stores these as `Data::Int`; panics otherwise, which would
    /// indicate a codegen bug, not a user error.
    pub fn as_addr(&self) -> usize {
        match self {
            Data::Int(n) => *n as usize,
            other => panic!("expected an address payload, found {other:?}"),
        }
    }

    pub fn as_int(&self) -> i64 {
        match self {
            Data::Int(n) => *n,
            other => panic!("expected an int payload, found {other:?}"),
        }
    }

    pub fn as_bool(&self) -> bool {
        match self {
            Data::Bool(b) => *b,
            other => panic!("expected a bool payload, found {other:?}"),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Data::Str(s) => s,
            other => panic!("expected a str payload, found {other:?}"),
        }
    }

    pub fn as_iden(&self) -> Symbol {
        match self {
            Data::Iden(s) => *s,
            other => panic!("expected an identifier payload, found {other:?}"),
        }
    }
}

/// Tag byte for the on-disk discriminator (`spec.md` §6): `NIL | INT | FLT
/// | STR | IDEN | BOOL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DataTag {
    Nil = 0,
    Int = 1,
    Flt = 2,
    Str = 3,
    Iden = 4,
    Bool = 5,
}

impl DataTag {
    pub fn from_u8(b: u8) -> Option<DataTag> {
        Some(match b {
            0 => DataTag::Nil,
            1 => DataTag::Int,
            2 => DataTag::Flt,
            3 => DataTag::Str,
            4 => DataTag::Iden,
            5 => DataTag::Bool,
            _ => return None,
        })
    }
}

/// One decoded bytecode instruction: opcode, source location, payload.
///
/// An append-only `Vec<Instruction>` is the entire compiled representation
/// of a module's executable code (`spec.md` §3 "Instruction stream is
/// append-only during codegen and read-only at run time").
#[derive(Debug, Clone)]
pub struct Instruction {
    pub op: Opcode,
    pub loc: Location,
    pub data: Data,
}

impl Instruction {
    pub fn new(op: Opcode, loc: Location, data: Data) -> Self {
        Self { op, loc, data }
    }
}
